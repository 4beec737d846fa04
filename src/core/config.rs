//! # Engine configuration.
//!
//! Provides [`Config`], the settings a
//! [`TransactionController`](crate::TransactionController) is built with.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `bus_capacity = 0` → clamped to 1 by the bus

use super::problem::Severity;

/// Configuration for the transaction engine.
///
/// ## Field semantics
/// - `max_concurrent`: how many execute/revert bodies may run at once (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `commit_threshold`: lowest problem severity that blocks `commit`
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of task bodies running concurrently.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` bodies run simultaneously
    ///
    /// The permit is held while the body's future runs. A body that hands its
    /// context to another task and returns early releases the permit early.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages skip
    /// older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Problems at or above this severity make `can_commit()` false.
    ///
    /// The transaction still reaches PREPARED; the caller is expected to abort.
    pub commit_threshold: Severity,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent bodies
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `commit_threshold = Severity::Error`
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            bus_capacity: 1024,
            commit_threshold: Severity::Error,
        }
    }
}
