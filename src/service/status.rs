//! # Controller state and flags.
//!
//! ```text
//!            ┌──────────── retry/restart ───────────┐
//!            ▼                                      │
//! DOWN ─► STARTING ─► UP ─► STOPPING ─► DOWN ─► REMOVED
//!            │                 ▲
//!            └─► FAILED ───────┘ (stop-failed)
//!
//! RESTARTING is entered from UP (restart) or FAILED (retry) and always
//! schedules a stop; the following DOWN re-enters the normal path.
//! ```

use std::fmt;

/// Lifecycle state of a service controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Down,
    Starting,
    Up,
    Failed,
    Restarting,
    Stopping,
    Removed,
}

impl ServiceState {
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceState::Down => "down",
            ServiceState::Starting => "starting",
            ServiceState::Up => "up",
            ServiceState::Failed => "failed",
            ServiceState::Restarting => "restarting",
            ServiceState::Stopping => "stopping",
            ServiceState::Removed => "removed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Boolean controller attributes packed in one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Flags(u8);

impl Flags {
    pub(crate) const SERVICE_ENABLED: Flags = Flags(1);
    pub(crate) const REGISTRY_ENABLED: Flags = Flags(1 << 1);
    pub(crate) const SERVICE_REMOVED: Flags = Flags(1 << 2);

    #[inline]
    pub(crate) fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub(crate) fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    #[inline]
    pub(crate) fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub(crate) fn set(&mut self, other: Flags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}
