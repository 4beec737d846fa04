//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used by the transaction controller to deliver events from the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Transaction / ServiceController ── publish(Event) ──► Bus ──► listener
//!                                                                   │
//!                                                          SubscriberSet::emit
//!                                                        ┌──────────┼──────────┐
//!                                                        ▼          ▼          ▼
//!                                                    LogWriter   Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
