//! # Subscriber trait
//!
//! A [`Subscribe`] implementation receives every [`Event`] published by
//! transactions and service controllers: task execution and revert steps,
//! phase outcomes (`TxnPrepared`, `TxnCommitted`, ...), reported problems and
//! service transitions. Subscribers are passed to
//! [`TransactionControllerBuilder::with_subscribers`](crate::TransactionControllerBuilder::with_subscribers).
//!
//! ## Contract
//! - Delivery is asynchronous. A slow subscriber never holds up a task body
//!   or a phase operation; it only delays its own queue.
//! - Each subscriber has its own bounded queue, sized by
//!   [`Subscribe::queue_capacity`]. On overflow its events are dropped and a
//!   `SubscriberOverflow` event is published.
//! - A panic in `on_event` is caught and reported as `SubscriberPanicked`;
//!   the worker keeps running.
//!
//! ## Example
//! ```rust
//! use servicevisor::{Event, EventKind, Subscribe};
//!
//! struct ServiceAudit;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ServiceAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ServiceFailed {
//!             let service = ev.service.as_deref().unwrap_or("?");
//!             let reason = ev.reason.as_deref().unwrap_or("");
//!             println!("service {service} failed to start: {reason}");
//!         }
//!     }
//!     fn name(&self) -> &'static str { "service-audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of runtime events, driven by its own worker task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Events of one transaction arrive in publication order.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
