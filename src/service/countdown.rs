//! One-shot completion callback fired after a number of arrivals.
//!
//! Used by registry removal and container shutdown: each controller being
//! removed holds one count and arrives once it has been cleared from its
//! registry. The caller holds one extra count while it is still handing
//! counts out, so the callback cannot fire before every controller was armed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

type Done = Box<dyn FnOnce() + Send>;

pub(crate) struct Countdown {
    pending: AtomicUsize,
    done: Mutex<Option<Done>>,
}

impl Countdown {
    /// Creates a countdown holding the caller's arming count.
    pub(crate) fn new(done: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            pending: AtomicUsize::new(1),
            done: Mutex::new(Some(Box::new(done))),
        })
    }

    pub(crate) fn add(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Releases one count; the last one runs the callback.
    pub(crate) fn arrive(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let done = self.done.lock().take();
        if let Some(done) = done {
            done();
        }
    }
}
