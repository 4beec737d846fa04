//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use servicevisor::{
    Config, Executable, ExecuteContext, RevertContext, Revertible, Service, StartContext,
    StopContext, TaskSpec, TransactionController,
};

static TRACING: Once = Once::new();

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn controller() -> TransactionController {
    init_tracing();
    TransactionController::new(Config::default())
}

/// Ordered log of what task bodies and services did.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    /// Position of `entry`; panics if it was never recorded.
    pub fn position(&self, entry: &str) -> usize {
        self.0
            .lock()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("`{entry}` not recorded in {:?}", self.entries()))
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Task that records its execute and revert calls.
pub struct Recorder {
    name: &'static str,
    journal: Journal,
}

impl Recorder {
    pub fn spec(name: &'static str, journal: &Journal) -> TaskSpec {
        let task = Arc::new(Self {
            name,
            journal: journal.clone(),
        });
        TaskSpec::new(name, task.clone()).with_revertible(task)
    }
}

#[async_trait]
impl Executable for Recorder {
    async fn execute(&self, ctx: ExecuteContext) {
        self.journal.push(format!("execute {}", self.name));
        ctx.complete();
    }
}

#[async_trait]
impl Revertible for Recorder {
    async fn revert(&self, ctx: RevertContext) {
        self.journal.push(format!("revert {}", self.name));
        ctx.complete();
    }
}

/// Service that records start/stop and can be told to fail.
pub struct Recording {
    name: &'static str,
    journal: Journal,
    fail: Arc<AtomicBool>,
}

impl Recording {
    pub fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Service whose start fails while the returned switch is set.
    pub fn failing(name: &'static str, journal: &Journal) -> (Self, Arc<AtomicBool>) {
        let svc = Self::new(name, journal);
        svc.fail.store(true, Ordering::SeqCst);
        let switch = svc.fail.clone();
        (svc, switch)
    }
}

#[async_trait]
impl Service for Recording {
    async fn start(&self, ctx: StartContext) {
        if self.fail.load(Ordering::SeqCst) {
            self.journal.push(format!("fail {}", self.name));
            ctx.fail("configured to fail");
            return;
        }
        self.journal.push(format!("start {}", self.name));
        ctx.complete(format!("{}-value", self.name));
    }

    async fn stop(&self, ctx: StopContext) {
        self.journal.push(format!("stop {}", self.name));
        ctx.complete();
    }
}
