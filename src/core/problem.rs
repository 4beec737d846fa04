//! # Problems collected during a transaction.
//!
//! Tasks and validators report [`Problem`]s instead of raising errors: a
//! transaction keeps going and the caller inspects the [`ProblemReport`] after
//! `prepare`. Whether a report blocks commit is decided by
//! [`Config::commit_threshold`](crate::Config::commit_threshold).

use std::fmt;
use std::sync::Arc;

/// Ordered problem severity (`Info < Warning < Error < Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// Informational note.
    #[default]
    Info,
    /// Something degraded but the transaction is still sound.
    Warning,
    /// The resulting configuration is invalid.
    Error,
    /// A task body misbehaved (panic, abandoned context).
    Critical,
}

impl Severity {
    /// Returns a short stable label (lowercase).
    pub fn as_label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    severity: Severity,
    message: Arc<str>,
    source: Option<Arc<str>>,
}

impl Problem {
    /// Creates a problem with the given severity.
    pub fn new(severity: Severity, message: impl Into<Arc<str>>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: None,
        }
    }

    pub fn info(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn critical(message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Critical, message)
    }

    /// Attaches the name of whatever reported the problem (task or service).
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "[{}] {}: {}", self.severity, src, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Problems accumulated by one transaction, in report order.
#[derive(Debug, Clone, Default)]
pub struct ProblemReport {
    problems: Vec<Problem>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    /// Highest severity in the report, `None` when empty.
    pub fn max_severity(&self) -> Option<Severity> {
        self.problems.iter().map(Problem::severity).max()
    }

    /// Number of problems at or above `threshold`.
    pub fn count_at_least(&self, threshold: Severity) -> usize {
        self.problems
            .iter()
            .filter(|p| p.severity >= threshold)
            .count()
    }
}

impl IntoIterator for ProblemReport {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}
