//! # Service modes.
//!
//! | Mode       | Starts when                       | Stops when (besides disable/remove) |
//! |------------|-----------------------------------|-------------------------------------|
//! | `Active`   | always (dependencies satisfied)   | never                               |
//! | `Lazy`     | first demanded                    | never                               |
//! | `OnDemand` | demanded                          | no longer demanded                  |
//!
//! An `Active` service demands its dependencies for as long as it is installed.
//! `Lazy` and `OnDemand` services forward demand to their dependencies only
//! while they are themselves demanded.

/// How eagerly a controller wants its service up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceMode {
    #[default]
    Active,
    Lazy,
    OnDemand,
}

impl ServiceMode {
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceMode::Active => "active",
            ServiceMode::Lazy => "lazy",
            ServiceMode::OnDemand => "on_demand",
        }
    }
}
