use thiserror::Error;

/// Failures the coordinator raises on its own. Build failures are reported
/// by the external executor and travel as data, not through this type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("package '{id}' is not registered")]
    NotFound { id: String },
    #[error("dependency cycle detected involving: {}", .members.join(", "))]
    Cycle { members: Vec<String> },
    #[error("package '{id}' is not installed and cannot be soft-uninstalled")]
    NotInstalled { id: String },
    #[error("system clock is set before the unix epoch")]
    ClockBeforeEpoch,
}

impl CoordinatorError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
