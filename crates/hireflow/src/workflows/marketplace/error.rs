use std::fmt;

use serde::Serialize;

use super::repository::RepositoryError;

/// Entity families managed by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Application,
    Invoice,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Application => "application",
            EntityKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse classification callers branch on instead of inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    InvalidTransition,
    Conflict,
    Validation,
    Unavailable,
}

/// Why an entity's current state blocks the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    #[error("job must be waiting with no contractor assigned")]
    JobNotOpen,
    #[error("job is not ongoing")]
    JobNotOngoing,
    #[error("job still has invoices or pending applications")]
    JobHasDependents,
    #[error("application is no longer waiting")]
    ApplicationNotWaiting,
    #[error("invoice is no longer waiting")]
    InvoiceNotWaiting,
    #[error("only the most recent invoice interval can be deleted")]
    InvoiceNotLatest,
    #[error("job allows at most {max_intervals} invoice interval(s)")]
    IntervalExceeded { max_intervals: u32 },
}

/// Error raised by every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(StateViolation),
    #[error("invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: EntityKind,
        from: &'static str,
        to: &'static str,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl MarketplaceError {
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketplaceError::NotFound { .. } => ErrorKind::NotFound,
            MarketplaceError::Forbidden(_) => ErrorKind::Forbidden,
            MarketplaceError::InvalidState(_) => ErrorKind::InvalidState,
            MarketplaceError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            MarketplaceError::Conflict(_) => ErrorKind::Conflict,
            MarketplaceError::Validation(_) => ErrorKind::Validation,
            MarketplaceError::Storage(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<StateViolation> for MarketplaceError {
    fn from(value: StateViolation) -> Self {
        Self::InvalidState(value)
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Unavailable(detail) => Self::Storage(detail),
        }
    }
}
