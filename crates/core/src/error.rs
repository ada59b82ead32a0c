use thiserror::Error;

/// Failures of the landlord data model and the stores that hold it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A unique key (tenant id, hostname, email) is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A record points at a row that does not exist.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// An in-process store can no longer be trusted after a panic.
    #[error("{0} is poisoned")]
    Poisoned(&'static str),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }
}
