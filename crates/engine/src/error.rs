//! The module contains the errors the engine can throw.
//!
//! Every variant names the entity it concerns. Variants are grouped by
//! [`ErrorKind`] so callers can react to the class of failure without matching
//! every rule:
//!
//! - [`Validation`]: malformed input (future date, empty reason, ...).
//! - [`Precondition`]: a business rule rejected the operation
//!   ([`AllocationPaused`], [`MonthlyLimitReached`], ...).
//! - [`Conflict`]: concurrent modification or lock contention. Transient, the
//!   only class the engine retries on its own.
//! - [`NotFound`]: unknown owner, allocation or celebration.
//!
//!  [`Validation`]: ErrorKind::Validation
//!  [`Precondition`]: ErrorKind::Precondition
//!  [`Conflict`]: ErrorKind::Conflict
//!  [`NotFound`]: ErrorKind::NotFound
//!  [`AllocationPaused`]: EngineError::AllocationPaused
//!  [`MonthlyLimitReached`]: EngineError::MonthlyLimitReached
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Allocation paused: {0}")]
    AllocationPaused(String),
    #[error("Allocation exhausted: {0}")]
    AllocationExhausted(String),
    #[error("Monthly limit reached: {0}")]
    MonthlyLimitReached(String),
    #[error("Already paused: {0}")]
    AlreadyPaused(String),
    #[error("Not paused: {0}")]
    NotPaused(String),
    #[error("Immutable celebration: {0}")]
    ImmutableCelebration(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error(transparent)]
    Database(DbErr),
}

/// Coarse failure classes, stable across rule additions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    Conflict,
    NotFound,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Precondition => "precondition",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::ExistingKey(_) => ErrorKind::Validation,
            Self::AllocationPaused(_)
            | Self::AllocationExhausted(_)
            | Self::MonthlyLimitReached(_)
            | Self::AlreadyPaused(_)
            | Self::NotPaused(_)
            | Self::ImmutableCelebration(_) => ErrorKind::Precondition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Storage,
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// SQLite reports writer contention as `SQLITE_BUSY`/`SQLITE_LOCKED`; a racing
/// lazy insert shows up as a unique violation. Both are conflicts, not storage
/// failures.
fn is_contention(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("SQLITE_BUSY")
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if is_contention(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Database(err)
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::AllocationPaused(a), Self::AllocationPaused(b)) => a == b,
            (Self::AllocationExhausted(a), Self::AllocationExhausted(b)) => a == b,
            (Self::MonthlyLimitReached(a), Self::MonthlyLimitReached(b)) => a == b,
            (Self::AlreadyPaused(a), Self::AlreadyPaused(b)) => a == b,
            (Self::NotPaused(a), Self::NotPaused(b)) => a == b,
            (Self::ImmutableCelebration(a), Self::ImmutableCelebration(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_rules() {
        assert_eq!(
            EngineError::AllocationPaused("a".to_string()).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            EngineError::InvalidInput("a".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::KeyNotFound("a".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert!(EngineError::Conflict("a".to_string()).is_transient());
        assert!(!EngineError::MonthlyLimitReached("a".to_string()).is_transient());
    }

    #[test]
    fn busy_database_maps_to_conflict() {
        let err = EngineError::from(DbErr::Custom("database is locked".to_string()));
        assert!(matches!(err, EngineError::Conflict(_)));

        let err = EngineError::from(DbErr::Custom("no such table: owners".to_string()));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
