//! Error types for memoization operations

use crate::{ArgPosition, ArgType};
use thiserror::Error;

/// Key construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Unhashable argument at {position}: {arg_type} ({reason})")]
    UnhashableArgument {
        position: ArgPosition,
        arg_type: ArgType,
        reason: String,
    },

    #[error("Key builder failed: {reason}")]
    BuilderFailed { reason: String },
}

/// Errors raised by a caller-supplied lock.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Lock acquisition failed: {reason}")]
    AcquireFailed { reason: String },

    #[error("Lock release failed: {reason}")]
    ReleaseFailed { reason: String },

    #[error("Lock poisoned")]
    Poisoned,
}

/// Errors raised by a cache refusing a store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Value too large: size {size} exceeds capacity {capacity}")]
    TooLarge { size: usize, capacity: usize },

    #[error("Cache full: {current} of {capacity} used, {needed} needed")]
    Full {
        current: usize,
        capacity: usize,
        needed: usize,
    },

    #[error("Cache backend error: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    /// Whether this refusal is an ordinary capacity decision rather than a
    /// broken backend.
    pub fn is_capacity(&self) -> bool {
        matches!(self, StoreError::TooLarge { .. } | StoreError::Full { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all memoization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for memoization operations.
pub type MemoResult<T> = Result<T, MemoError>;

// =============================================================================
// TESTS
// =============================================================================
