/// Structured error types for tradepost-core.
///
/// Uses `thiserror` so the HTTP adapter can map each variant onto a status
/// code. Binary crates (tradepost-cli) wrap these in `anyhow` for reporting.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::OfferStatus;
use crate::validation::ValidationError;

/// Main error type for tradepost-core operations
#[derive(Error, Debug)]
pub enum TradeError {
    /// Referenced listing or offer does not exist
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Actor lacks the seller/buyer relationship the operation requires
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Transition attempted from a status that does not allow it
    #[error("cannot {action} offer {offer_id} while it is {status}")]
    InvalidState {
        offer_id: u64,
        status: OfferStatus,
        action: &'static str,
    },

    /// Malformed user-supplied field
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Notification, announcement or channel provisioning failed
    #[error(transparent)]
    SideEffect(#[from] SideEffectError),

    /// Awaited follow-up interaction never arrived
    #[error("timed out after {seconds} seconds waiting for '{waiting_for}'")]
    Timeout { waiting_for: String, seconds: u64 },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Persisted collection could not be used
    #[error("storage error in {path:?}: {reason}")]
    Storage { path: PathBuf, reason: String },
}

/// Result type alias for tradepost-core operations
pub type Result<T> = std::result::Result<T, TradeError>;

impl TradeError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(offer_id: u64, status: OfferStatus, action: &'static str) -> Self {
        Self::InvalidState {
            offer_id,
            status,
            action,
        }
    }

    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(waiting_for: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            seconds,
        }
    }

    /// True for errors that reject the request itself (reported to the
    /// invoking user) as opposed to infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::InvalidState { .. }
                | Self::Validation(_)
                | Self::Timeout { .. }
        )
    }
}

/// Failure of an outbound platform side effect.
///
/// These are caught where the side effect happens and logged; they never
/// undo a committed record change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {reason}")]
pub struct SideEffectError {
    pub operation: &'static str,
    pub reason: String,
}

impl SideEffectError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}
