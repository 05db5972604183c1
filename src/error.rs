//! Error taxonomy for the report lifecycle.
//!
//! Every fallible operation in the crate returns one of these variants, so
//! callers can tell user-correctable input problems apart from stale
//! references and from genuine store failures:
//!
//! - [`StoreError::Validation`] / [`StoreError::LocationRequired`] are caught
//!   at the submission-flow boundary and never reach the store.
//! - [`StoreError::Upload`] is non-fatal: the flow degrades to a report
//!   without an image rather than aborting.
//! - [`StoreError::NotFound`] means a referenced entity is absent, which
//!   indicates a caller bug or a stale identifier.
//! - [`StoreError::InvalidTransition`] rejects an illegal status change and
//!   guarantees no partial mutation happened.
//! - [`StoreError::Persistence`] wraps the underlying database failure; it is
//!   retryable by user action, never retried automatically.

use crate::model::ReportStatus;

/// Everything that can go wrong in the report lifecycle core.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required input is missing or invalid. Names the first offending
    /// field so the client can surface it inline.
    #[error("invalid input: missing or invalid field '{field}'")]
    Validation {
        /// The first missing/invalid field, e.g. "title" or "user_id".
        field: &'static str,
    },

    /// Submission attempted without resolved coordinates. The flow never
    /// proceeds to persistence in this state.
    #[error("location is required: latitude and longitude must both be captured before submitting")]
    LocationRequired,

    /// The image store rejected or failed the upload. Non-fatal for report
    /// submission.
    #[error("image upload failed: {0}")]
    Upload(String),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "report" or "alert".
        entity: &'static str,
        id: i64,
    },

    /// An illegal report status change was attempted. The persisted status is
    /// left unchanged.
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    /// An alert that already has an outcome received a second response, or a
    /// non-outcome status was supplied.
    #[error("alert {id} already has an outcome or the response is not a valid outcome")]
    AlertAlreadyResolved { id: i64 },

    /// The underlying store was unreachable or the write failed.
    #[error("persistence failure")]
    Persistence(#[from] sqlx::Error),
}

impl StoreError {
    /// Shorthand for a validation failure on a named field.
    pub fn missing(field: &'static str) -> Self {
        StoreError::Validation { field }
    }
}
