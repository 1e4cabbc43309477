//! Error types for the approval workflow engine
use crate::request::OverallStatus;

/// Rejections raised while validating a draft before it is first persisted.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title exceeds {max} characters (got {len})")]
    TitleTooLong { len: usize, max: usize },
    #[error("description exceeds {max} characters (got {len})")]
    DescriptionTooLong { len: usize, max: usize },
    #[error("requester is not set")]
    MissingRequester,
    #[error("approval workflow must contain at least one level")]
    EmptyWorkflow,
    #[error("approval levels must be numbered contiguously from 1, found level {found} at position {position}")]
    NonContiguousLevels { position: usize, found: u32 },
    #[error("level {level} has an empty approver role")]
    EmptyApproverRole { level: u32 },
    #[error("level {level} must be pending at creation")]
    LevelNotPending { level: u32 },
}

/// Rejections raised by the pure transition rules on [`crate::request::ApprovalRequest`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    /// The request has reached a terminal status and takes no further action.
    #[error("request is already {status} and cannot be actioned")]
    NotActionable { status: OverallStatus },
    /// The current-level pointer does not match any workflow level. This
    /// indicates corrupted state, not ordinary user error.
    #[error("current approval level {level} does not exist in a workflow of {levels} levels")]
    LevelNotFound { level: u32, levels: usize },
}

/// Failures surfaced by a [`crate::store::RequestStore`] implementation.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("request number {0} already exists")]
    NumberTaken(String),
    /// The version token presented for a compare-and-swap was stale.
    #[error("stale version for request {0}")]
    VersionMismatch(String),
    #[error("failed to decode stored request: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] sled::Error),
}

/// Errors returned from the service layer to the caller.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("request {0} not found")]
    NotFound(String),
    /// The request was modified between load and write-back. The caller
    /// should re-fetch and retry.
    #[error("request {0} was modified concurrently")]
    Conflict(String),
    #[error("failed to allocate a unique request number after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
