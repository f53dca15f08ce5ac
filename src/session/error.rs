// src/session/error.rs

use thiserror::Error;

/// Reasons the eligibility gate refuses an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    DeadlinePassed,
    QuotaExceeded,
    NotYetOpen,
}

/// Failure reported by a collaborator (content, history, submission or snapshot store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Errors produced by the session runtime.
///
/// Eligibility and content errors are fatal to the attempt. Only
/// `SubmissionWriteFailed` may be retried, and only by the user.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Assignment or test content is missing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("the assignment deadline has passed")]
    DeadlinePassed,

    #[error("the attempt quota for this assignment is used up")]
    QuotaExceeded,

    #[error("the assignment is not open yet")]
    NotYetOpen,

    /// The attempt clock reached zero; the timer submits on its next tick.
    #[error("time is up for this attempt")]
    TimeUp,

    /// The final write failed. The score is kept and the write can be retried.
    #[error("submission could not be saved: {0}")]
    SubmissionWriteFailed(String),

    #[error("operation not allowed while the attempt is {0}")]
    InvalidPhase(&'static str),

    #[error("option '{0}' does not exist for this question")]
    InvalidOption(String),

    #[error("question index {index} is out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the finish confirmation must be open before submitting")]
    ConfirmationRequired,

    #[error("no active attempt for this assignment")]
    NoActiveAttempt,

    #[error(transparent)]
    Store(StoreError),
}

impl SessionError {
    /// Only a failed submission write is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::SubmissionWriteFailed(_))
    }
}

impl From<IneligibleReason> for SessionError {
    fn from(reason: IneligibleReason) -> Self {
        match reason {
            IneligibleReason::DeadlinePassed => SessionError::DeadlinePassed,
            IneligibleReason::QuotaExceeded => SessionError::QuotaExceeded,
            IneligibleReason::NotYetOpen => SessionError::NotYetOpen,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => SessionError::NotFound(what),
            other => SessionError::Store(other),
        }
    }
}
