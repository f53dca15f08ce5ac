// src/providers/mod.rs

//! Collaborators the session runtime consumes: content, attempt history,
//! submission storage and notifications. Each has a PostgreSQL and an
//! in-memory implementation.

use async_trait::async_trait;

use crate::{
    models::{
        assignment::{AssignmentConfig, TestContent},
        session::SessionKey,
        submission::SubmissionRecord,
    },
    session::error::StoreError,
};

pub mod memory;
pub mod postgres;

/// Read-only access to assignments and tests.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn get_assignment(
        &self,
        class_id: i64,
        assignment_id: i64,
    ) -> Result<AssignmentConfig, StoreError>;

    /// Questions are returned in presentation order.
    async fn get_test(&self, test_id: i64) -> Result<TestContent, StoreError>;
}

#[async_trait]
pub trait AttemptHistory: Send + Sync {
    /// Number of accepted submissions for this (user, assignment).
    async fn count_attempts(&self, assignment_id: i64, user_id: i64) -> Result<u32, StoreError>;
}

/// Stored row: the last merged record plus the server-side counter.
#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub record: SubmissionRecord,
    pub attempts_taken: u32,
}

/// Durable submission storage keyed by (user, assignment).
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Merges `record` into the row for `key` and atomically increments
    /// `attempts_taken`. Returns the counter after the increment.
    async fn upsert_submission(
        &self,
        key: &SessionKey,
        record: &SubmissionRecord,
    ) -> Result<u32, StoreError>;

    async fn get_submission(&self, key: &SessionKey) -> Result<Option<StoredSubmission>, StoreError>;
}

/// Fire-and-forget notifications. Failures never affect the submission.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        link: &str,
    ) -> Result<(), StoreError>;
}
