// src/providers/memory.rs

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    models::{
        assignment::{AssignmentConfig, TestContent},
        session::SessionKey,
        submission::SubmissionRecord,
    },
    providers::{AttemptHistory, ContentProvider, Notifier, StoredSubmission, SubmissionStore},
    session::error::StoreError,
};

#[derive(Debug, Default)]
pub struct MemoryContent {
    assignments: RwLock<HashMap<(i64, i64), AssignmentConfig>>,
    tests: RwLock<HashMap<i64, TestContent>>,
}

impl MemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_assignment(&self, assignment: AssignmentConfig) {
        self.assignments
            .write()
            .await
            .insert((assignment.class_id, assignment.id), assignment);
    }

    pub async fn insert_test(&self, test: TestContent) {
        self.tests.write().await.insert(test.id, test);
    }
}

#[async_trait]
impl ContentProvider for MemoryContent {
    async fn get_assignment(
        &self,
        class_id: i64,
        assignment_id: i64,
    ) -> Result<AssignmentConfig, StoreError> {
        self.assignments
            .read()
            .await
            .get(&(class_id, assignment_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("assignment {}", assignment_id)))
    }

    async fn get_test(&self, test_id: i64) -> Result<TestContent, StoreError> {
        self.tests
            .read()
            .await
            .get(&test_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("test {}", test_id)))
    }
}

/// Submission store and attempt history sharing one map.
///
/// `fail_next_writes` makes the next N upserts fail, to exercise retries.
#[derive(Debug, Default)]
pub struct MemorySubmissions {
    rows: RwLock<HashMap<SessionKey, StoredSubmission>>,
    writes: AtomicU32,
    failures_pending: AtomicU32,
}

impl MemorySubmissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Number of upserts that reached the store successfully.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissions {
    async fn upsert_submission(
        &self,
        key: &SessionKey,
        record: &SubmissionRecord,
    ) -> Result<u32, StoreError> {
        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Backend("simulated network failure".to_string()));
        }

        let mut rows = self.rows.write().await;
        let row = rows.entry(*key).or_insert_with(|| StoredSubmission {
            record: record.clone(),
            attempts_taken: 0,
        });
        row.record = record.clone();
        row.attempts_taken += 1;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row.attempts_taken)
    }

    async fn get_submission(&self, key: &SessionKey) -> Result<Option<StoredSubmission>, StoreError> {
        Ok(self.rows.read().await.get(key).cloned())
    }
}

#[async_trait]
impl AttemptHistory for MemorySubmissions {
    async fn count_attempts(&self, assignment_id: i64, user_id: i64) -> Result<u32, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .get(&SessionKey::new(user_id, assignment_id))
            .map_or(0, |row| row.attempts_taken))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: String,
}

#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: RwLock<Vec<SentNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(
        &self,
        recipient_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        link: &str,
    ) -> Result<(), StoreError> {
        self.sent.write().await.push(SentNotification {
            recipient_id,
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            link: link.to_string(),
        });
        Ok(())
    }
}
