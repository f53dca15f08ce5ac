// src/providers/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};

use crate::{
    models::{
        assignment::{AssignmentConfig, Question, ResultsVisibility, TestContent},
        session::{SessionKey, SessionSnapshot},
        submission::{RecordedAnswer, SubmissionRecord, SubmitTrigger},
    },
    providers::{AttemptHistory, ContentProvider, Notifier, StoredSubmission, SubmissionStore},
    session::{error::StoreError, store::SessionStore},
};

/// PostgreSQL-backed implementation of every collaborator.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper struct for fetching assignment rows.
#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: i64,
    class_id: i64,
    teacher_id: i64,
    test_id: i64,
    open_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
    allowed_attempts: i32,
}

#[derive(sqlx::FromRow)]
struct TestRow {
    id: i64,
    title: String,
    duration_minutes: i32,
    results_visibility: String,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    prompt: String,
    options: Json<BTreeMap<String, String>>,
    correct_answer: String,
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    user_id: i64,
    assignment_id: i64,
    test_id: i64,
    score: i32,
    total_questions: i32,
    answers: Json<BTreeMap<i64, RecordedAnswer>>,
    tab_switches: i32,
    submit_trigger: String,
    submitted_at: DateTime<Utc>,
    attempts_taken: i32,
}

#[async_trait]
impl ContentProvider for PgStore {
    async fn get_assignment(
        &self,
        class_id: i64,
        assignment_id: i64,
    ) -> Result<AssignmentConfig, StoreError> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, class_id, teacher_id, test_id, open_at, due_at, allowed_attempts
            FROM assignments
            WHERE id = $1 AND class_id = $2
            "#,
        )
        .bind(assignment_id)
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch assignment {}: {:?}", assignment_id, e);
            StoreError::from(e)
        })?
        .ok_or_else(|| StoreError::NotFound(format!("assignment {}", assignment_id)))?;

        Ok(AssignmentConfig {
            id: row.id,
            class_id: row.class_id,
            teacher_id: row.teacher_id,
            test_id: row.test_id,
            open_at: row.open_at,
            due_at: row.due_at,
            allowed_attempts: row.allowed_attempts.max(0) as u32,
        })
    }

    async fn get_test(&self, test_id: i64) -> Result<TestContent, StoreError> {
        let test = sqlx::query_as::<_, TestRow>(
            "SELECT id, title, duration_minutes, results_visibility FROM tests WHERE id = $1",
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("test {}", test_id)))?;

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, prompt, options, correct_answer
            FROM questions
            WHERE test_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions for test {}: {:?}", test_id, e);
            StoreError::from(e)
        })?;

        let results_visibility = test
            .results_visibility
            .parse::<ResultsVisibility>()
            .map_err(StoreError::Backend)?;

        Ok(TestContent {
            id: test.id,
            title: test.title,
            duration_minutes: test.duration_minutes.max(0) as u32,
            questions: questions
                .into_iter()
                .map(|q| Question {
                    id: q.id,
                    prompt: q.prompt,
                    options: q.options.0,
                    correct_answer: q.correct_answer,
                })
                .collect(),
            results_visibility,
        })
    }
}

#[async_trait]
impl AttemptHistory for PgStore {
    async fn count_attempts(&self, assignment_id: i64, user_id: i64) -> Result<u32, StoreError> {
        let taken: Option<i32> = sqlx::query_scalar(
            "SELECT attempts_taken FROM submissions WHERE assignment_id = $1 AND user_id = $2",
        )
        .bind(assignment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(taken.unwrap_or(0).max(0) as u32)
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn upsert_submission(
        &self,
        key: &SessionKey,
        record: &SubmissionRecord,
    ) -> Result<u32, StoreError> {
        // Upsert: the latest attempt replaces the row, the counter only ever grows.
        let attempts_taken: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO submissions (
                user_id, assignment_id, test_id, score, total_questions,
                answers, tab_switches, submit_trigger, submitted_at, attempts_taken
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1)
            ON CONFLICT (user_id, assignment_id) DO UPDATE SET
                test_id = EXCLUDED.test_id,
                score = EXCLUDED.score,
                total_questions = EXCLUDED.total_questions,
                answers = EXCLUDED.answers,
                tab_switches = EXCLUDED.tab_switches,
                submit_trigger = EXCLUDED.submit_trigger,
                submitted_at = EXCLUDED.submitted_at,
                attempts_taken = submissions.attempts_taken + 1
            RETURNING attempts_taken
            "#,
        )
        .bind(key.user_id)
        .bind(key.assignment_id)
        .bind(record.test_id)
        .bind(record.score as i32)
        .bind(record.total_questions as i32)
        .bind(Json(&record.answers))
        .bind(record.tab_switches as i32)
        .bind(record.trigger.as_str())
        .bind(record.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert submission for {}: {:?}", key, e);
            StoreError::from(e)
        })?;

        Ok(attempts_taken.max(0) as u32)
    }

    async fn get_submission(&self, key: &SessionKey) -> Result<Option<StoredSubmission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT user_id, assignment_id, test_id, score, total_questions, answers,
                   tab_switches, submit_trigger, submitted_at, attempts_taken
            FROM submissions
            WHERE user_id = $1 AND assignment_id = $2
            "#,
        )
        .bind(key.user_id)
        .bind(key.assignment_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let trigger = row
            .submit_trigger
            .parse::<SubmitTrigger>()
            .map_err(StoreError::Backend)?;

        Ok(Some(StoredSubmission {
            record: SubmissionRecord {
                user_id: row.user_id,
                assignment_id: row.assignment_id,
                test_id: row.test_id,
                score: row.score.max(0) as u32,
                total_questions: row.total_questions.max(0) as u32,
                answers: row.answers.0,
                tab_switches: row.tab_switches.max(0) as u32,
                trigger,
                submitted_at: row.submitted_at,
            },
            attempts_taken: row.attempts_taken.max(0) as u32,
        }))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>, StoreError> {
        let snapshot: Option<Json<SessionSnapshot>> = sqlx::query_scalar(
            "SELECT snapshot FROM session_snapshots WHERE user_id = $1 AND assignment_id = $2",
        )
        .bind(key.user_id)
        .bind(key.assignment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot.map(|s| s.0))
    }

    async fn save(&self, key: &SessionKey, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_snapshots (user_id, assignment_id, snapshot, updated_at)
            VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
            ON CONFLICT (user_id, assignment_id) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.user_id)
        .bind(key.assignment_id)
        .bind(Json(snapshot))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_snapshots WHERE user_id = $1 AND assignment_id = $2")
            .bind(key.user_id)
            .bind(key.assignment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for PgStore {
    async fn notify(
        &self,
        recipient_id: i64,
        kind: &str,
        title: &str,
        body: &str,
        link: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, kind, title, body, link)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(recipient_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(link)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
