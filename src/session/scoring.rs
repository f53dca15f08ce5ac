// src/session/scoring.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    models::{
        assignment::{Question, TestContent},
        session::{SessionKey, SessionSnapshot},
        submission::{RecordedAnswer, SubmissionRecord, SubmitTrigger, WriteStatus},
    },
    session::error::SessionError,
};

/// Counts questions whose recorded answer matches the answer key.
/// Unanswered questions are simply incorrect.
pub fn calculate_score(questions: &[Question], answers: &BTreeMap<i64, String>) -> u32 {
    questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
        .count() as u32
}

/// One entry per question, with the `Unanswered` marker for gaps.
pub fn record_answers(
    questions: &[Question],
    answers: &BTreeMap<i64, String>,
) -> BTreeMap<i64, RecordedAnswer> {
    questions
        .iter()
        .map(|q| {
            let recorded = match answers.get(&q.id) {
                Some(option) => RecordedAnswer::Selected(option.clone()),
                None => RecordedAnswer::Unanswered,
            };
            (q.id, recorded)
        })
        .collect()
}

pub fn build_record(
    key: SessionKey,
    test: &TestContent,
    snapshot: &SessionSnapshot,
    trigger: SubmitTrigger,
    submitted_at: DateTime<Utc>,
) -> SubmissionRecord {
    SubmissionRecord {
        user_id: key.user_id,
        assignment_id: key.assignment_id,
        test_id: test.id,
        score: calculate_score(&test.questions, &snapshot.answers),
        total_questions: test.questions.len() as u32,
        answers: record_answers(&test.questions, &snapshot.answers),
        tab_switches: snapshot.tab_switch_count,
        trigger,
        submitted_at,
    }
}

/// A computed result and the state of its write.
///
/// Exists only once the attempt has left `taking`; it is never turned back
/// into an editable session.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub record: SubmissionRecord,
    pub status: WriteStatus,
    pub attempts_taken: Option<u32>,
    pub last_error: Option<String>,
}

impl PendingSubmission {
    pub fn new(record: SubmissionRecord) -> Self {
        Self {
            record,
            status: WriteStatus::InFlight,
            attempts_taken: None,
            last_error: None,
        }
    }

    /// Claims a retry. Only a failed write may be retried, and only one at a time.
    pub fn begin_retry(&mut self) -> Result<SubmissionRecord, SessionError> {
        match self.status {
            WriteStatus::Failed => {
                self.status = WriteStatus::InFlight;
                Ok(self.record.clone())
            }
            WriteStatus::InFlight => Err(SessionError::InvalidPhase("saving")),
            WriteStatus::Accepted => Err(SessionError::InvalidPhase("submitted")),
        }
    }

    pub fn accept(&mut self, attempts_taken: u32) {
        self.status = WriteStatus::Accepted;
        self.attempts_taken = Some(attempts_taken);
        self.last_error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.status = WriteStatus::Failed;
        self.last_error = Some(error);
    }
}
