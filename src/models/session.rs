// src/models/session.rs

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{assignment::PublicQuestion, submission::ResultView};

/// Composite key of one (user, assignment) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: i64,
    pub assignment_id: i64,
}

impl SessionKey {
    pub fn new(user_id: i64, assignment_id: i64) -> Self {
        Self {
            user_id,
            assignment_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}:{}", self.user_id, self.assignment_id)
    }
}

/// Durable, resumable state of an in-progress attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub current_index: usize,

    /// Question ID -> selected option key.
    pub answers: BTreeMap<i64, String>,
    pub flagged: BTreeSet<i64>,
    pub tab_switch_count: u32,

    /// Fixed once when the student starts. `None` for untimed tests.
    pub end_time: Option<DateTime<Utc>>,
}

/// Lifecycle of one attempt.
///
/// `loading -> {error | lobby | taking}`, `lobby -> taking`, `taking -> submitted`.
/// `error` and `submitted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Error,
    Lobby,
    Taking,
    Submitted,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Loading => "loading",
            Phase::Error => "error",
            Phase::Lobby => "lobby",
            Phase::Taking => "taking",
            Phase::Submitted => "submitted",
        }
    }

    /// Loading may go straight to taking when a snapshot is resumed.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Loading, Phase::Error)
                | (Phase::Loading, Phase::Lobby)
                | (Phase::Loading, Phase::Taking)
                | (Phase::Lobby, Phase::Taking)
                | (Phase::Taking, Phase::Submitted)
        )
    }
}

/// Short-lived message attached to the next view the student sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The resumed session had run out of time and was discarded.
    SessionExpired,

    /// Finish was requested with an unanswered question; moved there instead.
    MissedQuestion { index: usize },

    /// The submission write failed and can be retried.
    SubmissionFailed,
}

/// Everything the client needs to render the attempt. Never contains correct answers.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub phase: Phase,
    pub title: String,
    pub total_questions: usize,
    pub duration_minutes: u32,
    pub time_remaining_secs: Option<i64>,
    pub current_index: usize,
    pub question: Option<PublicQuestion>,
    pub answers: BTreeMap<i64, String>,
    pub flagged: BTreeSet<i64>,
    pub tab_switch_count: u32,
    pub confirm_open: bool,
    pub notice: Option<Notice>,
    pub result: Option<ResultView>,
}
