// src/models/submission.rs

use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How one question was left at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "option", rename_all = "snake_case")]
pub enum RecordedAnswer {
    Selected(String),
    Unanswered,
}

/// What ended the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

impl SubmitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::Timeout => "timeout",
        }
    }
}

impl FromStr for SubmitTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SubmitTrigger::Manual),
            "timeout" => Ok(SubmitTrigger::Timeout),
            other => Err(format!("unknown submit trigger '{}'", other)),
        }
    }
}

/// The graded result of one attempt, written once per accepted submission.
/// `attempts_taken` is maintained by the store and is not part of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub user_id: i64,
    pub assignment_id: i64,
    pub test_id: i64,
    pub score: u32,
    pub total_questions: u32,

    /// Every question of the test, answered or not.
    pub answers: BTreeMap<i64, RecordedAnswer>,
    pub tab_switches: u32,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
}

/// State of the final write as seen by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    InFlight,
    Accepted,
    Failed,
}

/// Submitted-phase summary. `score` is `None` when the visibility policy hides it.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub write_status: WriteStatus,
    pub trigger: SubmitTrigger,
    pub score: Option<u32>,
    pub total_questions: u32,
    pub attempts_taken: Option<u32>,
    pub submitted_at: DateTime<Utc>,

    /// Reason the last write failed, while a retry is pending.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanswered_marker_is_distinct() {
        let selected = serde_json::to_value(RecordedAnswer::Selected("A".to_string())).unwrap();
        let unanswered = serde_json::to_value(RecordedAnswer::Unanswered).unwrap();

        assert_eq!(selected, serde_json::json!({"status": "selected", "option": "A"}));
        assert_eq!(unanswered, serde_json::json!({"status": "unanswered"}));
    }

    #[test]
    fn test_trigger_parses_stored_form() {
        for trigger in [SubmitTrigger::Manual, SubmitTrigger::Timeout] {
            assert_eq!(trigger.as_str().parse::<SubmitTrigger>(), Ok(trigger));
        }
        assert!("auto".parse::<SubmitTrigger>().is_err());
    }
}
