// src/models/assignment.rs

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduling and quota settings of one assignment.
/// Immutable for the duration of an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    pub id: i64,
    pub class_id: i64,

    /// Owner of the assignment; receives submission notifications.
    pub teacher_id: i64,
    pub test_id: i64,
    pub open_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,

    /// Maximum accepted submissions per student. 0 means unlimited.
    pub allowed_attempts: u32,
}

/// When a student may see their score after submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsVisibility {
    Always,
    AfterDue,
    Never,
}

impl fmt::Display for ResultsVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultsVisibility::Always => "always",
            ResultsVisibility::AfterDue => "after_due",
            ResultsVisibility::Never => "never",
        };
        f.write_str(s)
    }
}

impl FromStr for ResultsVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ResultsVisibility::Always),
            "after_due" => Ok(ResultsVisibility::AfterDue),
            "never" => Ok(ResultsVisibility::Never),
            other => Err(format!("unknown results visibility '{}'", other)),
        }
    }
}

/// A single-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub prompt: String,

    /// Option key (e.g. "A") to option content.
    pub options: BTreeMap<String, String>,

    /// Key of the correct option.
    pub correct_answer: String,
}

impl Question {
    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }
}

/// Read-only test content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestContent {
    pub id: i64,
    pub title: String,

    /// Time limit in minutes. 0 means untimed.
    pub duration_minutes: u32,

    /// Questions in presentation order.
    pub questions: Vec<Question>,
    pub results_visibility: ResultsVisibility,
}

impl TestContent {
    pub fn is_timed(&self) -> bool {
        self.duration_minutes > 0
    }
}

/// DTO for sending a question to the student (excludes the correct answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: BTreeMap<String, String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_visibility_parse() {
        assert_eq!("always".parse(), Ok(ResultsVisibility::Always));
        assert_eq!("after_due".parse(), Ok(ResultsVisibility::AfterDue));
        assert_eq!("never".parse(), Ok(ResultsVisibility::Never));
        assert!("sometimes".parse::<ResultsVisibility>().is_err());
    }

    #[test]
    fn test_public_question_hides_answer() {
        let q = Question {
            id: 7,
            prompt: "2 + 2".to_string(),
            options: BTreeMap::from([
                ("A".to_string(), "3".to_string()),
                ("B".to_string(), "4".to_string()),
            ]),
            correct_answer: "B".to_string(),
        };
        let json = serde_json::to_value(PublicQuestion::from(&q)).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert_eq!(json["options"]["B"], "4");
    }
}
