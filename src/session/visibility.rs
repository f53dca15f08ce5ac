// src/session/visibility.rs

use chrono::{DateTime, Utc};

use crate::models::assignment::ResultsVisibility;

/// Whether the student may see their score after submitting.
///
/// `after_due` without a due date never reveals.
pub fn may_reveal_score(
    policy: ResultsVisibility,
    due_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match policy {
        ResultsVisibility::Always => true,
        ResultsVisibility::Never => false,
        ResultsVisibility::AfterDue => due_at.is_some_and(|due| now >= due),
    }
}
