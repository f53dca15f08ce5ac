// src/models/requests.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::session::integrity::FocusSignal;

/// DTO for choosing an option on the current question.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectAnswerRequest {
    #[validate(length(min = 1, max = 32))]
    pub option: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigateAction {
    Next,
    Prev,
    GoTo,
}

/// DTO for moving between questions. `index` is required for `go_to`.
#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub action: NavigateAction,
    pub index: Option<usize>,
}

/// DTO for a browser focus/visibility/context-menu event.
#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    pub signal: FocusSignal,
}

/// Reply to a focus event. `suppress` tells the client to cancel the native action.
#[derive(Debug, Serialize)]
pub struct FocusResponse {
    pub suppress: bool,
    pub tab_switch_count: u32,
}
