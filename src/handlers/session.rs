// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        requests::{FocusRequest, FocusResponse, NavigateAction, NavigateRequest, SelectAnswerRequest},
        session::SessionKey,
    },
    session::{SessionRuntime, integrity::SignalOutcome, navigation::Navigation},
    utils::jwt::Claims,
};

/// Path parameters shared by every session route.
type AssignmentPath = Path<(i64, i64)>;

fn session_key(claims: &Claims, assignment_id: i64) -> Result<SessionKey, AppError> {
    Ok(SessionKey::new(claims.user_id()?, assignment_id))
}

/// Opens the student's attempt for an assignment.
///
/// * Runs the eligibility gate (403 with a `reason` when refused).
/// * Resumes a stored session that still has time left.
/// * Otherwise returns the lobby, with a `session_expired` notice if a stale
///   session was discarded.
pub async fn open_session(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((class_id, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let view = runtime.open(user_id, class_id, assignment_id).await?;
    Ok(Json(view))
}

/// Starts the attempt. The end time is fixed here.
pub async fn start_session(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.start(&key).await?))
}

/// Records or replaces the answer to the current question.
pub async fn select_answer(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.select_answer(&key, &payload.option).await?))
}

pub async fn toggle_flag(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.toggle_flag(&key).await?))
}

pub async fn navigate(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let navigation = match (payload.action, payload.index) {
        (NavigateAction::Next, _) => Navigation::Next,
        (NavigateAction::Prev, _) => Navigation::Prev,
        (NavigateAction::GoTo, Some(index)) => Navigation::GoTo(index),
        (NavigateAction::GoTo, None) => {
            return Err(AppError::BadRequest("go_to requires an index".to_string()));
        }
    };

    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.navigate(&key, navigation).await?))
}

/// Next question, or the finish step on the last one.
///
/// Returns a `missed_question` notice when something is still unanswered,
/// and `confirm_open = true` once everything is.
pub async fn finish_or_advance(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.finish_or_advance(&key).await?))
}

pub async fn cancel_confirmation(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.cancel_confirmation(&key).await?))
}

/// Receives focus, visibility and context-menu events from the client.
pub async fn focus_event(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
    Json(payload): Json<FocusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    let (outcome, tab_switch_count) = runtime.focus_signal(&key, payload.signal).await?;

    Ok(Json(FocusResponse {
        suppress: outcome == SignalOutcome::Suppressed,
        tab_switch_count,
    }))
}

/// Confirmed submission. A 503 means the result was computed but not saved;
/// the client should offer `/submit/retry`.
pub async fn submit(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.submit(&key).await?))
}

pub async fn retry_submission(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((_, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.retry_submission(&key).await?))
}

/// Submitted view. `result.score` is null when the visibility policy hides it.
pub async fn get_result(
    State(runtime): State<SessionRuntime>,
    Extension(claims): Extension<Claims>,
    Path((class_id, assignment_id)): AssignmentPath,
) -> Result<impl IntoResponse, AppError> {
    let key = session_key(&claims, assignment_id)?;
    Ok(Json(runtime.result(class_id, &key).await?))
}
