// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::session, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * Every session route requires a valid bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (session runtime and config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            axum::http::HeaderValue::from_static("http://localhost:3000"),
            axum::http::HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let session_routes = Router::new()
        .route("/", get(session::open_session))
        .route("/start", post(session::start_session))
        .route("/answer", put(session::select_answer))
        .route("/flag", post(session::toggle_flag))
        .route("/navigate", post(session::navigate))
        .route("/advance", post(session::finish_or_advance))
        .route("/confirm/cancel", post(session::cancel_confirmation))
        .route("/focus", post(session::focus_event))
        .route("/submit", post(session::submit))
        .route("/submit/retry", post(session::retry_submission))
        .route("/result", get(session::get_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest(
            "/api/classes/{class_id}/assignments/{assignment_id}/session",
            session_routes,
        )
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
