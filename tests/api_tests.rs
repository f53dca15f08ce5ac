// tests/api_tests.rs

mod common;

use assessment::{
    config::Config,
    models::assignment::ResultsVisibility,
    routes,
    state::AppState,
    utils::jwt::sign_jwt,
};
use chrono::Duration;
use common::*;
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    fixture: Fixture,
}

impl TestApp {
    fn session_url(&self, path: &str) -> String {
        format!(
            "{}/api/classes/{}/assignments/{}/session{}",
            self.address, CLASS_ID, ASSIGNMENT_ID, path
        )
    }
}

fn token() -> String {
    sign_jwt(USER_ID, "student", SECRET, 600).expect("Failed to sign token")
}

/// Helper function to spawn the app on a random port for testing,
/// backed by the in-memory collaborators.
async fn spawn_app(fixture: Fixture) -> TestApp {
    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        timer_tick_ms: 1000,
    };

    let state = AppState {
        runtime: fixture.runtime.clone(),
        config,
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        fixture,
    }
}

async fn default_app() -> TestApp {
    let fixture = Fixture::new(
        assignment(1, None),
        three_question_test(10, ResultsVisibility::Always),
    )
    .await;
    spawn_app(fixture).await
}

async fn call(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: String,
    body: Option<Value>,
) -> (u16, Value) {
    let mut request = client
        .request(method, url)
        .header("Authorization", format!("Bearer {}", token()));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Failed to execute request");
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &reqwest::Client, url: String) -> (u16, Value) {
    call(client, reqwest::Method::GET, url, None).await
}

async fn post(client: &reqwest::Client, url: String, body: Option<Value>) -> (u16, Value) {
    call(client, reqwest::Method::POST, url, body).await
}

async fn put(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    call(client, reqwest::Method::PUT, url, Some(body)).await
}

/// Opens, starts and answers all three questions up to the confirmation.
async fn reach_confirmation(app: &TestApp, client: &reqwest::Client) {
    let (status, _) = get(client, app.session_url("")).await;
    assert_eq!(status, 200);
    let (status, _) = post(client, app.session_url("/start"), None).await;
    assert_eq!(status, 200);

    for option in ["A", "B", "C"] {
        let (status, _) = put(client, app.session_url("/answer"), json!({ "option": option })).await;
        assert_eq!(status, 200);
        let (status, _) = post(client, app.session_url("/advance"), None).await;
        assert_eq!(status, 200);
    }
}

#[tokio::test]
async fn unknown_path_404() {
    let app = default_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn session_requires_token() {
    let app = default_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(app.session_url(""))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(app.session_url(""))
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn full_attempt_flow() {
    let app = default_app().await;
    let client = reqwest::Client::new();

    let (status, lobby) = get(&client, app.session_url("")).await;
    assert_eq!(status, 200);
    assert_eq!(lobby["phase"], "lobby");
    assert_eq!(lobby["total_questions"], 3);

    let (status, taking) = post(&client, app.session_url("/start"), None).await;
    assert_eq!(status, 200);
    assert_eq!(taking["phase"], "taking");
    assert_eq!(taking["time_remaining_secs"], 600);
    assert_eq!(taking["question"]["id"], 1);
    assert!(
        taking["question"].get("correct_answer").is_none(),
        "correct answer must never reach the client"
    );

    let (status, flagged) = post(&client, app.session_url("/flag"), None).await;
    assert_eq!(status, 200);
    assert_eq!(flagged["flagged"], json!([1]));

    for option in ["A", "B", "C"] {
        put(&client, app.session_url("/answer"), json!({ "option": option })).await;
        post(&client, app.session_url("/advance"), None).await;
    }
    let (_, view) = get(&client, app.session_url("")).await;
    assert_eq!(view["confirm_open"], true);

    let (status, submitted) = post(&client, app.session_url("/submit"), None).await;
    assert_eq!(status, 200);
    assert_eq!(submitted["phase"], "submitted");
    assert_eq!(submitted["result"]["score"], 3);
    assert_eq!(submitted["result"]["write_status"], "accepted");
    assert_eq!(submitted["result"]["trigger"], "manual");

    let (status, result) = get(&client, app.session_url("/result")).await;
    assert_eq!(status, 200);
    assert_eq!(result["result"]["attempts_taken"], 1);

    // One attempt allowed: the next open is refused.
    let (status, refused) = get(&client, app.session_url("")).await;
    assert_eq!(status, 403);
    assert_eq!(refused["reason"], "quota_exceeded");

    assert_eq!(app.fixture.submissions.write_count(), 1);
}

#[tokio::test]
async fn navigation_and_answer_validation() {
    let app = default_app().await;
    let client = reqwest::Client::new();
    get(&client, app.session_url("")).await;
    post(&client, app.session_url("/start"), None).await;

    let (status, _) = put(&client, app.session_url("/answer"), json!({ "option": "Z" })).await;
    assert_eq!(status, 400);
    let (status, _) = put(&client, app.session_url("/answer"), json!({ "option": "" })).await;
    assert_eq!(status, 400);

    let (status, view) = post(
        &client,
        app.session_url("/navigate"),
        Some(json!({ "action": "go_to", "index": 2 })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(view["current_index"], 2);

    let (status, _) = post(
        &client,
        app.session_url("/navigate"),
        Some(json!({ "action": "go_to", "index": 7 })),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post(
        &client,
        app.session_url("/navigate"),
        Some(json!({ "action": "go_to" })),
    )
    .await;
    assert_eq!(status, 400);

    let (_, view) = post(
        &client,
        app.session_url("/navigate"),
        Some(json!({ "action": "next" })),
    )
    .await;
    assert_eq!(view["current_index"], 2, "next clamps at the last question");

    // Finishing with unanswered questions jumps back instead of confirming.
    let (_, view) = post(&client, app.session_url("/advance"), None).await;
    assert_eq!(view["confirm_open"], false);
    assert_eq!(view["notice"]["kind"], "missed_question");
    assert_eq!(view["notice"]["index"], 0);
}

#[tokio::test]
async fn submit_needs_confirmation() {
    let app = default_app().await;
    let client = reqwest::Client::new();
    get(&client, app.session_url("")).await;
    post(&client, app.session_url("/start"), None).await;

    let (status, _) = post(&client, app.session_url("/submit"), None).await;
    assert_eq!(status, 409);

    let (status, _) = get(&client, app.session_url("/result")).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn focus_events_are_counted() {
    let app = default_app().await;
    let client = reqwest::Client::new();
    get(&client, app.session_url("")).await;
    post(&client, app.session_url("/start"), None).await;

    let (status, body) = post(
        &client,
        app.session_url("/focus"),
        Some(json!({ "signal": "context_menu" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["suppress"], true);

    let (_, body) = post(
        &client,
        app.session_url("/focus"),
        Some(json!({ "signal": "window_blur" })),
    )
    .await;
    assert_eq!(body["suppress"], false);
    assert_eq!(body["tab_switch_count"], 1);

    let (_, body) = post(
        &client,
        app.session_url("/focus"),
        Some(json!({ "signal": "document_hidden" })),
    )
    .await;
    assert_eq!(body["tab_switch_count"], 1);
}

#[tokio::test]
async fn failed_write_returns_503_then_retry_succeeds() {
    let app = default_app().await;
    let client = reqwest::Client::new();
    reach_confirmation(&app, &client).await;

    app.fixture.submissions.fail_next_writes(1);
    let (status, body) = post(&client, app.session_url("/submit"), None).await;
    assert_eq!(status, 503);
    assert_eq!(body["reason"], "retry");

    let (_, view) = get(&client, app.session_url("")).await;
    assert_eq!(view["phase"], "submitted");
    assert_eq!(view["result"]["write_status"], "failed");
    assert_eq!(view["notice"]["kind"], "submission_failed");

    let (status, retried) = post(&client, app.session_url("/submit/retry"), None).await;
    assert_eq!(status, 200);
    assert_eq!(retried["result"]["write_status"], "accepted");
    assert_eq!(app.fixture.submissions.write_count(), 1);
}

#[tokio::test]
async fn ineligible_assignments_are_refused() {
    let fixture = Fixture::new(
        assignment(1, Some(t0() - Duration::days(1))),
        three_question_test(10, ResultsVisibility::Always),
    )
    .await;
    let app = spawn_app(fixture).await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, app.session_url("")).await;
    assert_eq!(status, 403);
    assert_eq!(body["reason"], "deadline_passed");

    let (status, _) = get(
        &client,
        format!(
            "{}/api/classes/{}/assignments/{}/session",
            app.address, CLASS_ID, 4040
        ),
    )
    .await;
    assert_eq!(status, 404);
}
