use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, AppState, Journal, Note, Task};
use tower::ServiceExt;

const TOKEN: &str = "test-token";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authed(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    authed(method, uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    authed(method, uri).body(String::new()).unwrap()
}

async fn send(state: &AppState, request: Request<String>) -> axum::response::Response {
    app(state.clone()).oneshot(request).await.unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401_with_message() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        Request::builder().uri("/api/tasks").body(String::new()).unwrap(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["message"], "Unauthorized");
}

#[tokio::test]
async fn wrong_token_returns_401() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        Request::builder()
            .uri("/api/notes")
            .header(http::header::AUTHORIZATION, "Bearer nope")
            .body(String::new())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hits_count_every_request() {
    let state = AppState::new(TOKEN);
    send(&state, empty_request("GET", "/api/journals")).await;
    send(
        &state,
        Request::builder().uri("/api/journals").body(String::new()).unwrap(),
    )
    .await;

    assert_eq!(state.hits("GET", "/api/journals"), 2);
    assert_eq!(state.hits("POST", "/api/journals"), 0);
}

// --- tasks ---

#[tokio::test]
async fn list_tasks_empty() {
    let state = AppState::new(TOKEN);
    let resp = send(&state, empty_request("GET", "/api/tasks")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Task> = body_json(resp).await;
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn create_task_returns_201() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        json_request("POST", "/api/tasks", r#"{"title":"Essay","priority":"high"}"#),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let task: Task = body_json(resp).await;
    assert_eq!(task.title, "Essay");
    assert!(!task.completed);
}

#[tokio::test]
async fn create_task_malformed_json_returns_422() {
    let state = AppState::new(TOKEN);
    let resp = send(&state, json_request("POST", "/api/tasks", r#"{"not_title":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn update_task_not_found() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        json_request("PATCH", "/api/tasks/99", r#"{"completed":true}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["message"], "Task not found");
}

#[tokio::test]
async fn bad_id_returns_400() {
    let state = AppState::new(TOKEN);
    let resp = send(&state, empty_request("DELETE", "/api/tasks/not-a-number")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_lifecycle() {
    let state = AppState::new(TOKEN);

    let resp = send(&state, json_request("POST", "/api/tasks", r#"{"title":"Walk dog"}"#)).await;
    let created: Task = body_json(resp).await;
    let id = created.id;

    let resp = send(
        &state,
        json_request("PATCH", &format!("/api/tasks/{id}"), r#"{"completed":true}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Task = body_json(resp).await;
    assert_eq!(updated.title, "Walk dog");
    assert!(updated.completed);

    let resp = send(
        &state,
        json_request("PATCH", &format!("/api/tasks/{id}"), r#"{"title":"Walk cat"}"#),
    )
    .await;
    let updated: Task = body_json(resp).await;
    assert_eq!(updated.title, "Walk cat");
    assert!(updated.completed);

    let resp = send(&state, empty_request("DELETE", &format!("/api/tasks/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&state, empty_request("DELETE", &format!("/api/tasks/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&state, empty_request("GET", "/api/tasks")).await;
    let tasks: Vec<Task> = body_json(resp).await;
    assert!(tasks.is_empty());
}

// --- notes ---

async fn create_note(state: &AppState, content: &str) -> Note {
    let body = serde_json::json!({ "title": "Biology", "content": content }).to_string();
    let resp = send(state, json_request("POST", "/api/notes", &body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

#[tokio::test]
async fn summarize_stores_summary() {
    let state = AppState::new(TOKEN);
    let note = create_note(&state, "Cells divide. Then they grow.").await;

    let body = format!(r#"{{"noteId":{}}}"#, note.id);
    let resp = send(&state, json_request("POST", "/api/notes/summarize", &body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let result: serde_json::Value = body_json(resp).await;
    assert_eq!(result["summary"], "Cells divide.");
    assert_eq!(result["note"]["summary"], "Cells divide.");

    let resp = send(&state, empty_request("GET", "/api/notes")).await;
    let notes: Vec<Note> = body_json(resp).await;
    assert_eq!(notes[0].summary.as_deref(), Some("Cells divide."));
}

#[tokio::test]
async fn summarize_offline_returns_500_message() {
    let state = AppState::new(TOKEN);
    let note = create_note(&state, "Anything.").await;
    state.set_summarizer_online(false);

    let body = format!(r#"{{"noteId":{}}}"#, note.id);
    let resp = send(&state, json_request("POST", "/api/notes/summarize", &body)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let result: serde_json::Value = body_json(resp).await;
    assert_eq!(result["message"], "model unavailable");
}

#[tokio::test]
async fn summarize_unknown_note_returns_404() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        json_request("POST", "/api/notes/summarize", r#"{"noteId":41}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_note_returns_204() {
    let state = AppState::new(TOKEN);
    let note = create_note(&state, "x").await;
    let resp = send(&state, empty_request("DELETE", &format!("/api/notes/{}", note.id))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// --- journals ---

#[tokio::test]
async fn create_and_list_journals() {
    let state = AppState::new(TOKEN);
    let resp = send(
        &state,
        json_request("POST", "/api/journals", r#"{"content":"Good focus","mood":"happy"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(&state, empty_request("GET", "/api/journals")).await;
    let journals: Vec<Journal> = body_json(resp).await;
    assert_eq!(journals.len(), 1);
    assert_eq!(journals[0].mood, "happy");
}

// --- session ---

#[tokio::test]
async fn open_session_sets_cookie() {
    let state = AppState::new(TOKEN);
    let resp = send(&state, empty_request("POST", "/api/session")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let cookie = resp.headers()[http::header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("sid=session-1;"), "{cookie}");
}

#[tokio::test]
async fn current_session_echoes_cookie() {
    let state = AppState::new(TOKEN);
    let resp = send(&state, empty_request("GET", "/api/session")).await;
    let body: serde_json::Value = body_json(resp).await;
    assert!(body["session"].is_null());

    let request = authed("GET", "/api/session")
        .header(http::header::COOKIE, "sid=session-9")
        .body(String::new())
        .unwrap();
    let body: serde_json::Value = body_json(send(&state, request).await).await;
    assert_eq!(body["session"], "session-9");
}
