use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub due_date: Option<String>,
    pub priority: Priority,
    pub completed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub summary: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateNote {
    pub title: String,
    pub content: String,
    #[serde(default = "general")]
    pub category: String,
}

fn general() -> String {
    "general".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeNote {
    pub note_id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Journal {
    pub id: u64,
    pub content: String,
    pub mood: String,
    pub activities: String,
}

#[derive(Deserialize)]
pub struct CreateJournal {
    pub content: String,
    #[serde(default = "neutral")]
    pub mood: String,
    #[serde(default)]
    pub activities: String,
}

fn neutral() -> String {
    "neutral".to_string()
}

#[derive(Default)]
struct Store {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
    notes: BTreeMap<u64, Note>,
    journals: BTreeMap<u64, Journal>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared server state. Clones share the same store.
#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    summarizer_online: Arc<AtomicBool>,
    store: Arc<RwLock<Store>>,
    hits: Arc<Mutex<HashMap<String, u64>>>,
}

impl AppState {
    /// State that accepts `Authorization: Bearer <token>`.
    pub fn new(token: &str) -> Self {
        Self {
            token: Arc::from(token),
            summarizer_online: Arc::new(AtomicBool::new(true)),
            store: Arc::new(RwLock::new(Store::default())),
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set_summarizer_online(&self, online: bool) {
        self.summarizer_online.store(online, Ordering::SeqCst);
    }

    /// Requests seen for `method path`, authorized or not.
    pub fn hits(&self, method: &str, path: &str) -> u64 {
        let hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        hits.get(&format!("{method} {path}")).copied().unwrap_or(0)
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/summarize", post(summarize_note))
        .route("/api/notes/{id}", delete(delete_note))
        .route("/api/journals", get(list_journals).post(create_journal))
        .route("/api/session", get(current_session).post(open_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

async fn count_hits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = format!("{} {}", request.method(), request.uri().path());
    debug!(%key, "request");
    *state
        .hits
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(0) += 1;
    next.run(request).await
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.token);
    if !authorized {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    next.run(request).await
}

// --- tasks ---

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    Json(state.store.read().await.tasks.values().cloned().collect())
}

async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<CreateTask>,
) -> (StatusCode, Json<Task>) {
    let mut store = state.store.write().await;
    let task = Task {
        id: store.next_id(),
        title: input.title,
        description: input.description,
        due_date: input.due_date,
        priority: input.priority,
        completed: false,
    };
    store.tasks.insert(task.id, task.clone());
    (StatusCode::CREATED, Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateTask>,
) -> Result<Json<Task>, Response> {
    let mut store = state.store.write().await;
    let task = store
        .tasks
        .get_mut(&id)
        .ok_or_else(|| message(StatusCode::NOT_FOUND, "Task not found"))?;
    if let Some(title) = input.title {
        task.title = title;
    }
    if let Some(description) = input.description {
        task.description = description;
    }
    if let Some(due_date) = input.due_date {
        task.due_date = Some(due_date);
    }
    if let Some(priority) = input.priority {
        task.priority = priority;
    }
    if let Some(completed) = input.completed {
        task.completed = completed;
    }
    Ok(Json(task.clone()))
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.store.write().await.tasks.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => message(StatusCode::NOT_FOUND, "Task not found"),
    }
}

// --- notes ---

async fn list_notes(State(state): State<AppState>) -> Json<Vec<Note>> {
    Json(state.store.read().await.notes.values().cloned().collect())
}

async fn create_note(
    State(state): State<AppState>,
    Json(input): Json<CreateNote>,
) -> (StatusCode, Json<Note>) {
    let mut store = state.store.write().await;
    let note = Note {
        id: store.next_id(),
        title: input.title,
        content: input.content,
        category: input.category,
        summary: None,
    };
    store.notes.insert(note.id, note.clone());
    (StatusCode::CREATED, Json(note))
}

async fn delete_note(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.store.write().await.notes.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => message(StatusCode::NOT_FOUND, "Note not found"),
    }
}

async fn summarize_note(
    State(state): State<AppState>,
    Json(input): Json<SummarizeNote>,
) -> Response {
    if !state.summarizer_online.load(Ordering::SeqCst) {
        return message(StatusCode::INTERNAL_SERVER_ERROR, "model unavailable");
    }
    let mut store = state.store.write().await;
    let Some(note) = store.notes.get_mut(&input.note_id) else {
        return message(StatusCode::NOT_FOUND, "Note not found");
    };
    let summary = summarize(&note.content);
    note.summary = Some(summary.clone());
    Json(json!({ "note": note.clone(), "summary": summary })).into_response()
}

/// First sentence of `content`, at most 120 characters.
pub fn summarize(content: &str) -> String {
    let first = match content.find(". ") {
        Some(end) => &content[..=end],
        None => content,
    };
    first.trim().chars().take(120).collect()
}

// --- session ---

/// Name of the session cookie issued by `POST /api/session`.
pub const SESSION_COOKIE: &str = "sid";

async fn open_session(State(state): State<AppState>) -> Response {
    let id = state.store.write().await.next_id();
    let cookie = format!("{SESSION_COOKIE}=session-{id}; Path=/; HttpOnly");
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response()
}

async fn current_session(headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({ "session": session_id(&headers) }))
}

/// The session id carried in the request's `Cookie` headers, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, id)| id.to_string())
}

// --- journals ---

async fn list_journals(State(state): State<AppState>) -> Json<Vec<Journal>> {
    Json(state.store.read().await.journals.values().cloned().collect())
}

async fn create_journal(
    State(state): State<AppState>,
    Json(input): Json<CreateJournal>,
) -> (StatusCode, Json<Journal>) {
    let mut store = state.store.write().await;
    let journal = Journal {
        id: store.next_id(),
        content: input.content,
        mood: input.mood,
        activities: input.activities,
    };
    store.journals.insert(journal.id, journal.clone());
    (StatusCode::CREATED, Json(journal))
}
