use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const SESSION_EXPIRED: &str = "A valid login session was not found. Please log in and try again.";
pub const INVALID_CSRF: &str = "[[error:invalid-csrf]]";
pub const NO_POST: &str = "[[error:no-post]]";

#[derive(Debug, Clone)]
pub struct Settings {
    pub relative_path: String,
    pub csrf_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relative_path: String::new(),
            csrf_token: "test-csrf-token".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub pid: u64,
    pub title: Option<String>,
    pub content: String,
}

#[derive(Deserialize)]
pub struct CreatePost {
    pub title: Option<String>,
    pub content: String,
}

#[derive(Deserialize)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone)]
struct AppState {
    posts: Arc<RwLock<HashMap<u64, Post>>>,
    next_pid: Arc<AtomicU64>,
    relative_path: Arc<str>,
    csrf_token: Arc<str>,
}

pub fn app() -> Router {
    app_with(&Settings::default())
}

pub fn app_with(settings: &Settings) -> Router {
    let state = AppState {
        posts: Arc::new(RwLock::new(HashMap::new())),
        next_pid: Arc::new(AtomicU64::new(1)),
        relative_path: settings.relative_path.as_str().into(),
        csrf_token: settings.csrf_token.as_str().into(),
    };
    let api = Router::new()
        .route("/ping", get(ping))
        .route("/echo", any(echo))
        .route("/plain", get(plain))
        .route("/plain-error", get(plain_error))
        .route("/expired", any(expired))
        .route("/posts", post(create_post))
        .route("/posts/{pid}", get(get_post).put(update_post).delete(delete_post))
        .route("/upload", post(upload));
    let router = Router::new()
        .nest("/api/v3", api)
        .route("/api/config", get(config))
        .with_state(state);

    // axum does not nest at the root.
    if settings.relative_path.is_empty() {
        router
    } else {
        Router::new().nest(&settings.relative_path, router)
    }
}

pub async fn run(listener: TcpListener, settings: Settings) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(&settings)).await
}

fn status_code(status: StatusCode) -> &'static str {
    match status {
        s if s.is_success() => "ok",
        StatusCode::UNAUTHORIZED => "not-authorised",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not-found",
        s if s.is_client_error() => "bad-request",
        _ => "internal-server-error",
    }
}

/// Wrap `response` in the API's `{status, response}` envelope.
fn envelope(status: StatusCode, message: &str, response: Value) -> Response {
    let body = json!({
        "status": { "code": status_code(status), "message": message },
        "response": response,
    });
    (status, Json(body)).into_response()
}

fn check_csrf(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("x-csrf-token").and_then(|v| v.to_str().ok()) {
        Some(token) if token == &*state.csrf_token => Ok(()),
        _ => Err(envelope(StatusCode::FORBIDDEN, INVALID_CSRF, json!({}))),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn ping() -> Response {
    envelope(StatusCode::OK, "OK", json!({ "pong": true }))
}

/// Report back what arrived, so clients can assert on the wire format.
async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: String) -> Response {
    let received = json!({
        "method": method.as_str(),
        "query": query,
        "csrf": header_str(&headers, "x-csrf-token"),
        "content_type": header_str(&headers, "content-type"),
        "plugin": header_str(&headers, "x-plugin"),
        "body": body,
    });
    envelope(StatusCode::OK, "OK", received)
}

async fn plain() -> &'static str {
    "test-response"
}

async fn plain_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
}

async fn expired() -> Response {
    envelope(StatusCode::UNAUTHORIZED, SESSION_EXPIRED, json!({}))
}

// Served outside the versioned prefix and without the envelope.
async fn config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "relative_path": &*state.relative_path,
        "csrf_token": &*state.csrf_token,
    }))
}

async fn create_post(State(state): State<AppState>, headers: HeaderMap, Json(input): Json<CreatePost>) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    let post = Post {
        pid: state.next_pid.fetch_add(1, Ordering::SeqCst),
        title: input.title,
        content: input.content,
    };
    state.posts.write().await.insert(post.pid, post.clone());
    tracing::info!(pid = post.pid, "post created");
    envelope(StatusCode::OK, "OK", json!(post))
}

async fn get_post(State(state): State<AppState>, Path(pid): Path<u64>) -> Response {
    match state.posts.read().await.get(&pid) {
        Some(post) => envelope(StatusCode::OK, "OK", json!(post)),
        None => envelope(StatusCode::NOT_FOUND, NO_POST, json!({})),
    }
}

async fn update_post(
    State(state): State<AppState>,
    Path(pid): Path<u64>,
    headers: HeaderMap,
    Json(input): Json<UpdatePost>,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    let mut posts = state.posts.write().await;
    let Some(post) = posts.get_mut(&pid) else {
        return envelope(StatusCode::NOT_FOUND, NO_POST, json!({}));
    };
    if let Some(title) = input.title {
        post.title = Some(title);
    }
    if let Some(content) = input.content {
        post.content = content;
    }
    envelope(StatusCode::OK, "OK", json!(post))
}

async fn delete_post(State(state): State<AppState>, Path(pid): Path<u64>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    match state.posts.write().await.remove(&pid) {
        Some(_) => {
            tracing::info!(pid, "post deleted");
            envelope(StatusCode::OK, "OK", json!({}))
        }
        None => envelope(StatusCode::NOT_FOUND, NO_POST, json!({})),
    }
}

async fn upload(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }
    let mut fields = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return envelope(StatusCode::BAD_REQUEST, &e.to_string(), json!({})),
        };
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        match field.bytes().await {
            Ok(bytes) => fields.push(json!({ "name": name, "filename": filename, "size": bytes.len() })),
            Err(e) => return envelope(StatusCode::BAD_REQUEST, &e.to_string(), json!({})),
        }
    }
    envelope(StatusCode::OK, "OK", json!({ "fields": fields }))
}
