//! An in-process mock of the social feed REST backend, served by `axum` on an
//! ephemeral local port, plus helpers for driving the CLI against it.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use clap::Parser;
use client_lib::{cli, config::Config, error::ClientError, state::AppState};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

pub const ADA_TOKEN: &str = "tok-ada";
pub const BOB_TOKEN: &str = "tok-bob";

#[derive(Clone)]
struct MockUser {
    id: &'static str,
    name: &'static str,
    username: &'static str,
    email: &'static str,
    password: &'static str,
    token: &'static str,
}

const USERS: [MockUser; 2] = [
    MockUser {
        id: "u1",
        name: "Ada Lovelace",
        username: "ada",
        email: "ada@example.com",
        password: "secret",
        token: ADA_TOKEN,
    },
    MockUser {
        id: "u2",
        name: "Bob Byte",
        username: "bob",
        email: "bob@example.com",
        password: "hunter2",
        token: BOB_TOKEN,
    },
];

/// One request as the mock saw it.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
}

/// One multipart upload to `POST /posts`.
#[derive(Clone, Debug)]
pub struct Upload {
    pub content: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Default)]
pub struct MockState {
    posts: Mutex<Vec<Value>>,
    bios: Mutex<HashMap<String, String>>,
    registered: Mutex<Vec<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    uploads: Mutex<Vec<Upload>>,
}

impl MockState {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn post_ids(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|p| match &p["id"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<MockUser> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        USERS.iter().find(|u| u.token == token).cloned()
    }

    fn user_json(&self, user: &MockUser) -> Value {
        let bio = self.bios.lock().unwrap().get(user.id).cloned();
        json!({
            "id": user.id,
            "name": user.name,
            "username": user.username,
            "email": user.email,
            "bio": bio,
        })
    }
}

pub struct MockBackend {
    pub api_url: String,
    pub state: Arc<MockState>,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn author(user: &MockUser) -> Value {
    json!({ "id": user.id, "name": user.name, "username": user.username })
}

//=========================================================================================
// Handlers
//=========================================================================================

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let uri: &Uri = request.uri();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: request.method().clone(),
        path: uri.path().to_string(),
        authorization: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });
    next.run(request).await
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<LoginBody>) -> Response {
    match USERS
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
    {
        Some(user) => Json(json!({
            "message": "Login successful",
            "data": { "accessToken": user.token, "user": state.user_json(user) },
        }))
        .into_response(),
        None => message(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    for field in ["name", "username", "email", "password"] {
        if body[field].as_str().unwrap_or_default().is_empty() {
            return message(StatusCode::BAD_REQUEST, &format!("{} is required", field));
        }
    }
    let mut registered = state.registered.lock().unwrap();
    if USERS.iter().any(|u| u.username == username) || registered.contains(&username) {
        return message(StatusCode::CONFLICT, "Username already exists");
    }
    registered.push(username.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "data": { "id": Uuid::new_v4().to_string(), "username": username },
        })),
    )
        .into_response()
}

async fn update_bio(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(user) = state.user_for(&headers) else {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let bio = body["bio"].as_str().unwrap_or_default().to_string();
    state.bios.lock().unwrap().insert(user.id.to_string(), bio.clone());
    Json(json!({ "data": { "bio": bio } })).into_response()
}

async fn list_posts(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if state.user_for(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let posts: Vec<Value> = state
        .posts
        .lock()
        .unwrap()
        .iter()
        .filter(|p| match params.get("userId") {
            Some(id) => p["author"]["id"] == json!(id),
            None => true,
        })
        .cloned()
        .collect();
    Json(json!({ "data": posts })).into_response()
}

async fn user_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Response {
    if state.user_for(&headers).is_none() {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let Some(user) = USERS.iter().find(|u| u.username == username) else {
        return message(StatusCode::NOT_FOUND, "User not found");
    };
    let posts: Vec<Value> = state
        .posts
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p["author"]["id"] == json!(user.id))
        .cloned()
        .collect();
    Json(json!({ "data": { "user": state.user_json(user), "posts": posts } })).into_response()
}

async fn create_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let Some(user) = state.user_for(&headers) else {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let mut upload = Upload {
        content: None,
        file_name: None,
        content_type: None,
        data: Bytes::new(),
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("content") => upload.content = field.text().await.ok(),
            Some("image") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.data = field.bytes().await.unwrap_or_default();
            }
            _ => {}
        }
    }
    if upload.data.is_empty() {
        return message(StatusCode::BAD_REQUEST, "Image is required");
    }

    let post = json!({
        "id": Uuid::new_v4().to_string(),
        "content": upload.content.clone().unwrap_or_default(),
        "imageUrl": format!("/uploads/{}", upload.file_name.clone().unwrap_or_default()),
        "author": author(&user),
        "createdAt": Utc::now().to_rfc3339(),
    });
    state.uploads.lock().unwrap().push(upload);
    state.posts.lock().unwrap().insert(0, post.clone());
    (StatusCode::CREATED, Json(json!({ "data": post }))).into_response()
}

async fn delete_post(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let Some(user) = state.user_for(&headers) else {
        return message(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let mut posts = state.posts.lock().unwrap();
    let Some(index) = posts.iter().position(|p| match &p["id"] {
        Value::String(s) => *s == id,
        other => other.to_string() == id,
    }) else {
        return message(StatusCode::NOT_FOUND, "Post not found");
    };
    if posts[index]["author"]["id"] != json!(user.id) {
        return message(StatusCode::FORBIDDEN, "Not allowed");
    }
    posts.remove(index);
    Json(json!({ "message": "Post deleted" })).into_response()
}

//=========================================================================================
// Server and Client Helpers
//=========================================================================================

/// Starts the mock with two seeded posts: `p-ada` by ada and numeric `7` by bob.
pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    {
        let mut posts = state.posts.lock().unwrap();
        posts.push(json!({
            "id": "p-ada",
            "content": "Hello from Ada",
            "imageUrl": "/uploads/engine.png",
            "author": author(&USERS[0]),
            "createdAt": "2024-01-05T15:04:00Z",
        }));
        posts.push(json!({
            "id": 7,
            "content": "Bob was here",
            "author": author(&USERS[1]),
            "createdAt": "2024-01-04T09:30:00Z",
        }));
    }

    let app = Router::new()
        .route("/api/users/login", post(login))
        .route("/api/users", post(register))
        .route("/api/users/bio", put(update_bio))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/user/{username}", get(user_profile))
        .route("/api/posts/{id}", delete(delete_post))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        api_url: format!("http://{}/api", addr),
        state,
    }
}

pub fn config(api_url: &str, storage_path: &FsPath) -> Arc<Config> {
    Arc::new(Config {
        api_url: api_url.to_string(),
        storage_path: storage_path.to_path_buf(),
        log_level: Level::INFO,
        http_timeout: Duration::from_secs(5),
    })
}

/// Builds a fresh `AppState`, restoring whatever the storage file holds.
pub fn app(api_url: &str, storage_path: &FsPath) -> AppState {
    AppState::from_config(config(api_url, storage_path)).unwrap()
}

/// Runs one CLI invocation and returns what it printed.
pub async fn run(state: &AppState, args: &[&str]) -> Result<String, ClientError> {
    let cli = cli::Cli::try_parse_from(std::iter::once("feed").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    cli::run(cli, state, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

/// Unwraps the user-facing message of an expected failure.
pub fn failure_message(result: Result<String, ClientError>) -> String {
    match result {
        Err(ClientError::Action(failure)) => failure.to_string(),
        other => panic!("expected an action failure, got {:?}", other),
    }
}

/// Writes a PNG of the given size into `dir`.
pub fn write_png(dir: &FsPath, name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}
