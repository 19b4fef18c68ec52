//! In-process mock of the Mattermost v4 endpoints chatpipe uses.
//!
//! Ordering matches the real service: listings come back newest first in
//! `order`, `create_at` is strictly increasing, deleting a root removes its
//! thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";
pub const TEAM: &str = "relay-team";
const TEAM_ID: &str = "team0000000000000000000001";
const USER_ID: &str = "user0000000000000000000001";

#[derive(Clone, Debug)]
pub struct MockPost {
    pub id: String,
    pub channel_id: String,
    pub root_id: String,
    pub message: String,
    pub create_at: i64,
    pub file_ids: Vec<String>,
}

impl MockPost {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "channel_id": self.channel_id,
            "root_id": self.root_id,
            "message": self.message,
            "create_at": self.create_at,
            "file_ids": self.file_ids,
        })
    }
}

#[derive(Default)]
pub struct Board {
    seq: i64,
    pub channels: HashMap<String, String>,
    pub posts: HashMap<String, MockPost>,
    pub files: HashMap<String, Vec<u8>>,
    pub uploads: usize,
    /// Fail the next N post creations with 500.
    pub fail_posts: usize,
    /// Fail the next N reply creations with 500.
    pub fail_replies: usize,
    /// Root post to create right after the next first-page listing is served,
    /// shifting every later page by one.
    pub post_between_pages: Option<String>,
    /// Ids passed to `DELETE /posts/{id}`, in call order.
    pub deletions: Vec<String>,
}

impl Board {
    fn next_id(&mut self, prefix: &str) -> (String, i64) {
        self.seq += 1;
        (format!("{prefix}{:022}", self.seq), 1_700_000_000_000 + self.seq)
    }

    pub fn root_messages(&self) -> Vec<String> {
        let mut roots: Vec<&MockPost> = self
            .posts
            .values()
            .filter(|p| p.root_id.is_empty())
            .collect();
        roots.sort_by_key(|p| p.create_at);
        roots.into_iter().map(|p| p.message.clone()).collect()
    }

    /// Newest-first listing response.
    fn list(posts: Vec<&MockPost>) -> Value {
        let mut posts = posts;
        posts.sort_by(|a, b| b.create_at.cmp(&a.create_at));
        let order: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        let map: serde_json::Map<String, Value> =
            posts.iter().map(|p| (p.id.clone(), p.to_json())).collect();
        json!({ "order": order, "posts": map })
    }
}

pub type Shared = Arc<Mutex<Board>>;

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

fn authorize(headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "invalid token".into())),
    }
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn users_me(headers: HeaderMap) -> ApiResult {
    authorize(&headers)?;
    Ok(Json(json!({ "id": USER_ID })))
}

async fn team_by_name(headers: HeaderMap, Path(name): Path<String>) -> ApiResult {
    authorize(&headers)?;
    if name == TEAM {
        Ok(Json(json!({ "id": TEAM_ID, "name": name })))
    } else {
        Err(not_found("team"))
    }
}

async fn channel_by_name(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path((team_id, name)): Path<(String, String)>,
) -> ApiResult {
    authorize(&headers)?;
    if team_id != TEAM_ID {
        return Err(not_found("team"));
    }
    let board = board.lock().unwrap();
    match board.channels.get(&name) {
        Some(id) => Ok(Json(json!({ "id": id, "name": name }))),
        None => Err(not_found("channel")),
    }
}

#[derive(Deserialize)]
struct NewChannel {
    team_id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn create_channel(
    State(board): State<Shared>,
    headers: HeaderMap,
    Json(req): Json<NewChannel>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    authorize(&headers)?;
    if req.team_id != TEAM_ID || req.kind != "O" {
        return Err((StatusCode::BAD_REQUEST, "bad channel request".into()));
    }
    let mut board = board.lock().unwrap();
    if board.channels.contains_key(&req.name) {
        return Err((StatusCode::BAD_REQUEST, "channel exists".into()));
    }
    let (id, _) = board.next_id("chan");
    board.channels.insert(req.name.clone(), id.clone());
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "name": req.name }))))
}

#[derive(Deserialize)]
struct NewPost {
    channel_id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    root_id: String,
    #[serde(default)]
    file_ids: Vec<String>,
}

async fn create_post(
    State(board): State<Shared>,
    headers: HeaderMap,
    Json(req): Json<NewPost>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    authorize(&headers)?;
    let mut board = board.lock().unwrap();
    if board.fail_posts > 0 {
        board.fail_posts -= 1;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "injected failure".into()));
    }
    if !req.root_id.is_empty() && board.fail_replies > 0 {
        board.fail_replies -= 1;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "injected reply failure".into()));
    }
    if req.message.len() > 16_383 {
        return Err((StatusCode::BAD_REQUEST, "message too long".into()));
    }
    if req.message.is_empty() && req.file_ids.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "empty post".into()));
    }
    if !req.root_id.is_empty() && !board.posts.contains_key(&req.root_id) {
        return Err((StatusCode::BAD_REQUEST, "invalid root_id".into()));
    }
    if req.file_ids.iter().any(|f| !board.files.contains_key(f)) {
        return Err((StatusCode::BAD_REQUEST, "unknown file id".into()));
    }
    let (id, create_at) = board.next_id("post");
    let post = MockPost {
        id: id.clone(),
        channel_id: req.channel_id,
        root_id: req.root_id,
        message: req.message,
        create_at,
        file_ids: req.file_ids,
    };
    let body = post.to_json();
    board.posts.insert(id, post);
    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Deserialize)]
struct Patch {
    message: String,
}

async fn patch_post(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<Patch>,
) -> ApiResult {
    authorize(&headers)?;
    let mut board = board.lock().unwrap();
    let post = board.posts.get_mut(&id).ok_or_else(|| not_found("post"))?;
    post.message = req.message;
    Ok(Json(post.to_json()))
}

async fn delete_post(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let mut board = board.lock().unwrap();
    board.posts.remove(&id).ok_or_else(|| not_found("post"))?;
    board.posts.retain(|_, p| p.root_id != id);
    board.deletions.push(id);
    Ok(Json(json!({ "status": "OK" })))
}

async fn thread(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    authorize(&headers)?;
    let board = board.lock().unwrap();
    if !board.posts.contains_key(&id) {
        return Err(not_found("post"));
    }
    let posts = board
        .posts
        .values()
        .filter(|p| p.id == id || p.root_id == id)
        .collect();
    Ok(Json(Board::list(posts)))
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

fn default_per_page() -> usize {
    60
}

async fn channel_posts(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult {
    authorize(&headers)?;
    let mut board = board.lock().unwrap();
    let mut posts: Vec<&MockPost> = board
        .posts
        .values()
        .filter(|p| p.channel_id == channel_id)
        .collect();
    posts.sort_by(|a, b| b.create_at.cmp(&a.create_at));
    let window = posts
        .into_iter()
        .skip(page.page * page.per_page)
        .take(page.per_page)
        .collect();
    let body = Board::list(window);

    if page.page == 0 {
        if let Some(message) = board.post_between_pages.take() {
            let (id, create_at) = board.next_id("post");
            let post = MockPost {
                id: id.clone(),
                channel_id,
                root_id: String::new(),
                message,
                create_at,
                file_ids: Vec::new(),
            };
            board.posts.insert(id, post);
        }
    }
    Ok(Json(body))
}

async fn upload(
    State(board): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    authorize(&headers)?;
    let mut channel_id = None;
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "channel_id" => {
                channel_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
                )
            }
            "files" => {
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
                )
            }
            _ => {}
        }
    }
    let (Some(_channel_id), Some(data)) = (channel_id, data) else {
        return Err((StatusCode::BAD_REQUEST, "channel_id and files required".into()));
    };
    let mut board = board.lock().unwrap();
    let (id, _) = board.next_id("file");
    board.files.insert(id.clone(), data.to_vec());
    board.uploads += 1;
    Ok((StatusCode::CREATED, Json(json!({ "file_infos": [{ "id": id }] }))))
}

async fn download(
    State(board): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Vec<u8>, (StatusCode, String)> {
    authorize(&headers)?;
    let board = board.lock().unwrap();
    board.files.get(&id).cloned().ok_or_else(|| not_found("file"))
}

// ── Server ────────────────────────────────────────────────────────────────────

pub struct MockServer {
    pub url: String,
    pub board: Shared,
}

pub async fn start() -> anyhow::Result<MockServer> {
    let board: Shared = Arc::new(Mutex::new(Board::default()));

    let api = Router::new()
        .route("/users/me", get(users_me))
        .route("/teams/name/{name}", get(team_by_name))
        .route("/teams/{team_id}/channels/name/{name}", get(channel_by_name))
        .route("/channels", post(create_channel))
        .route("/channels/{channel_id}/posts", get(channel_posts))
        .route("/posts", post(create_post))
        .route("/posts/{id}", axum::routing::delete(delete_post))
        .route("/posts/{id}/patch", put(patch_post))
        .route("/posts/{id}/thread", get(thread))
        .route(
            "/files",
            post(upload).layer(DefaultBodyLimit::max(16 * 1024 * 1024)),
        )
        .route("/files/{id}", get(download))
        .with_state(board.clone());

    let app = Router::new().nest("/api/v4", api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(MockServer { url, board })
}
