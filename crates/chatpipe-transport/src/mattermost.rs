//! Mattermost v4 REST client.
//!
//! Posts carry protocol markers, thread replies carry payload text, and
//! large payloads go through `/files`. The channel is resolved (or created)
//! once in [`MattermostClient::connect`]; every later call is scoped to it.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::multipart;
use serde::{Deserialize, Serialize};

use chatpipe_core::config::MattermostConfig;

use crate::ratelimit::UploadLimiter;
use crate::{ChatTransport, FileRef, PostId, PostSummary, Reply, ReplyBody, Result, TransportError};

/// Page size for channel post listings (service maximum).
const PER_PAGE: usize = 200;

/// Filename attached to uploads. The service requires one; its value is unused.
const UPLOAD_FILENAME: &str = "data.txt";

#[derive(Debug, Clone)]
pub struct MattermostSettings {
    /// Server URL with scheme, no trailing slash.
    pub server_url: String,
    pub team_name: String,
    pub access_token: String,
    pub channel_name: String,
    pub user_agent: String,
    pub upload_burst: u32,
    pub uploads_per_minute: u32,
}

impl From<&MattermostConfig> for MattermostSettings {
    fn from(c: &MattermostConfig) -> Self {
        Self {
            server_url: c.server_url.trim_end_matches('/').to_string(),
            team_name: c.team_name.clone(),
            access_token: c.access_token.clone(),
            channel_name: c.channel_name.clone(),
            user_agent: c.user_agent.clone(),
            upload_burst: c.upload_burst,
            uploads_per_minute: c.uploads_per_minute,
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Entity {
    id: String,
}

#[derive(Deserialize)]
struct WirePost {
    id: String,
    #[serde(default)]
    root_id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    create_at: i64,
    #[serde(default)]
    file_ids: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct PostList {
    #[serde(default)]
    order: Vec<String>,
    #[serde(default)]
    posts: HashMap<String, WirePost>,
}

impl PostList {
    /// Posts in `order` sequence (newest first), skipping dangling ids.
    fn into_ordered(mut self) -> Vec<WirePost> {
        self.order
            .iter()
            .filter_map(|id| self.posts.remove(id))
            .collect()
    }
}

#[derive(Serialize)]
struct NewPost<'a> {
    channel_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    root_id: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    file_ids: Vec<&'a str>,
}

#[derive(Serialize)]
struct PostPatch<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct NewChannel<'a> {
    team_id: &'a str,
    name: &'a str,
    display_name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct FileUploadResponse {
    file_infos: Vec<Entity>,
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct MattermostClient {
    http: reqwest::Client,
    api: String,
    channel_id: String,
    uploads: UploadLimiter,
}

impl MattermostClient {
    /// Authenticate, resolve the team, and resolve or create the channel.
    pub async fn connect(settings: MattermostSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.access_token))
            .map_err(|_| invalid_header("access token"))?;
        headers.insert(AUTHORIZATION, bearer);
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|_| invalid_header("user agent"))?;
        headers.insert(USER_AGENT, agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let api = format!("{}/api/v4", settings.server_url.trim_end_matches('/'));

        let me: Entity = json(http.get(format!("{api}/users/me")).send().await?).await?;
        tracing::debug!(user_id = %me.id, "authenticated");

        let team: Entity = json(
            http.get(format!("{api}/teams/name/{}", settings.team_name))
                .send()
                .await?,
        )
        .await?;

        let lookup = http
            .get(format!(
                "{api}/teams/{}/channels/name/{}",
                team.id, settings.channel_name
            ))
            .send()
            .await?;
        let channel: Entity = match json(lookup).await {
            Ok(channel) => channel,
            Err(TransportError::NotFound(_)) => {
                tracing::info!(channel = %settings.channel_name, "channel missing, creating");
                let body = NewChannel {
                    team_id: &team.id,
                    name: &settings.channel_name,
                    display_name: &settings.channel_name,
                    kind: "O",
                };
                json(http.post(format!("{api}/channels")).json(&body).send().await?).await?
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            team = %settings.team_name,
            channel = %settings.channel_name,
            channel_id = %channel.id,
            "mattermost channel ready"
        );

        Ok(Self {
            http,
            api,
            channel_id: channel.id,
            uploads: UploadLimiter::new(settings.upload_burst, settings.uploads_per_minute),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn write_post(
        &self,
        root_id: &str,
        message: &str,
        file_ids: Vec<&str>,
    ) -> Result<PostId> {
        let body = NewPost {
            channel_id: &self.channel_id,
            message,
            root_id,
            file_ids,
        };
        let created: Entity = json(
            self.http
                .post(format!("{}/posts", self.api))
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(PostId(created.id))
    }

    async fn remove_post(&self, id: &PostId) -> Result<()> {
        check(
            self.http
                .delete(format!("{}/posts/{}", self.api, id))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}

fn invalid_header(what: &str) -> TransportError {
    TransportError::InvalidSettings(format!("{what} is not a valid header"))
}

/// Map non-success statuses onto transport errors.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        404 => Err(TransportError::NotFound(url)),
        429 => Err(TransportError::RateLimited),
        code => Err(TransportError::Status { status: code, body }),
    }
}

async fn json<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let resp = check(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))
}

#[async_trait]
impl ChatTransport for MattermostClient {
    async fn create_post(&self, body: &str) -> Result<PostId> {
        self.write_post("", body, Vec::new()).await
    }

    async fn update_post(&self, id: &PostId, body: &str) -> Result<()> {
        check(
            self.http
                .put(format!("{}/posts/{}/patch", self.api, id))
                .json(&PostPatch { message: body })
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        self.remove_post(id).await
    }

    async fn create_reply(&self, post: &PostId, body: &ReplyBody) -> Result<PostId> {
        match body {
            ReplyBody::Inline(text) => self.write_post(&post.0, text, Vec::new()).await,
            ReplyBody::FileBacked(file) => self.write_post(&post.0, "", vec![&file.0]).await,
        }
    }

    async fn list_replies(&self, post: &PostId) -> Result<Vec<Reply>> {
        let thread: PostList = json(
            self.http
                .get(format!("{}/posts/{}/thread", self.api, post))
                .send()
                .await?,
        )
        .await?;

        let mut replies: Vec<WirePost> = thread
            .into_ordered()
            .into_iter()
            .filter(|p| p.root_id == post.0)
            .collect();
        // `order` is newest first; reverse, then a stable sort keeps ties in place.
        replies.reverse();
        replies.sort_by_key(|p| p.create_at);

        Ok(replies
            .into_iter()
            .map(|p| {
                let file = p.file_ids.and_then(|ids| ids.into_iter().next());
                let body = match file {
                    Some(id) => ReplyBody::FileBacked(FileRef(id)),
                    None => ReplyBody::Inline(p.message),
                };
                Reply {
                    id: PostId(p.id),
                    body,
                }
            })
            .collect())
    }

    /// Pages are fetched newest first, so a post created mid-listing pushes
    /// the previous page's last entry onto the next page. Repeats are dropped.
    async fn list_posts(&self, body: &str) -> Result<Vec<PostSummary>> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 0usize;
        loop {
            let list: PostList = json(
                self.http
                    .get(format!(
                        "{}/channels/{}/posts?page={page}&per_page={PER_PAGE}",
                        self.api, self.channel_id
                    ))
                    .send()
                    .await?,
            )
            .await?;
            let page_len = list.order.len();
            found.extend(
                list.into_ordered()
                    .into_iter()
                    .filter(|p| p.root_id.is_empty() && p.message == body)
                    .filter(|p| seen.insert(p.id.clone()))
                    .map(|p| PostSummary {
                        id: PostId(p.id),
                        created_at: p.create_at,
                    }),
            );
            if page_len < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(found)
    }

    async fn upload_file(&self, content: Vec<u8>) -> Result<FileRef> {
        self.uploads.acquire().await;
        let size = content.len();
        let form = multipart::Form::new()
            .text("channel_id", self.channel_id.clone())
            .part(
                "files",
                multipart::Part::bytes(content).file_name(UPLOAD_FILENAME),
            );
        let uploaded: FileUploadResponse = json(
            self.http
                .post(format!("{}/files", self.api))
                .multipart(form)
                .send()
                .await?,
        )
        .await?;
        let file = uploaded
            .file_infos
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Malformed("upload returned no file_infos".into()))?;
        tracing::debug!(file_id = %file.id, bytes = size, "file uploaded");
        Ok(FileRef(file.id))
    }

    async fn fetch_file(&self, file: &FileRef) -> Result<Vec<u8>> {
        let resp = check(
            self.http
                .get(format!("{}/files/{}", self.api, file))
                .send()
                .await?,
        )
        .await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn delete_reply(&self, id: &PostId) -> Result<()> {
        self.remove_post(id).await
    }
}
