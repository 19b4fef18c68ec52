//! chatpipe-transport: the chat-service primitives the channel is built on.
//!
//! [`ChatTransport`] is the narrow interface to the remote board: root posts,
//! threaded replies, file attachments. [`MattermostClient`] speaks the
//! Mattermost v4 REST API; [`MemoryBoard`] is an in-process board with the
//! same ordering semantics.

pub mod error;
pub mod mattermost;
pub mod memory;
pub mod ratelimit;

use async_trait::async_trait;
use std::fmt;

pub use error::{Result, TransportError};
pub use mattermost::{MattermostClient, MattermostSettings};
pub use memory::{MemoryBoard, Op};
pub use ratelimit::UploadLimiter;

/// Identifier of a post or reply, assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub String);

/// Handle to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a reply carries: inline text, or a reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Inline(String),
    FileBacked(FileRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: PostId,
    pub body: ReplyBody,
}

/// A root post returned by [`ChatTransport::list_posts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub id: PostId,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Primitive operations over the remote board.
///
/// Every call is one network round trip. Implementations must give
/// read-your-writes consistency for the caller's own posts.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Create a root post.
    async fn create_post(&self, body: &str) -> Result<PostId>;

    /// Overwrite a root post's body.
    async fn update_post(&self, id: &PostId, body: &str) -> Result<()>;

    /// Delete a root post.
    async fn delete_post(&self, id: &PostId) -> Result<()>;

    /// Append a reply to `post`'s thread.
    async fn create_reply(&self, post: &PostId, body: &ReplyBody) -> Result<PostId>;

    /// Replies under `post`, oldest first.
    async fn list_replies(&self, post: &PostId) -> Result<Vec<Reply>>;

    /// Root posts whose body equals `body` exactly, newest first.
    async fn list_posts(&self, body: &str) -> Result<Vec<PostSummary>>;

    /// Upload encoded content as a file. Rate-limited by the service.
    async fn upload_file(&self, content: Vec<u8>) -> Result<FileRef>;

    /// Download a previously uploaded file.
    async fn fetch_file(&self, file: &FileRef) -> Result<Vec<u8>>;

    /// Delete a reply.
    async fn delete_reply(&self, id: &PostId) -> Result<()>;
}
