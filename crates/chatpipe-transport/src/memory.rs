//! In-process chat board.
//!
//! Same ordering and cascade semantics as the Mattermost client, no network.
//! Clones share one board, so two channels built on clones of the same
//! `MemoryBoard` talk to each other.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    ChatTransport, FileRef, PostId, PostSummary, Reply, ReplyBody, Result, TransportError,
};

/// Transport operation, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreatePost,
    UpdatePost,
    DeletePost,
    CreateReply,
    ListReplies,
    ListPosts,
    UploadFile,
    FetchFile,
    DeleteReply,
}

#[derive(Debug, Clone)]
struct StoredPost {
    root_id: Option<PostId>,
    message: String,
    file: Option<FileRef>,
    seq: u64,
}

#[derive(Default)]
struct Board {
    posts: DashMap<PostId, StoredPost>,
    files: DashMap<FileRef, Vec<u8>>,
    faults: DashMap<Op, usize>,
    seq: AtomicU64,
    uploads: AtomicUsize,
    deletions: Mutex<Vec<PostId>>,
}

#[derive(Clone, Default)]
pub struct MemoryBoard {
    board: Arc<Board>,
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `op` fail with `Unavailable`.
    pub fn fail_next(&self, op: Op, count: usize) {
        *self.board.faults.entry(op).or_default() += count;
    }

    /// Number of root posts on the board.
    pub fn post_count(&self) -> usize {
        self.board
            .posts
            .iter()
            .filter(|p| p.root_id.is_none())
            .count()
    }

    /// Number of replies on the board.
    pub fn reply_count(&self) -> usize {
        self.board
            .posts
            .iter()
            .filter(|p| p.root_id.is_some())
            .count()
    }

    /// Number of successful file uploads so far.
    pub fn upload_count(&self) -> usize {
        self.board.uploads.load(Ordering::SeqCst)
    }

    /// Root post bodies, oldest first.
    pub fn root_bodies(&self) -> Vec<String> {
        let mut roots: Vec<(u64, String)> = self
            .board
            .posts
            .iter()
            .filter(|p| p.root_id.is_none())
            .map(|p| (p.seq, p.message.clone()))
            .collect();
        roots.sort_by_key(|(seq, _)| *seq);
        roots.into_iter().map(|(_, body)| body).collect()
    }

    /// Ids removed by `delete_reply` and `delete_post`, in call order.
    /// Replies swept up by a root's cascade are not listed.
    pub fn deletions(&self) -> Vec<PostId> {
        self.deletion_log().to_vec()
    }

    fn deletion_log(&self) -> std::sync::MutexGuard<'_, Vec<PostId>> {
        self.board
            .deletions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_seq(&self) -> u64 {
        self.board.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_fault(&self, op: Op) -> Result<()> {
        if let Some(mut remaining) = self.board.faults.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Unavailable(format!("injected {op:?} failure")));
            }
        }
        Ok(())
    }

    fn insert(&self, root_id: Option<PostId>, message: String, file: Option<FileRef>) -> PostId {
        let seq = self.next_seq();
        let id = PostId(format!("p{seq:025}"));
        self.board.posts.insert(
            id.clone(),
            StoredPost {
                root_id,
                message,
                file,
                seq,
            },
        );
        id
    }
}

#[async_trait]
impl ChatTransport for MemoryBoard {
    async fn create_post(&self, body: &str) -> Result<PostId> {
        self.check_fault(Op::CreatePost)?;
        Ok(self.insert(None, body.to_string(), None))
    }

    async fn update_post(&self, id: &PostId, body: &str) -> Result<()> {
        self.check_fault(Op::UpdatePost)?;
        let mut post = self
            .board
            .posts
            .get_mut(id)
            .ok_or_else(|| TransportError::NotFound(format!("post {id}")))?;
        post.message = body.to_string();
        Ok(())
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        self.check_fault(Op::DeletePost)?;
        self.board
            .posts
            .remove(id)
            .ok_or_else(|| TransportError::NotFound(format!("post {id}")))?;
        // Deleting a root takes its thread with it.
        self.board
            .posts
            .retain(|_, p| p.root_id.as_ref() != Some(id));
        self.deletion_log().push(id.clone());
        Ok(())
    }

    async fn create_reply(&self, post: &PostId, body: &ReplyBody) -> Result<PostId> {
        self.check_fault(Op::CreateReply)?;
        match self.board.posts.get(post) {
            Some(root) if root.root_id.is_none() => {}
            _ => return Err(TransportError::NotFound(format!("root post {post}"))),
        }
        let (message, file) = match body {
            ReplyBody::Inline(text) => (text.clone(), None),
            ReplyBody::FileBacked(file) => {
                if !self.board.files.contains_key(file) {
                    return Err(TransportError::NotFound(format!("file {file}")));
                }
                (String::new(), Some(file.clone()))
            }
        };
        Ok(self.insert(Some(post.clone()), message, file))
    }

    async fn list_replies(&self, post: &PostId) -> Result<Vec<Reply>> {
        self.check_fault(Op::ListReplies)?;
        if !self.board.posts.contains_key(post) {
            return Err(TransportError::NotFound(format!("post {post}")));
        }
        let mut replies: Vec<(u64, Reply)> = self
            .board
            .posts
            .iter()
            .filter(|p| p.root_id.as_ref() == Some(post))
            .map(|p| {
                let body = match &p.file {
                    Some(file) => ReplyBody::FileBacked(file.clone()),
                    None => ReplyBody::Inline(p.message.clone()),
                };
                (
                    p.seq,
                    Reply {
                        id: p.key().clone(),
                        body,
                    },
                )
            })
            .collect();
        replies.sort_by_key(|(seq, _)| *seq);
        Ok(replies.into_iter().map(|(_, r)| r).collect())
    }

    async fn list_posts(&self, body: &str) -> Result<Vec<PostSummary>> {
        self.check_fault(Op::ListPosts)?;
        let mut posts: Vec<PostSummary> = self
            .board
            .posts
            .iter()
            .filter(|p| p.root_id.is_none() && p.message == body)
            .map(|p| PostSummary {
                id: p.key().clone(),
                created_at: p.seq as i64,
            })
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn upload_file(&self, content: Vec<u8>) -> Result<FileRef> {
        self.check_fault(Op::UploadFile)?;
        let file = FileRef(format!("f{:025}", self.next_seq()));
        self.board.files.insert(file.clone(), content);
        self.board.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(file)
    }

    async fn fetch_file(&self, file: &FileRef) -> Result<Vec<u8>> {
        self.check_fault(Op::FetchFile)?;
        self.board
            .files
            .get(file)
            .map(|f| f.clone())
            .ok_or_else(|| TransportError::NotFound(format!("file {file}")))
    }

    async fn delete_reply(&self, id: &PostId) -> Result<()> {
        self.check_fault(Op::DeleteReply)?;
        match self.board.posts.remove_if(id, |_, p| p.root_id.is_some()) {
            Some(_) => {
                self.deletion_log().push(id.clone());
                Ok(())
            }
            None => Err(TransportError::NotFound(format!("reply {id}"))),
        }
    }
}
