//! Outbound and inbound pipelines.
//!
//! `send` writes one transfer per call: a single inline reply holding at most
//! `max_chunk_bytes` of the payload, or, at or above the large-payload
//! threshold, one uploaded file holding all of it. Unsent bytes are the
//! caller's to re-offer.
//!
//! `receive` drains every completed transfer addressed to us, oldest first,
//! deleting each one before moving on to the next.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use chatpipe_core::codec::{self, DecodeError};
use chatpipe_core::config::{
    ChatpipeConfig, ConfigError, DEFAULT_LARGE_PAYLOAD_THRESHOLD, DEFAULT_MESSAGE_BODY_LIMIT,
};
use chatpipe_core::marker::{Direction, Status};
use chatpipe_transport::{ChatTransport, PostSummary, Reply, ReplyBody};

use crate::error::ChannelError;
use crate::state::PostState;

/// How a payload travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Encoded text in a single reply.
    Inline,
    /// Encoded text in an uploaded file, referenced by a single reply.
    File,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Direction we read (the peer's outbound).
    pub inbound: Direction,
    /// Direction we write.
    pub outbound: Direction,
    /// Service limit on characters per message body.
    pub message_body_limit: usize,
    /// Payloads of at least this many bytes are sent as a file.
    pub large_payload_threshold: usize,
}

impl ChannelSettings {
    /// Settings with the Mattermost default limits.
    pub fn new(inbound: Direction, outbound: Direction) -> Self {
        Self {
            inbound,
            outbound,
            message_body_limit: DEFAULT_MESSAGE_BODY_LIMIT,
            large_payload_threshold: DEFAULT_LARGE_PAYLOAD_THRESHOLD,
        }
    }

    pub fn from_config(config: &ChatpipeConfig) -> Result<Self, ConfigError> {
        let (inbound, outbound) = config.directions()?;
        Ok(Self {
            inbound,
            outbound,
            message_body_limit: config.channel.message_body_limit,
            large_payload_threshold: config.channel.large_payload_threshold,
        })
    }

    /// Largest raw slice whose encoding fits in one message body.
    pub fn max_chunk_bytes(&self) -> usize {
        codec::max_chunk_bytes(self.message_body_limit)
    }

    pub fn mode_for(&self, payload_len: usize) -> TransferMode {
        if payload_len >= self.large_payload_threshold {
            TransferMode::File
        } else {
            TransferMode::Inline
        }
    }
}

/// One end of a chatpipe channel.
pub struct Channel {
    transport: Arc<dyn ChatTransport>,
    settings: ChannelSettings,
    max_chunk: usize,
    /// `{outbound}:writing`
    writing_marker: String,
    /// `{outbound}:Done`
    done_marker: String,
    /// `{inbound}:Done`, the only body discovery matches.
    inbound_marker: String,
}

impl Channel {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        settings: ChannelSettings,
    ) -> Result<Self, ChannelError> {
        let max_chunk = settings.max_chunk_bytes();
        if max_chunk == 0 {
            return Err(ChannelError::SizeViolation(format!(
                "message body limit {} cannot hold one encoded byte",
                settings.message_body_limit
            )));
        }
        if settings.large_payload_threshold == 0 {
            return Err(ChannelError::SizeViolation(
                "large payload threshold must be non-zero".into(),
            ));
        }
        if settings.inbound == settings.outbound {
            return Err(ChannelError::Misconfigured(format!(
                "inbound and outbound directions are both {:?}",
                settings.inbound.as_str()
            )));
        }

        Ok(Self {
            writing_marker: settings.outbound.marker(Status::Writing).to_string(),
            done_marker: settings.outbound.marker(Status::Done).to_string(),
            inbound_marker: settings.inbound.marker(Status::Done).to_string(),
            transport,
            settings,
            max_chunk,
        })
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.settings
    }

    /// Largest payload slice a single inline `send` consumes.
    pub fn max_chunk_bytes(&self) -> usize {
        self.max_chunk
    }

    /// Write one transfer. Returns how many leading bytes of `payload` it
    /// carried; the caller re-offers the rest.
    ///
    /// Any transport failure voids the call. A post left at `:writing` is
    /// never discovered by the peer, so a retry simply starts a new one.
    pub async fn send(&self, payload: &[u8]) -> Result<usize, ChannelError> {
        if payload.is_empty() {
            return Ok(0);
        }

        // Encode before touching the board.
        let mode = self.settings.mode_for(payload.len());
        let (encoded, sent) = match mode {
            TransferMode::File => (codec::encode(payload), payload.len()),
            TransferMode::Inline => {
                let n = payload.len().min(self.max_chunk);
                (codec::encode(&payload[..n]), n)
            }
        };

        let post = self.transport.create_post(&self.writing_marker).await?;
        let state = PostState::Writing;

        let reply = match mode {
            TransferMode::Inline => ReplyBody::Inline(encoded),
            TransferMode::File => {
                let file = self.transport.upload_file(encoded.into_bytes()).await?;
                ReplyBody::FileBacked(file)
            }
        };
        self.transport.create_reply(&post, &reply).await?;
        let state = state.advance(PostState::Populated)?;

        self.transport.update_post(&post, &self.done_marker).await?;
        state.advance(PostState::Done)?;

        tracing::debug!(
            post = %post,
            mode = ?mode,
            sent,
            offered = payload.len(),
            digest = digest(&payload[..sent]),
            "transfer published"
        );
        Ok(sent)
    }

    /// Drain completed transfers addressed to us, oldest first.
    ///
    /// Malformed transfers are logged and purged without failing the poll.
    /// Transport failures abort it; posts not yet deleted are picked up by
    /// the next poll.
    pub async fn receive(&self) -> Result<Vec<Bytes>, ChannelError> {
        let posts = oldest_first(self.transport.list_posts(&self.inbound_marker).await?);
        let mut received = Vec::with_capacity(posts.len());

        for post in posts {
            let state = PostState::Done;
            let replies = self.transport.list_replies(&post.id).await?;
            let decoded = if replies.is_empty() {
                None
            } else {
                match self.read_transfer(&replies).await? {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        tracing::warn!(
                            post = %post.id,
                            error = %e,
                            "malformed transfer, discarding"
                        );
                        None
                    }
                }
            };
            let state = state.advance(PostState::Consumed)?;

            for reply in &replies {
                self.transport.delete_reply(&reply.id).await?;
            }
            self.transport.delete_post(&post.id).await?;
            state.advance(PostState::Deleted)?;

            match decoded {
                Some(payload) => {
                    tracing::debug!(
                        post = %post.id,
                        replies = replies.len(),
                        bytes = payload.len(),
                        digest = digest(&payload),
                        "transfer received"
                    );
                    received.push(Bytes::from(payload));
                }
                None if replies.is_empty() => {
                    tracing::warn!(post = %post.id, "completed post has no replies, discarding");
                }
                None => {}
            }
        }

        Ok(received)
    }

    /// Concatenate reply text in thread order and decode it.
    async fn read_transfer(
        &self,
        replies: &[Reply],
    ) -> Result<Result<Vec<u8>, DecodeError>, ChannelError> {
        let mut encoded = Vec::new();
        for reply in replies {
            match &reply.body {
                ReplyBody::Inline(text) => encoded.extend_from_slice(text.as_bytes()),
                ReplyBody::FileBacked(file) => {
                    encoded.extend(self.transport.fetch_file(file).await?);
                }
            }
        }
        Ok(codec::decode_bytes(&encoded))
    }
}

/// Listings come back newest first; process the backlog from the oldest.
/// A post listed twice is handled once.
fn oldest_first(mut posts: Vec<PostSummary>) -> Vec<PostSummary> {
    posts.reverse();
    posts.sort_by_key(|p| p.created_at);
    let mut seen = HashSet::new();
    posts.retain(|p| seen.insert(p.id.clone()));
    posts
}

/// Short content digest for logs.
fn digest(data: &[u8]) -> String {
    hex::encode(&blake3::hash(data).as_bytes()[..8])
}
