//! Per-post synchronization state.
//!
//! ```text
//! Writing → Populated → Done → Consumed → Deleted
//! ```
//!
//! `Writing` and `Populated` exist only on the sender's side of the board;
//! the marker still reads `:writing` and the peer's discovery query cannot
//! match it. The post becomes visible exactly at `Done`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostState {
    /// Post created with the `:writing` marker.
    Writing,
    /// Payload or file-reference reply attached.
    Populated,
    /// Marker patched to `:Done`; visible to the peer.
    Done,
    /// Replies read and decoded by the peer.
    Consumed,
    /// Replies and post removed from the board. Terminal.
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid post transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: PostState,
    pub to: PostState,
}

impl PostState {
    /// The only state reachable from `self`, if any.
    pub const fn successor(self) -> Option<PostState> {
        match self {
            PostState::Writing => Some(PostState::Populated),
            PostState::Populated => Some(PostState::Done),
            PostState::Done => Some(PostState::Consumed),
            PostState::Consumed => Some(PostState::Deleted),
            PostState::Deleted => None,
        }
    }

    /// Move to `next`; only single forward steps are allowed.
    pub fn advance(self, next: PostState) -> Result<PostState, InvalidTransition> {
        if self.successor() == Some(next) {
            tracing::trace!(from = ?self, to = ?next, "post state");
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the opposite peer can observe a post in this state.
    pub const fn visible_to_peer(self) -> bool {
        matches!(
            self,
            PostState::Done | PostState::Consumed | PostState::Deleted
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, PostState::Deleted)
    }
}
