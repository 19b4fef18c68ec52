//! chatpipe-channel: a point-to-point byte pipe over a threaded chat board.
//!
//! Each transfer is one root post plus its thread:
//!
//!   create post `{out}:writing` → attach reply → patch post to `{out}:Done`
//!
//! The peer only queries for `{its_in}:Done`, so a half-written transfer is
//! never read. Consumed posts are deleted before the next poll, and all
//! protocol state lives on the board: a restarted peer picks up where it
//! left off.

pub mod channel;
pub mod error;
pub mod state;

pub use channel::{Channel, ChannelSettings, TransferMode};
pub use error::ChannelError;
pub use state::{InvalidTransition, PostState};
