//! chatpipe-core: payload codec, marker protocol, and configuration.
//! All other chatpipe crates depend on this one.

pub mod codec;
pub mod config;
pub mod marker;

pub use codec::DecodeError;
pub use marker::{Direction, Marker, MarkerError, Status};
