//! Marker protocol: the status a root post advertises in its body.
//!
//! A marker is `{direction}:{status}`. Directions are restricted to
//! `[A-Za-z0-9_-]`, so the separator is unambiguous and a marker has exactly
//! one parse. Peers only ever query for `{their_inbound}:Done`; a post still
//! at `:writing` is invisible to discovery.

use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum direction identifier length.
pub const MIN_DIRECTION_LEN: usize = 4;

/// Maximum direction identifier length.
pub const MAX_DIRECTION_LEN: usize = 64;

/// Length of identifiers produced by [`Direction::random`].
pub const RANDOM_DIRECTION_LEN: usize = 8;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    #[error("direction identifier is empty")]
    EmptyDirection,
    #[error("direction identifier shorter than {MIN_DIRECTION_LEN} characters")]
    DirectionTooShort,
    #[error("direction identifier longer than {MAX_DIRECTION_LEN} characters")]
    DirectionTooLong,
    #[error("direction identifier contains {0:?}; only [A-Za-z0-9_-] allowed")]
    InvalidDirectionChar(char),
    #[error("missing ':' separator in marker {0:?}")]
    MissingSeparator(String),
    #[error("unknown marker status {0:?}")]
    UnknownStatus(String),
}

// ── Direction ─────────────────────────────────────────────────────────────────

/// Tag distinguishing one direction of traffic on a shared channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Direction(String);

impl Direction {
    pub fn new(id: impl Into<String>) -> Result<Self, MarkerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(MarkerError::EmptyDirection);
        }
        if id.len() > MAX_DIRECTION_LEN {
            return Err(MarkerError::DirectionTooLong);
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(MarkerError::InvalidDirectionChar(c));
        }
        if id.len() < MIN_DIRECTION_LEN {
            return Err(MarkerError::DirectionTooShort);
        }
        Ok(Self(id))
    }

    /// Fresh random identifier, for generating a new channel pair.
    pub fn random() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_DIRECTION_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Marker for a post in `status` written by this direction.
    pub fn marker(&self, status: Status) -> Marker {
        Marker {
            direction: self.clone(),
            status,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Direction {
    type Error = MarkerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.0
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Post reserved; replies are still being attached.
    Writing,
    /// All replies attached; the peer may consume the post.
    Done,
}

impl Status {
    /// On-wire spelling. The casing is part of the protocol both peers share.
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Writing => "writing",
            Status::Done => "Done",
        }
    }
}

impl FromStr for Status {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "writing" => Ok(Status::Writing),
            "Done" => Ok(Status::Done),
            other => Err(MarkerError::UnknownStatus(other.to_string())),
        }
    }
}

// ── Marker ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    pub direction: Direction,
    pub status: Status,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.direction, SEPARATOR, self.status.as_str())
    }
}

impl FromStr for Marker {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, status) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| MarkerError::MissingSeparator(s.to_string()))?;
        Ok(Marker {
            direction: Direction::new(direction)?,
            status: status.parse()?,
        })
    }
}
