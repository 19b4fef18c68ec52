//! Configuration system for chatpipe.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CHATPIPE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/chatpipe/config.toml
//!   3. ~/.config/chatpipe/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::marker::{Direction, MarkerError};

/// Mattermost rejects message bodies longer than this many characters.
pub const DEFAULT_MESSAGE_BODY_LIMIT: usize = 16_383;

/// Payloads of at least this many raw bytes go through a file upload.
pub const DEFAULT_LARGE_PAYLOAD_THRESHOLD: usize = 120_000;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.97 Safari/537.36";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatpipeConfig {
    pub channel: ChannelConfig,
    pub mattermost: MattermostConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Direction this peer reads. Equals the remote peer's outbound direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_direction: Option<Direction>,
    /// Direction this peer writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_direction: Option<Direction>,
    /// Service limit on characters per message body.
    pub message_body_limit: usize,
    /// Raw payload size at which sends switch to a file upload.
    /// Independent of `message_body_limit`.
    pub large_payload_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MattermostConfig {
    /// Server URL with scheme, no trailing slash.
    pub server_url: String,
    pub team_name: String,
    /// Personal access token.
    pub access_token: String,
    /// Channel the two peers share. Created if missing.
    pub channel_name: String,
    pub user_agent: String,
    /// Upload burst before throttling kicks in.
    pub upload_burst: u32,
    /// Sustained upload rate. The service allows roughly 20/min.
    pub uploads_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between receive polls.
    pub interval_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            inbound_direction: None,
            outbound_direction: None,
            message_body_limit: DEFAULT_MESSAGE_BODY_LIMIT,
            large_payload_threshold: DEFAULT_LARGE_PAYLOAD_THRESHOLD,
        }
    }
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            team_name: String::new(),
            access_token: String::new(),
            channel_name: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            upload_burst: 20,
            uploads_per_minute: 20,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 2_000 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("chatpipe")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, MarkerError),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ChatpipeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::file_path())
    }

    /// Load from an explicit file, still applying env overrides.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            ChatpipeConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CHATPIPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write this config to `path`, creating parent directories.
    pub fn write_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Fresh config with random directions and channel name.
    pub fn randomized() -> Self {
        let mut config = ChatpipeConfig::default();
        config.channel.inbound_direction = Some(Direction::random());
        config.channel.outbound_direction = Some(Direction::random());
        config.mattermost.channel_name = Direction::random().as_str().to_lowercase();
        config
    }

    /// The peer's view of this config: directions swapped.
    pub fn mirrored(&self) -> Self {
        let mut config = self.clone();
        std::mem::swap(
            &mut config.channel.inbound_direction,
            &mut config.channel.outbound_direction,
        );
        config
    }

    /// (inbound, outbound), both required to open a channel.
    pub fn directions(&self) -> Result<(Direction, Direction), ConfigError> {
        let inbound = self
            .channel
            .inbound_direction
            .clone()
            .ok_or(ConfigError::Missing("channel.inbound_direction"))?;
        let outbound = self
            .channel
            .outbound_direction
            .clone()
            .ok_or(ConfigError::Missing("channel.outbound_direction"))?;
        Ok((inbound, outbound))
    }

    /// Apply CHATPIPE_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("CHATPIPE_CHANNEL__INBOUND_DIRECTION") {
            let d = Direction::new(v)
                .map_err(|e| ConfigError::Invalid("CHATPIPE_CHANNEL__INBOUND_DIRECTION", e))?;
            self.channel.inbound_direction = Some(d);
        }
        if let Ok(v) = std::env::var("CHATPIPE_CHANNEL__OUTBOUND_DIRECTION") {
            let d = Direction::new(v)
                .map_err(|e| ConfigError::Invalid("CHATPIPE_CHANNEL__OUTBOUND_DIRECTION", e))?;
            self.channel.outbound_direction = Some(d);
        }
        if let Ok(v) = std::env::var("CHATPIPE_CHANNEL__MESSAGE_BODY_LIMIT") {
            if let Ok(n) = v.parse() {
                self.channel.message_body_limit = n;
            }
        }
        if let Ok(v) = std::env::var("CHATPIPE_CHANNEL__LARGE_PAYLOAD_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.channel.large_payload_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__SERVER_URL") {
            self.mattermost.server_url = v;
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__TEAM_NAME") {
            self.mattermost.team_name = v;
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__ACCESS_TOKEN") {
            self.mattermost.access_token = v;
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__CHANNEL_NAME") {
            self.mattermost.channel_name = v;
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__USER_AGENT") {
            self.mattermost.user_agent = v;
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__UPLOAD_BURST") {
            if let Ok(n) = v.parse() {
                self.mattermost.upload_burst = n;
            }
        }
        if let Ok(v) = std::env::var("CHATPIPE_MATTERMOST__UPLOADS_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                self.mattermost.uploads_per_minute = n;
            }
        }
        if let Ok(v) = std::env::var("CHATPIPE_POLL__INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.poll.interval_ms = ms;
            }
        }
        Ok(())
    }
}
