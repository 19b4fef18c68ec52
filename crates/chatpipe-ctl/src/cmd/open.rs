//! Shared setup: config → Mattermost client → channel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use chatpipe_channel::{Channel, ChannelSettings};
use chatpipe_core::config::ChatpipeConfig;
use chatpipe_transport::{MattermostClient, MattermostSettings};

pub fn load_config(path: Option<&PathBuf>) -> Result<ChatpipeConfig> {
    let path = path.cloned().unwrap_or_else(ChatpipeConfig::file_path);
    ChatpipeConfig::load_from(path.clone())
        .with_context(|| format!("failed to load config from {}", path.display()))
}

pub async fn open_channel(config: &ChatpipeConfig) -> Result<Channel> {
    let settings = ChannelSettings::from_config(config).context("incomplete channel config")?;
    let client = MattermostClient::connect(MattermostSettings::from(&config.mattermost))
        .await
        .with_context(|| {
            format!(
                "failed to connect to Mattermost at {}",
                config.mattermost.server_url
            )
        })?;
    tracing::info!(
        inbound = %settings.inbound,
        outbound = %settings.outbound,
        max_chunk = settings.max_chunk_bytes(),
        "channel open"
    );
    Channel::new(Arc::new(client), settings).context("invalid channel settings")
}
