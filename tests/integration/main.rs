//! chatpipe integration test harness.
//!
//! Every test starts its own mock Mattermost server on 127.0.0.1:0 and
//! drives real `MattermostClient`s over HTTP. No external services needed:
//!
//!   cargo test --test integration

use std::sync::Arc;

use anyhow::{Context, Result};

use chatpipe_channel::{Channel, ChannelSettings};
use chatpipe_core::marker::Direction;
use chatpipe_transport::{MattermostClient, MattermostSettings};

mod mock;


// ── Harness ───────────────────────────────────────────────────────────────────

pub const CHANNEL_NAME: &str = "pipe0123";

pub fn settings(url: &str) -> MattermostSettings {
    MattermostSettings {
        server_url: url.to_string(),
        team_name: mock::TEAM.to_string(),
        access_token: mock::TOKEN.to_string(),
        channel_name: CHANNEL_NAME.to_string(),
        user_agent: "chatpipe-integration".to_string(),
        upload_burst: 20,
        uploads_per_minute: 20,
    }
}

/// Both ends of a channel, each with its own HTTP client.
pub struct Peers {
    pub server: mock::MockServer,
    pub initiator: Channel,
    pub responder: Channel,
}

pub async fn peers_with_limits(
    message_body_limit: usize,
    large_payload_threshold: usize,
) -> Result<Peers> {
    let server = mock::start().await.context("mock server failed to start")?;

    let c2s = Direction::new("c2s0").context("direction")?;
    let s2c = Direction::new("s2c0").context("direction")?;

    let mut initiator_settings = ChannelSettings::new(s2c.clone(), c2s.clone());
    initiator_settings.message_body_limit = message_body_limit;
    initiator_settings.large_payload_threshold = large_payload_threshold;
    let mut responder_settings = ChannelSettings::new(c2s, s2c);
    responder_settings.message_body_limit = message_body_limit;
    responder_settings.large_payload_threshold = large_payload_threshold;

    let a = MattermostClient::connect(settings(&server.url)).await?;
    let b = MattermostClient::connect(settings(&server.url)).await?;
    let initiator = Channel::new(Arc::new(a), initiator_settings)?;
    let responder = Channel::new(Arc::new(b), responder_settings)?;

    Ok(Peers {
        server,
        initiator,
        responder,
    })
}

pub async fn peers() -> Result<Peers> {
    peers_with_limits(16_383, 120_000).await
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
