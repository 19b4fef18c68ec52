//! `send`: push a whole file through the channel.

use anyhow::{bail, Context, Result};

use chatpipe_channel::Channel;

pub async fn cmd_send(channel: &Channel, path: &str) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("failed to read file: {}", path))?;
    if data.is_empty() {
        println!("{path} is empty, nothing to send.");
        return Ok(());
    }

    let mut offset = 0;
    let mut transfers = 0;
    while offset < data.len() {
        let sent = channel
            .send(&data[offset..])
            .await
            .with_context(|| format!("send failed at offset {offset}"))?;
        if sent == 0 {
            bail!("channel accepted no bytes at offset {offset}");
        }
        offset += sent;
        transfers += 1;
        println!("  transfer {transfers:>4}: {sent} bytes ({offset}/{})", data.len());
    }

    println!("Sent {} bytes in {transfers} transfer(s).", data.len());
    Ok(())
}
