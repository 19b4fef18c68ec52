//! `receive` and `poll`: drain the channel.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use chatpipe_channel::Channel;

/// One poll. Returns how many payloads arrived.
pub async fn cmd_receive(
    channel: &Channel,
    out: Option<&PathBuf>,
    seq: &mut usize,
) -> Result<usize> {
    let payloads = channel.receive().await.context("receive failed")?;
    for payload in &payloads {
        *seq += 1;
        match out {
            Some(dir) => {
                let path = write_payload(dir, seq, payload)?;
                println!("  {} ({} bytes)", path.display(), payload.len());
            }
            None => println!("  payload {:>4}: {} bytes", seq, payload.len()),
        }
    }
    Ok(payloads.len())
}

/// Poll until Ctrl-C.
pub async fn cmd_poll(
    channel: &Channel,
    out: Option<&PathBuf>,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut seq = 0usize;
    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(received, "poll loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                match cmd_receive(channel, out, &mut seq).await {
                    Ok(0) => {}
                    Ok(n) => {
                        received += n;
                        tracing::info!(payloads = n, "poll delivered");
                    }
                    // Transport hiccups are retried on the next tick.
                    Err(e) => tracing::warn!(error = %e, "poll failed"),
                }
            }
        }
    }
}

/// Write `payload` as `{seq:06}.bin`, advancing `seq` past names already
/// taken. Files from earlier runs are never overwritten.
fn write_payload(dir: &Path, seq: &mut usize, payload: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    loop {
        let path = dir.join(format!("{:06}.bin", *seq));
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                *seq += 1;
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create {}", path.display()))
            }
        };
        file.write_all(payload)
            .with_context(|| format!("failed to write {}", path.display()))?;
        return Ok(path);
    }
}
