//! chatpipe-ctl: operate a chatpipe channel from the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

mod cmd;

use cmd::open::{load_config, open_channel};

fn print_usage() {
    println!("Usage: chatpipe-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  init [--swap] [--force]   Write a config with random directions");
    println!("  send <file>               Send a file, re-offering the remainder until done");
    println!("  receive [--out <dir>]     Poll once and drain completed transfers");
    println!("  poll [--out <dir>]        Poll on the configured interval until Ctrl-C");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: $CHATPIPE_CONFIG or ~/.config/chatpipe/config.toml)");
    println!();
    println!("Logging is controlled by RUST_LOG, e.g. RUST_LOG=chatpipe_channel=debug");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut swap = false;
    let mut force = false;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(
                    args.get(i).context("--config requires a value")?,
                ));
            }
            "--out" => {
                i += 1;
                out_dir = Some(PathBuf::from(
                    args.get(i).context("--out requires a value")?,
                ));
            }
            "--swap" => swap = true,
            "--force" => force = true,
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["init"] => cmd::init::cmd_init(config_path.as_ref(), swap, force),
        ["send", file] => {
            let config = load_config(config_path.as_ref())?;
            let channel = open_channel(&config).await?;
            cmd::send::cmd_send(&channel, file).await
        }
        ["receive"] => {
            let config = load_config(config_path.as_ref())?;
            let channel = open_channel(&config).await?;
            let mut seq = 0;
            let n = cmd::receive::cmd_receive(&channel, out_dir.as_ref(), &mut seq).await?;
            if n == 0 {
                println!("No completed transfers.");
            }
            Ok(())
        }
        ["poll"] => {
            let config = load_config(config_path.as_ref())?;
            let channel = open_channel(&config).await?;
            let interval = Duration::from_millis(config.poll.interval_ms.max(1));
            cmd::receive::cmd_poll(&channel, out_dir.as_ref(), interval).await
        }
        [] | ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
