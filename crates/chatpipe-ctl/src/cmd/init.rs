//! `init`: write a fresh config with randomized directions.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use chatpipe_core::config::ChatpipeConfig;

pub fn cmd_init(path: Option<&PathBuf>, swap: bool, force: bool) -> Result<()> {
    let path = path.cloned().unwrap_or_else(ChatpipeConfig::file_path);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = ChatpipeConfig::randomized();
    config
        .write_to(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());

    if swap {
        let peer = toml::to_string_pretty(&config.mirrored())
            .context("failed to render peer config")?;
        println!();
        println!("# Peer config (directions swapped):");
        print!("{peer}");
    }
    Ok(())
}
