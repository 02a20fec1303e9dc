//! Command handlers for windlassctl.

use anyhow::Result;
use std::path::PathBuf;

use windlass_update::{AutoUpdater, UpdateConfig};

use crate::{Cli, VERSION};

pub fn build_config(cli: &Cli) -> UpdateConfig {
    let mut config = UpdateConfig::new(VERSION, cli.url.clone());
    config.allow_prerelease = cli.prerelease;
    config.state_dir = cli.state_dir.clone().or_else(default_state_dir);
    config.cache_dir = cli.cache_dir.clone().or_else(default_cache_dir);
    config
}

pub async fn update(mut config: UpdateConfig, yes: bool, restart: bool) -> Result<()> {
    if yes {
        config.require_confirmation = false;
    }
    let updater = AutoUpdater::new(config)?;
    if restart {
        // The relaunched binary reports its own (new) version.
        updater.update_and_restart(&["--version".to_string()]).await?;
    } else {
        updater.update().await?;
    }
    Ok(())
}

pub async fn status(config: UpdateConfig) -> Result<()> {
    AutoUpdater::new(config)?.status().await?;
    Ok(())
}

pub async fn skip(config: UpdateConfig) -> Result<()> {
    AutoUpdater::new(config)?.skip_version().await?;
    Ok(())
}

pub fn cleanup(config: UpdateConfig) -> Result<()> {
    AutoUpdater::new(config)?.cleanup_cache()?;
    println!("🧹  Removed stale downloads from the cache.");
    Ok(())
}

pub async fn notify(config: UpdateConfig) -> Result<()> {
    AutoUpdater::new(config)?.check_and_notify().await;
    Ok(())
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("windlass"))
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("windlass"))
}
