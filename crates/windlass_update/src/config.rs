//! Update subsystem configuration.
//!
//! Owned and supplied by the host CLI; the subsystem itself reads no config
//! files. Defaults: check once a day, 30 s HTTP timeout, stable releases
//! only, ask before installing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Version of the running binary (required, must parse as semver)
    pub current_version: String,
    /// Release manifest URL (required)
    pub update_url: String,
    /// Seconds between background checks
    pub check_interval_secs: u64,
    /// Reserved; no specified flow consumes it yet
    pub auto_update: bool,
    /// Ask y/N before installing
    pub require_confirmation: bool,
    /// Consider prerelease versions when comparing
    pub allow_prerelease: bool,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Directory holding `last_check.json`
    pub state_dir: Option<PathBuf>,
    /// Directory downloads are staged and verified in
    pub cache_dir: Option<PathBuf>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            current_version: String::new(),
            update_url: String::new(),
            check_interval_secs: 24 * 60 * 60,
            auto_update: false,
            require_confirmation: true,
            allow_prerelease: false,
            http_timeout_secs: 30,
            state_dir: None,
            cache_dir: None,
        }
    }
}

impl UpdateConfig {
    pub fn new(current_version: impl Into<String>, update_url: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            update_url: update_url.into(),
            ..Self::default()
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn user_agent(&self) -> String {
        format!("windlass/{}", self.current_version)
    }
}
