//! Persisted last-check state.
//!
//! A single `last_check.json` per install, overwritten on every successful
//! check. The skip fields record a user's decision to mute one exact
//! version; they survive checks that report the same version and are
//! cleared as soon as a different latest version shows up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::UpdateError;

pub const LAST_CHECK_FILE: &str = "last_check.json";

/// Durable record of the most recent check and any skipped version.
/// The default value doubles as the never-checked sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastCheck {
    pub checked_at: Option<DateTime<Utc>>,
    pub latest_version: String,
    pub update_skipped: bool,
    pub skipped_version: String,
    pub skipped_at: Option<DateTime<Utc>>,
}

impl LastCheck {
    /// True when `interval` has elapsed since the recorded check.
    /// A never-checked state is always due.
    pub fn should_check(&self, interval: Duration) -> bool {
        match self.checked_at {
            None => true,
            Some(at) => match chrono::Duration::from_std(interval) {
                Ok(interval) => Utc::now().signed_duration_since(at) >= interval,
                // An interval too large for chrono can never elapse.
                Err(_) => false,
            },
        }
    }

    /// Record a successful check for `latest`. A stored skip only suppresses
    /// the exact version it names, so it is dropped when the latest moves on.
    pub fn record_check(&mut self, latest: &str) {
        self.checked_at = Some(Utc::now());
        self.latest_version = latest.to_string();
        if self.update_skipped && self.skipped_version != latest {
            self.update_skipped = false;
            self.skipped_version = String::new();
            self.skipped_at = None;
        }
    }

    /// Mark `version` as skipped by explicit user action.
    pub fn mark_skipped(&mut self, version: &str) {
        self.update_skipped = true;
        self.skipped_version = version.to_string();
        self.skipped_at = Some(Utc::now());
    }
}

pub fn state_file(state_dir: &Path) -> PathBuf {
    state_dir.join(LAST_CHECK_FILE)
}

/// Load the state file, falling back to the never-checked sentinel when it
/// does not exist. A file that exists but fails to parse is a state error.
pub fn load(state_dir: &Path) -> Result<LastCheck, UpdateError> {
    let path = state_file(state_dir);
    if !path.exists() {
        return Ok(LastCheck::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| UpdateError::State(format!("corrupt state file {}: {}", path.display(), e)))
}

pub fn save(state_dir: &Path, state: &LastCheck) -> Result<(), UpdateError> {
    std::fs::create_dir_all(state_dir)?;
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(state_file(state_dir), content)?;
    Ok(())
}
