//! Release checking and notification policy.
//!
//! Fetches the release manifest, compares it against the running version,
//! and keeps `last_check.json` current. Persistence on the check path is
//! best-effort: a broken state file must never block a working check, and a
//! broken skip lookup must never hide an update.

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::manifest::ReleaseManifest;
use crate::state::{self, LastCheck};
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available,
}

/// Outcome of a single check against the update server.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub status: UpdateStatus,
    pub current: Version,
    pub latest: Version,
    pub manifest: ReleaseManifest,
    /// Set when the check succeeded but recording it to disk did not.
    pub state_warning: Option<String>,
}

impl CheckResult {
    pub fn update_available(&self) -> bool {
        self.status == UpdateStatus::Available
    }
}

pub struct UpdateChecker {
    config: UpdateConfig,
    client: Client,
}

impl UpdateChecker {
    pub fn new(config: UpdateConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Fetch the manifest and compare versions. Fails fast on a malformed
    /// `current_version`; records the check to disk best-effort.
    pub async fn check(&self) -> Result<CheckResult, UpdateError> {
        let current = Version::parse(&self.config.current_version)?;

        let manifest = self.fetch_manifest().await?;
        let latest = Version::parse(&manifest.version)?;

        let status = resolve_status(&current, &latest, self.config.allow_prerelease);
        match status {
            UpdateStatus::Available => {
                info!("update available: {} -> {}", current, latest)
            }
            UpdateStatus::UpToDate => debug!("no update available (current {})", current),
        }

        let state_warning = match self.record_check(&latest) {
            Ok(()) => None,
            Err(e) => {
                warn!("failed to record update check: {}", e);
                Some(e.to_string())
            }
        };

        Ok(CheckResult {
            status,
            current,
            latest,
            manifest,
            state_warning,
        })
    }

    async fn fetch_manifest(&self) -> Result<ReleaseManifest, UpdateError> {
        let url = &self.config.update_url;
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpdateError::Fetch(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Fetch(format!(
                "update server returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpdateError::Fetch(format!("reading response from {}: {}", url, e)))?;

        serde_json::from_slice(&body).map_err(|e| UpdateError::Manifest(e.to_string()))
    }

    fn record_check(&self, latest: &Version) -> Result<(), UpdateError> {
        let dir = self.state_dir()?;
        // A corrupt state file must not block the check; overwrite it.
        let mut state = state::load(dir).unwrap_or_default();
        state.record_check(&latest.to_string());
        state::save(dir, &state)
    }

    /// Stored state, or the never-checked sentinel when no file exists yet.
    pub fn last_check(&self) -> Result<LastCheck, UpdateError> {
        state::load(self.state_dir()?)
    }

    /// Persist an explicit user decision to mute `version`.
    pub fn skip_version(&self, version: &str) -> Result<(), UpdateError> {
        let dir = self.state_dir()?;
        let mut state = state::load(dir)?;
        state.mark_skipped(version);
        state::save(dir, &state)?;
        info!("version {} marked as skipped", version);
        Ok(())
    }

    /// Whether the user should hear about `result`. False when nothing is
    /// available or the exact available version was skipped; a state read
    /// failure defaults to notify.
    pub fn should_notify(&self, result: &CheckResult) -> bool {
        if !result.update_available() {
            return false;
        }
        match self.last_check() {
            Ok(state) => {
                !(state.update_skipped && state.skipped_version == result.latest.to_string())
            }
            Err(e) => {
                debug!("skip lookup failed, notifying anyway: {}", e);
                true
            }
        }
    }

    fn state_dir(&self) -> Result<&std::path::Path, UpdateError> {
        self.config
            .state_dir
            .as_deref()
            .ok_or_else(|| UpdateError::State("state directory not configured".to_string()))
    }
}

/// Prerelease policy: a prerelease latest is invisible unless opted in.
fn resolve_status(current: &Version, latest: &Version, allow_prerelease: bool) -> UpdateStatus {
    if latest.is_prerelease() && !allow_prerelease {
        return UpdateStatus::UpToDate;
    }
    if latest.is_newer_than(current) {
        UpdateStatus::Available
    } else {
        UpdateStatus::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn version(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn checker_with_state(dir: PathBuf) -> UpdateChecker {
        let mut config = UpdateConfig::new("1.0.0", "http://127.0.0.1:1/release.json");
        config.state_dir = Some(dir);
        UpdateChecker::new(config)
    }

    fn available_result(latest: &str) -> CheckResult {
        CheckResult {
            status: UpdateStatus::Available,
            current: version("1.0.0"),
            latest: version(latest),
            manifest: serde_json::from_str(&format!(
                r#"{{"version": "{}", "url": "http://example.com/bin", "checksum": "ab"}}"#,
                latest
            ))
            .unwrap(),
            state_warning: None,
        }
    }

    #[test]
    fn prerelease_is_invisible_by_default() {
        let current = version("1.0.0");
        let beta = version("2.0.0-beta.1");
        assert_eq!(
            resolve_status(&current, &beta, false),
            UpdateStatus::UpToDate
        );
        assert_eq!(
            resolve_status(&current, &beta, true),
            UpdateStatus::Available
        );
    }

    #[test]
    fn equal_or_older_latest_is_up_to_date() {
        let current = version("2.0.0");
        assert_eq!(
            resolve_status(&current, &version("2.0.0"), false),
            UpdateStatus::UpToDate
        );
        assert_eq!(
            resolve_status(&current, &version("1.9.9"), false),
            UpdateStatus::UpToDate
        );
        assert_eq!(
            resolve_status(&current, &version("2.0.1"), false),
            UpdateStatus::Available
        );
    }

    #[test]
    fn skip_suppresses_exact_version_only() {
        let dir = tempfile::tempdir().unwrap();
        let checker = checker_with_state(dir.path().to_path_buf());

        checker.skip_version("2.0.0").unwrap();
        assert!(!checker.should_notify(&available_result("2.0.0")));
        assert!(checker.should_notify(&available_result("2.1.0")));
    }

    #[test]
    fn should_notify_fails_open_on_state_errors() {
        let dir = tempfile::tempdir().unwrap();
        let checker = checker_with_state(dir.path().to_path_buf());
        std::fs::write(state::state_file(dir.path()), "{corrupt").unwrap();

        assert!(checker.should_notify(&available_result("2.0.0")));
    }

    #[test]
    fn up_to_date_never_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let checker = checker_with_state(dir.path().to_path_buf());

        let mut result = available_result("2.0.0");
        result.status = UpdateStatus::UpToDate;
        assert!(!checker.should_notify(&result));
    }

    #[test]
    fn skip_requires_a_state_dir() {
        let config = UpdateConfig::new("1.0.0", "http://127.0.0.1:1/release.json");
        let checker = UpdateChecker::new(config);
        match checker.skip_version("2.0.0") {
            Err(UpdateError::State(_)) => {}
            other => panic!("expected State error, got {:?}", other),
        }
        match checker.last_check() {
            Err(UpdateError::State(_)) => {}
            other => panic!("expected State error, got {:?}", other),
        }
    }
}
