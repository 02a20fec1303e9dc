//! User-facing update orchestration.
//!
//! Ties the checker, downloader, and installer into the operations a host
//! CLI exposes: the interval-gated startup notice, the interactive update
//! (with and without restart), version skipping, a status report, and cache
//! cleanup. Constructed per call site; there is no shared global updater.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::checker::{CheckResult, UpdateChecker, UpdateStatus};
use crate::config::UpdateConfig;
use crate::downloader::Downloader;
use crate::error::UpdateError;
use crate::installer::Installer;

/// Hard bound on the startup check, independent of the configured HTTP
/// timeout, so an unreachable update server cannot delay program launch.
const BACKGROUND_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AutoUpdater {
    config: UpdateConfig,
    checker: UpdateChecker,
    downloader: Downloader,
    installer: Installer,
}

impl AutoUpdater {
    /// Updater for the currently-running executable.
    pub fn new(config: UpdateConfig) -> Result<Self, UpdateError> {
        let installer = Installer::for_current_exe()?;
        Ok(Self::with_installer(config, installer))
    }

    /// Updater targeting an explicit installer (tests, packaging flows).
    pub fn with_installer(config: UpdateConfig, installer: Installer) -> Self {
        Self {
            checker: UpdateChecker::new(config.clone()),
            downloader: Downloader::new(config.clone()),
            installer,
            config,
        }
    }

    /// Interval-gated background check. Never fails and never blocks past
    /// its internal timeout: any error is logged and swallowed so a broken
    /// update server cannot abort normal startup.
    pub async fn check_and_notify(&self) {
        match self.checker.last_check() {
            Ok(state) if !state.should_check(self.config.check_interval()) => {
                debug!("update check skipped, interval not elapsed");
                return;
            }
            Err(e) => debug!("no usable last-check state: {}", e),
            Ok(_) => {}
        }

        let result =
            match tokio::time::timeout(BACKGROUND_CHECK_TIMEOUT, self.checker.check()).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    debug!("background update check failed: {}", e);
                    return;
                }
                Err(_) => {
                    debug!("background update check timed out");
                    return;
                }
            };

        if result.update_available() && self.checker.should_notify(&result) {
            println!();
            println!(
                "📦  Update available: v{} → v{}",
                result.current, result.latest
            );
            if result.manifest.critical {
                println!("⚠️  This is a critical update. Install it as soon as possible.");
            }
            println!("    Run `windlassctl update` to install.");
        }
    }

    /// Interactive update: live check (the interval does not apply to an
    /// explicit user action), confirm, download, install. The caller must
    /// restart for the new binary to take effect.
    pub async fn update(&self) -> Result<(), UpdateError> {
        match self.prepare_update().await? {
            Some((result, payload)) => {
                self.installer.install(&payload)?;
                println!("🎉  Updated to v{}.", result.latest);
                println!(
                    "    The running process still holds the old binary in memory. Restart to pick up the new version."
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Like `update`, but hands control to the new binary. Does not return
    /// on a completed install.
    pub async fn update_and_restart(&self, args: &[String]) -> Result<(), UpdateError> {
        match self.prepare_update().await? {
            Some((result, payload)) => {
                println!("🎉  Updated to v{}, restarting.", result.latest);
                self.installer.install_and_restart(&payload, args)
            }
            None => Ok(()),
        }
    }

    /// Shared front half of the update flows: check, report, confirm,
    /// pre-flight, download. `None` means there was nothing to do or the
    /// user declined.
    async fn prepare_update(&self) -> Result<Option<(CheckResult, PathBuf)>, UpdateError> {
        let result = self.checker.check().await?;
        if !result.update_available() {
            println!("✅  Already on the latest version (v{}).", result.current);
            return Ok(None);
        }

        self.print_release_details(&result);

        if self.config.require_confirmation && !confirm("Install this update?")? {
            println!("Update cancelled.");
            return Ok(None);
        }

        self.installer.can_update()?;

        let payload = self.download_with_progress(&result).await?;
        Ok(Some((result, payload)))
    }

    /// Live check, then persist the discovered version as skipped.
    pub async fn skip_version(&self) -> Result<(), UpdateError> {
        let result = self.checker.check().await?;
        if !result.update_available() {
            println!("✅  Already on the latest version. Nothing to skip.");
            return Ok(());
        }

        let version = result.latest.to_string();
        self.checker.skip_version(&version)?;
        println!("🔕  Skipping v{}. You will not be notified about it again.", version);
        Ok(())
    }

    /// Live check plus a structured summary. Downloads and installs nothing.
    pub async fn status(&self) -> Result<(), UpdateError> {
        let result = self.checker.check().await?;

        println!("Current version:  v{}", result.current);
        match result.status {
            UpdateStatus::UpToDate => println!("Status:           up to date"),
            UpdateStatus::Available => {
                println!("Status:           update available");
                println!("Latest version:   v{}", result.latest);
                if result.manifest.critical {
                    println!("Criticality:      critical");
                }
            }
        }
        match self.checker.last_check() {
            Ok(state) => match state.checked_at {
                Some(at) => println!("Last checked:     {}", format_age(at)),
                None => println!("Last checked:     never"),
            },
            Err(_) => println!("Last checked:     unknown"),
        }
        Ok(())
    }

    /// Prune downloads older than the retention window from the cache.
    pub fn cleanup_cache(&self) -> Result<(), UpdateError> {
        self.downloader.cleanup_old_downloads()
    }

    fn print_release_details(&self, result: &CheckResult) {
        let manifest = &result.manifest;
        println!(
            "🆕  Update available: v{} → v{}",
            result.current, result.latest
        );
        if manifest.critical {
            println!("⚠️  Critical update");
        }
        if let Some(size) = manifest.size {
            println!("    Size: {}", format_bytes(size));
        }
        if let Some(date) = manifest.release_date {
            println!("    Released: {}", date.format("%Y-%m-%d"));
        }
        if let Some(changelog) = &manifest.changelog {
            if !changelog.is_empty() {
                println!();
                println!("{}", changelog.trim_end());
                println!();
            }
        }
    }

    async fn download_with_progress(&self, result: &CheckResult) -> Result<PathBuf, UpdateError> {
        let bar = match result.manifest.size {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };

        let downloaded = self
            .downloader
            .download(&result.manifest, |progress| {
                if let Some(total) = progress.total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(progress.bytes_downloaded);
                bar.set_message(format_speed(progress.bytes_per_sec));
            })
            .await;

        bar.finish_and_clear();
        downloaded
    }
}

fn confirm(prompt: &str) -> Result<bool, UpdateError> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let bytes = bytes as f64;
    if bytes < KB {
        format!("{} B", bytes as u64)
    } else if bytes < MB {
        format!("{:.1} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} GB", bytes / GB)
    }
}

fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec < 1024.0 {
        format!("{:.0} B/s", bytes_per_sec)
    } else if bytes_per_sec < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / 1024.0 / 1024.0)
    }
}

fn format_age(from: DateTime<Utc>) -> String {
    let secs = Utc::now()
        .signed_duration_since(from)
        .num_seconds()
        .max(0) as u64;
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn formats_speed() {
        assert_eq!(format_speed(100.0), "100 B/s");
        assert_eq!(format_speed(2048.0), "2.0 KB/s");
        assert_eq!(format_speed(3.0 * 1024.0 * 1024.0), "3.0 MB/s");
    }

    #[test]
    fn formats_age() {
        assert_eq!(format_age(Utc::now() - chrono::Duration::seconds(30)), "30s ago");
        assert_eq!(format_age(Utc::now() - chrono::Duration::minutes(2)), "2m ago");
        assert_eq!(format_age(Utc::now() - chrono::Duration::hours(2)), "2h ago");
        assert_eq!(format_age(Utc::now() - chrono::Duration::days(3)), "3d ago");
    }
}
