//! Windlass Update - self-update subsystem for the windlass CLI
//!
//! Discovers, verifies, and installs new versions of a deployed binary
//! without a package manager: manifest check against a plain HTTPS
//! endpoint, checksum-verified streaming download, and atomic in-place
//! replacement with backup and rollback.

pub mod checker;
pub mod config;
pub mod downloader;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod state;
pub mod updater;
pub mod version;

pub use checker::{CheckResult, UpdateChecker, UpdateStatus};
pub use config::UpdateConfig;
pub use downloader::{DownloadProgress, Downloader};
pub use error::UpdateError;
pub use installer::{Installer, PosixReplace, ReplaceStrategy, WindowsReplace};
pub use manifest::{platform_key, ChecksumAlgorithm, ReleaseManifest};
pub use state::LastCheck;
pub use updater::AutoUpdater;
pub use version::Version;
