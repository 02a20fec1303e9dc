//! Release manifest wire format.
//!
//! The update server answers a GET with a single JSON document describing
//! the latest release. `checksum_algo` defaults to sha256 when the server
//! omits it; an algorithm we do not implement is a hard error at digest
//! time, never a silent fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::UpdateError;

/// Digest algorithms the downloader can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }
}

/// Server-supplied description of the latest available release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Release version (semver string, optionally `v`-prefixed)
    pub version: String,
    /// Payload download URL
    pub url: String,
    /// Expected payload digest, lowercase or uppercase hex
    #[serde(default)]
    pub checksum: String,
    /// Digest algorithm name, `sha256` when absent
    #[serde(default = "default_checksum_algo")]
    pub checksum_algo: String,
    /// Payload size in bytes, if the server knows it
    #[serde(default)]
    pub size: Option<u64>,
    /// Release timestamp (RFC 3339)
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    /// Human-readable release notes
    #[serde(default)]
    pub changelog: Option<String>,
    /// Marks a release users should not sit on
    #[serde(default)]
    pub critical: bool,
    /// Per-platform download URLs, keyed by `{os}-{arch}`
    #[serde(default)]
    pub platform: Option<HashMap<String, String>>,
}

fn default_checksum_algo() -> String {
    "sha256".to_string()
}

impl ReleaseManifest {
    /// Resolve the declared algorithm name to one we can compute.
    pub fn algorithm(&self) -> Result<ChecksumAlgorithm, UpdateError> {
        match self.checksum_algo.to_ascii_lowercase().as_str() {
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" => Ok(ChecksumAlgorithm::Sha512),
            other => Err(UpdateError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Download URL for the running platform. A `platform` map entry wins
    /// over the top-level `url`.
    pub fn download_url(&self) -> &str {
        if let Some(platforms) = &self.platform {
            if let Some(url) = platforms.get(&platform_key()) {
                return url;
            }
        }
        &self.url
    }
}

/// `{os}-{arch}` key used to look up platform-specific download URLs.
pub fn platform_key() -> String {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else {
        "linux"
    };

    let arch = if cfg!(target_arch = "x86_64") {
        "amd64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        std::env::consts::ARCH
    };

    format!("{}-{}", os, arch)
}
