//! Verified payload download with streaming progress.
//!
//! Payloads stream into a uniquely named temporary file inside the cache
//! directory, never outside it, so the installer's later rename stays on
//! one filesystem. A download only survives in the cache once its digest
//! matches the manifest; every failure path removes the partial file.

use futures_util::StreamExt;
use sha2::{Digest, Sha256, Sha512};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::manifest::{ChecksumAlgorithm, ReleaseManifest};

/// Cache entries older than this are removed by `cleanup_old_downloads`.
const MAX_CACHE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Transfer snapshot, recomputed after every chunk. Not persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    /// 0–100, when the total is known
    pub percentage: Option<f64>,
    /// Throughput since transfer start
    pub bytes_per_sec: f64,
    pub eta: Option<Duration>,
}

impl DownloadProgress {
    fn measure(bytes_downloaded: u64, total_bytes: Option<u64>, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            bytes_downloaded as f64 / secs
        } else {
            0.0
        };
        let percentage = total_bytes
            .filter(|total| *total > 0)
            .map(|total| (bytes_downloaded as f64 / total as f64) * 100.0);
        let eta = total_bytes.and_then(|total| {
            if bytes_per_sec > 0.0 && total > bytes_downloaded {
                Some(Duration::from_secs_f64(
                    (total - bytes_downloaded) as f64 / bytes_per_sec,
                ))
            } else {
                None
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percentage,
            bytes_per_sec,
            eta,
        }
    }
}

pub struct Downloader {
    config: UpdateConfig,
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(config: UpdateConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Download the manifest's payload into the cache directory, verify its
    /// digest, and return the verified file's path.
    pub async fn download<F>(
        &self,
        manifest: &ReleaseManifest,
        mut progress: F,
    ) -> Result<PathBuf, UpdateError>
    where
        F: FnMut(&DownloadProgress),
    {
        let cache_dir = self
            .config
            .cache_dir
            .as_deref()
            .ok_or_else(|| UpdateError::State("cache directory not configured".to_string()))?;
        std::fs::create_dir_all(cache_dir)?;

        let url = manifest.download_url();
        let temp_path = cache_dir.join(temp_file_name(&manifest.version));

        if let Err(e) = self.stream_to_file(url, &temp_path, manifest, &mut progress).await {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = verify_checksum(&temp_path, manifest) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        // Rename-within-the-cache keeps the path stable for the installer.
        let final_path = cache_dir.join(format!("windlass-{}", manifest.version));
        std::fs::rename(&temp_path, &final_path)?;
        info!("downloaded and verified {}", final_path.display());
        Ok(final_path)
    }

    async fn stream_to_file<F>(
        &self,
        url: &str,
        dest: &Path,
        manifest: &ReleaseManifest,
        progress: &mut F,
    ) -> Result<(), UpdateError>
    where
        F: FnMut(&DownloadProgress),
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Fetch(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Fetch(format!(
                "download server returned {}",
                status
            )));
        }

        let total = response.content_length().or(manifest.size);
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let started = Instant::now();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdateError::Fetch(format!("reading {}: {}", url, e)))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(&DownloadProgress::measure(
                downloaded,
                total,
                started.elapsed(),
            ));
        }

        file.flush().await?;
        Ok(())
    }

    /// Remove regular files in the cache older than seven days. A missing or
    /// unconfigured cache directory is a silent no-op.
    pub fn cleanup_old_downloads(&self) -> Result<(), UpdateError> {
        match self.config.cache_dir.as_deref() {
            Some(dir) if dir.exists() => cleanup_older_than(dir, MAX_CACHE_AGE),
            _ => Ok(()),
        }
    }
}

fn cleanup_older_than(cache_dir: &Path, max_age: Duration) -> Result<(), UpdateError> {
    for entry in std::fs::read_dir(cache_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let expired = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age >= max_age)
            .unwrap_or(false);
        if expired {
            debug!("removing stale download {}", entry.path().display());
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}

/// Unique name inside the cache dir; pid plus sub-second clock keeps
/// concurrent invocations of different processes apart.
fn temp_file_name(version: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!(".windlass-{}.{}.{}.partial", version, std::process::id(), nanos)
}

/// Digest the file with the manifest's algorithm and compare hex strings
/// case-insensitively. An empty expected checksum always fails: downloads
/// are never accepted unverified.
fn verify_checksum(path: &Path, manifest: &ReleaseManifest) -> Result<(), UpdateError> {
    let algorithm = manifest.algorithm()?;
    let computed = compute_digest(path, algorithm)?;
    let expected = manifest.checksum.trim();

    if expected.is_empty() {
        return Err(UpdateError::Checksum {
            expected: "(none declared)".to_string(),
            computed,
        });
    }
    if !computed.eq_ignore_ascii_case(expected) {
        return Err(UpdateError::Checksum {
            expected: expected.to_ascii_lowercase(),
            computed,
        });
    }
    debug!("checksum verified ({})", algorithm.as_str());
    Ok(())
}

fn compute_digest(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, UpdateError> {
    let data = std::fs::read(path)?;
    let digest = match algorithm {
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(&data);
            format!("{:x}", hasher.finalize())
        }
        ChecksumAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(&data);
            format!("{:x}", hasher.finalize())
        }
    };
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIST test vectors for the string "abc".
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const ABC_SHA512: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                              2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";

    fn manifest_with(checksum: &str, algo: &str) -> ReleaseManifest {
        serde_json::from_str(&format!(
            r#"{{"version": "1.0.0", "url": "http://example.com/bin",
                 "checksum": "{}", "checksum_algo": "{}"}}"#,
            checksum, algo
        ))
        .unwrap()
    }

    fn write_abc(dir: &Path) -> PathBuf {
        let path = dir.join("payload");
        std::fs::write(&path, b"abc").unwrap();
        path
    }

    #[test]
    fn sha256_digest_matches_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        assert_eq!(
            compute_digest(&path, ChecksumAlgorithm::Sha256).unwrap(),
            ABC_SHA256
        );
    }

    #[test]
    fn sha512_digest_matches_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        assert_eq!(
            compute_digest(&path, ChecksumAlgorithm::Sha512).unwrap(),
            ABC_SHA512
        );
    }

    #[test]
    fn checksum_comparison_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        let manifest = manifest_with(&ABC_SHA256.to_ascii_uppercase(), "sha256");
        verify_checksum(&path, &manifest).unwrap();
    }

    #[test]
    fn mismatch_names_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        let manifest = manifest_with(&"0".repeat(64), "sha256");
        match verify_checksum(&path, &manifest) {
            Err(UpdateError::Checksum { expected, computed }) => {
                assert_eq!(expected, "0".repeat(64));
                assert_eq!(computed, ABC_SHA256);
            }
            other => panic!("expected Checksum error, got {:?}", other),
        }
    }

    #[test]
    fn empty_checksum_never_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        let manifest = manifest_with("", "sha256");
        assert!(matches!(
            verify_checksum(&path, &manifest),
            Err(UpdateError::Checksum { .. })
        ));
    }

    #[test]
    fn unsupported_algorithm_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_abc(dir.path());
        let manifest = manifest_with(ABC_SHA256, "blake3");
        assert!(matches!(
            verify_checksum(&path, &manifest),
            Err(UpdateError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn progress_math() {
        let progress =
            DownloadProgress::measure(50, Some(200), Duration::from_secs(1));
        assert_eq!(progress.bytes_downloaded, 50);
        assert_eq!(progress.total_bytes, Some(200));
        assert_eq!(progress.percentage, Some(25.0));
        assert_eq!(progress.bytes_per_sec, 50.0);
        assert_eq!(progress.eta, Some(Duration::from_secs(3)));
    }

    #[test]
    fn progress_without_total_has_no_percentage() {
        let progress = DownloadProgress::measure(50, None, Duration::from_secs(1));
        assert_eq!(progress.percentage, None);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn cleanup_removes_files_but_not_directories() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("stale-download");
        std::fs::write(&stale, b"old").unwrap();
        let subdir = dir.path().join("keep-me");
        std::fs::create_dir(&subdir).unwrap();

        // Zero max age makes every file stale.
        cleanup_older_than(dir.path(), Duration::ZERO).unwrap();

        assert!(!stale.exists());
        assert!(subdir.exists());
    }

    #[test]
    fn cleanup_is_a_noop_without_a_cache_dir() {
        let config = UpdateConfig::new("1.0.0", "http://127.0.0.1:1/release.json");
        Downloader::new(config).cleanup_old_downloads().unwrap();

        let mut config = UpdateConfig::new("1.0.0", "http://127.0.0.1:1/release.json");
        config.cache_dir = Some(PathBuf::from("/nonexistent/windlass-cache"));
        Downloader::new(config).cleanup_old_downloads().unwrap();
    }

    #[test]
    fn temp_names_are_dotfiles_in_the_cache() {
        let name = temp_file_name("2.0.0");
        assert!(name.starts_with(".windlass-2.0.0."));
        assert!(name.ends_with(".partial"));
    }
}
