//! Atomic executable replacement with backup and rollback.
//!
//! The backup copy is written before the swap begins; the swap's atomicity
//! is delegated to a same-directory filesystem rename. On any failure after
//! the backup exists, the original binary is restored. A rollback that
//! itself fails is the one unrecoverable condition; the backup path is
//! printed to stderr for manual recovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::UpdateError;

/// Platform-specific swap of a payload onto the target path.
///
/// Both strategies compile on every platform so each can be exercised in
/// tests; `Installer::with_target` picks the one matching the host.
pub trait ReplaceStrategy: Send + Sync {
    fn replace(&self, target: &Path, payload: &Path) -> Result<(), UpdateError>;
}

/// Copy the payload into the target's directory, then rename it onto the
/// target. Rename within one directory is atomic, so readers see the whole
/// old file or the whole new file, never a truncated mix.
pub struct PosixReplace;

impl ReplaceStrategy for PosixReplace {
    fn replace(&self, target: &Path, payload: &Path) -> Result<(), UpdateError> {
        let staging = with_suffix(target, ".new");
        fs::copy(payload, &staging)
            .map_err(|e| UpdateError::Install(format!("staging copy failed: {}", e)))?;
        if let Err(e) = fs::rename(&staging, target) {
            let _ = fs::remove_file(&staging);
            return Err(UpdateError::Install(format!(
                "rename onto {} failed: {}",
                target.display(),
                e
            )));
        }
        Ok(())
    }
}

/// A running executable on Windows cannot be overwritten in place. Rename
/// it aside to `<path>.old`, copy the payload into the vacant path, then
/// best-effort delete the parked file. The rename is reversed if the copy
/// fails.
pub struct WindowsReplace;

impl ReplaceStrategy for WindowsReplace {
    fn replace(&self, target: &Path, payload: &Path) -> Result<(), UpdateError> {
        let parked = with_suffix(target, ".old");
        fs::rename(target, &parked).map_err(|e| {
            UpdateError::Install(format!("parking {} failed: {}", target.display(), e))
        })?;
        if let Err(e) = fs::copy(payload, target) {
            let _ = fs::rename(&parked, target);
            return Err(UpdateError::Install(format!(
                "copy into {} failed: {}",
                target.display(),
                e
            )));
        }
        let _ = fs::remove_file(&parked);
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub struct Installer {
    target: PathBuf,
    strategy: Box<dyn ReplaceStrategy>,
}

impl Installer {
    /// Installer for the currently-running executable, symlinks resolved to
    /// the real file.
    pub fn for_current_exe() -> Result<Self, UpdateError> {
        let exe = std::env::current_exe()
            .map_err(|e| UpdateError::Install(format!("cannot locate current executable: {}", e)))?;
        let target = exe.canonicalize()?;
        Ok(Self::with_target(target))
    }

    /// Installer for an explicit target path.
    pub fn with_target(target: PathBuf) -> Self {
        let strategy: Box<dyn ReplaceStrategy> = if cfg!(windows) {
            Box::new(WindowsReplace)
        } else {
            Box::new(PosixReplace)
        };
        Self { target, strategy }
    }

    pub fn with_strategy(target: PathBuf, strategy: Box<dyn ReplaceStrategy>) -> Self {
        Self { target, strategy }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Probe write access to the target without modifying it, so permission
    /// problems surface before any download or swap.
    pub fn can_update(&self) -> Result<(), UpdateError> {
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.target)
            .map(drop)
            .map_err(|e| {
                UpdateError::Install(format!(
                    "no write access to {}: {}",
                    self.target.display(),
                    e
                ))
            })
    }

    /// Replace the target with `payload`, preserving the target's file mode.
    /// On failure the original binary is restored from its backup.
    pub fn install(&self, payload: &Path) -> Result<(), UpdateError> {
        let mode = fs::metadata(&self.target)?.permissions();

        let backup = with_suffix(&self.target, ".backup");
        fs::copy(&self.target, &backup)
            .map_err(|e| UpdateError::Install(format!("backup failed: {}", e)))?;
        debug!("backup written to {}", backup.display());

        match self.swap_and_verify(payload, mode) {
            Ok(()) => {
                let _ = fs::remove_file(&backup);
                info!("installed {} onto {}", payload.display(), self.target.display());
                Ok(())
            }
            Err(e) => {
                self.rollback(&backup);
                Err(e)
            }
        }
    }

    fn swap_and_verify(&self, payload: &Path, mode: fs::Permissions) -> Result<(), UpdateError> {
        fs::set_permissions(payload, mode).map_err(|e| {
            UpdateError::Install(format!("applying mode to payload failed: {}", e))
        })?;
        self.strategy.replace(&self.target, payload)?;
        self.verify_installed()
    }

    fn verify_installed(&self) -> Result<(), UpdateError> {
        let metadata = fs::metadata(&self.target)
            .map_err(|e| UpdateError::Install(format!("installed binary missing: {}", e)))?;
        if !metadata.is_file() {
            return Err(UpdateError::Install(format!(
                "{} is not a regular file",
                self.target.display()
            )));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(UpdateError::Install(format!(
                    "{} has no executable bits",
                    self.target.display()
                )));
            }
        }

        // Soft check only: not every binary implements a version flag.
        match Command::new(&self.target)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => debug!("new binary answers --version"),
            Ok(status) => warn!("new binary exited {} on --version", status),
            Err(e) => warn!("could not run new binary for version check: {}", e),
        }
        Ok(())
    }

    fn rollback(&self, backup: &Path) {
        warn!("install failed, restoring {}", self.target.display());
        let _ = fs::remove_file(&self.target);
        if let Err(e) = fs::rename(backup, &self.target) {
            eprintln!(
                "windlass: rollback failed ({}); previous binary preserved at {}",
                e,
                backup.display()
            );
        }
    }

    /// Swap, then hand control to the just-installed binary: spawn it with
    /// the given arguments and the current process's standard streams, and
    /// exit. Does not return on success.
    pub fn install_and_restart(&self, payload: &Path, args: &[String]) -> Result<(), UpdateError> {
        self.install(payload)?;

        let child = Command::new(&self.target)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                UpdateError::Install(format!(
                    "failed to start {}: {}",
                    self.target.display(),
                    e
                ))
            })?;

        info!("restarted as pid {}", child.id());
        std::process::exit(0);
    }
}
