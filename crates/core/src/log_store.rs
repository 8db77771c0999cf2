use crate::config::{ensure_dir, AppPaths};
use crate::error::{EngineError, RestoreError};
use crate::planner::RenameEntry;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// The persisted record of the last rename run: a JSON array of
/// `[source, destination]` pairs at a fixed path.
#[derive(Debug, Clone)]
pub struct RenameLogStore {
    log_path: PathBuf,
    lock_path: PathBuf,
}

impl RenameLogStore {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            log_path: paths.log_path.clone(),
            lock_path: paths.lock_path.clone(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn load(&self) -> Result<Vec<RenameEntry>, RestoreError> {
        let raw = match fs::read_to_string(&self.log_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RestoreError::NoLog(self.log_path.clone()));
            }
            Err(err) => {
                return Err(RestoreError::Io(anyhow::Error::from(err).context(format!(
                    "リネームログを読めませんでした: {}",
                    self.log_path.display()
                ))));
            }
        };
        serde_json::from_str::<Vec<RenameEntry>>(&raw).map_err(|source| {
            RestoreError::MalformedLog {
                path: self.log_path.clone(),
                source,
            }
        })
    }

    /// Number of entries in the current log, 0 when there is none.
    pub fn pending_entries(&self) -> usize {
        match self.load() {
            Ok(entries) => entries.len(),
            Err(err) if err.is_no_log() => {
                if matches!(err, RestoreError::MalformedLog { .. }) {
                    warn!("{err}");
                }
                0
            }
            Err(err) => {
                warn!("{err:#}");
                0
            }
        }
    }

    /// Replaces the whole log through a temp file and rename.
    pub fn save(&self, entries: &[RenameEntry]) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            ensure_dir(parent)?;
        }
        let body = serde_json::to_string_pretty(entries)
            .context("リネームログのシリアライズに失敗しました")?;
        let temp = self.log_path.with_extension("json.tmp");
        fs::write(&temp, body).with_context(|| {
            format!("リネームログ書き込みに失敗しました: {}", temp.display())
        })?;
        if let Err(err) = fs::rename(&temp, &self.log_path) {
            let _ = fs::remove_file(&temp);
            return Err(anyhow::Error::from(err).context(format!(
                "リネームログ置換に失敗しました: {}",
                self.log_path.display()
            )));
        }
        debug!(
            "リネームログを保存しました: {} ({}件)",
            self.log_path.display(),
            entries.len()
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.log_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow::Error::from(err).context(format!(
                "リネームログ削除に失敗しました: {}",
                self.log_path.display()
            ))),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Takes the advisory lock shared by every mutating operation.
    ///
    /// A lock left behind by a process that no longer runs is reclaimed.
    pub fn lock(&self) -> Result<EngineLock> {
        if let Some(parent) = self.lock_path.parent() {
            ensure_dir(parent)?;
        }
        if let Some(lock) = self.try_lock()? {
            return Ok(lock);
        }
        if let Some(pid) = self.stale_lock_owner() {
            warn!(
                "終了済みのプロセス({pid})が残したロックを解除します: {}",
                self.lock_path.display()
            );
            self.unlock()?;
            if let Some(lock) = self.try_lock()? {
                return Ok(lock);
            }
        }
        Err(EngineError::EngineBusy(self.lock_path.clone()).into())
    }

    /// Removes the lock file whoever holds it. Returns whether one existed.
    pub fn unlock(&self) -> Result<bool> {
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(anyhow::Error::from(err).context(format!(
                "ロックファイルを削除できませんでした: {}",
                self.lock_path.display()
            ))),
        }
    }

    fn try_lock(&self) -> Result<Option<EngineLock>> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => {
                return Err(anyhow::Error::from(err).context(format!(
                    "ロックファイルを作成できませんでした: {}",
                    self.lock_path.display()
                )));
            }
        };
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Some(EngineLock {
            path: self.lock_path.clone(),
        }))
    }

    /// PID recorded in the lock file when that process is known to be gone.
    /// An unreadable or empty lock file is treated as held.
    fn stale_lock_owner(&self) -> Option<u32> {
        let raw = fs::read_to_string(&self.lock_path).ok()?;
        let pid = raw.trim().parse::<u32>().ok()?;
        (!process_is_alive(pid)).then_some(pid)
    }
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// No portable liveness check without extra dependencies; `unlock` covers it.
#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

/// Removes the lock file when dropped.
#[derive(Debug)]
pub struct EngineLock {
    path: PathBuf,
}

impl Drop for EngineLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(
                "ロックファイルを削除できませんでした: {}: {err}",
                self.path.display()
            );
        }
    }
}
