use crate::error::{FailureKind, FailureReason};
use crate::fs_ops::{move_no_clobber, FileSystem};
use crate::log_store::RenameLogStore;
use crate::planner::{RenameEntry, RenamePlan};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Appended to the full original path to name its backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedEntry {
    pub entry: RenameEntry,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionResult {
    pub succeeded: Vec<RenameEntry>,
    pub failed: Vec<FailedEntry>,
    pub unchanged: usize,
    pub cancelled: usize,
    /// Entries of an unrestored previous log that this run replaced.
    pub overwritten_log_entries: usize,
    pub preview: bool,
}

impl ExecutionResult {
    /// Dry-run result: the planned renames reported as if they had succeeded.
    pub fn preview_of(plan: &RenamePlan) -> Self {
        let succeeded: Vec<RenameEntry> = plan.changed_entries().cloned().collect();
        Self {
            unchanged: plan.entries.len() - succeeded.len(),
            succeeded,
            preview: true,
            ..Self::default()
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub fn backup_path_for(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

pub fn apply_plan(
    plan: &RenamePlan,
    fs: &dyn FileSystem,
    store: &RenameLogStore,
) -> Result<ExecutionResult> {
    apply_plan_with_cancel(plan, fs, store, || false)
}

/// Executes the changed entries of `plan` in order.
///
/// Each entry is copied to its backup before it is moved. Per-entry failures
/// are recorded and the batch continues. `is_cancelled` is polled before each
/// entry's backup step. The log is rewritten after every successful move,
/// so a run that moves nothing leaves the previous log in place.
pub fn apply_plan_with_cancel<F>(
    plan: &RenamePlan,
    fs: &dyn FileSystem,
    store: &RenameLogStore,
    is_cancelled: F,
) -> Result<ExecutionResult>
where
    F: Fn() -> bool,
{
    let candidates: Vec<&RenameEntry> = plan.changed_entries().collect();
    let mut result = ExecutionResult {
        unchanged: plan.entries.len() - candidates.len(),
        ..ExecutionResult::default()
    };
    if candidates.is_empty() {
        return Ok(result);
    }

    let _lock = store.lock()?;

    let pending = store.pending_entries();

    for (index, entry) in candidates.iter().enumerate() {
        if is_cancelled() {
            result.cancelled = candidates.len() - index;
            info!("キャンセルされました: 残り{}件は未処理です", result.cancelled);
            break;
        }

        match apply_entry(fs, entry) {
            Ok(()) => {
                if result.succeeded.is_empty() && pending > 0 {
                    warn!(
                        "取り消されていない前回のリネームログ({}件)を上書きします: {}",
                        pending,
                        store.log_path().display()
                    );
                    result.overwritten_log_entries = pending;
                }
                result.succeeded.push((*entry).clone());
                store
                    .save(&result.succeeded)
                    .context("リネーム途中でログを保存できませんでした")?;
            }
            Err(reason) => {
                warn!("{} をスキップしました: {reason}", entry.source_path.display());
                result.failed.push(FailedEntry {
                    entry: (*entry).clone(),
                    reason,
                });
            }
        }
    }

    info!(
        "適用完了: 成功 {}件, 失敗 {}件, 変更なし {}件",
        result.succeeded.len(),
        result.failed.len(),
        result.unchanged
    );
    Ok(result)
}

fn apply_entry(fs: &dyn FileSystem, entry: &RenameEntry) -> Result<(), FailureReason> {
    let backup = backup_path_for(&entry.source_path);
    // whatever already sits at the backup name belongs to the user
    if fs.exists(&backup) {
        return Err(FailureReason::new(
            FailureKind::BackupError,
            format!("バックアップ先に既にファイルがあります: {}", backup.display()),
        ));
    }

    if let Err(err) = fs.copy(&entry.source_path, &backup) {
        return Err(FailureReason::new(
            FailureKind::BackupError,
            format!(
                "バックアップに失敗しました: {} -> {}: {err}",
                entry.source_path.display(),
                backup.display()
            ),
        ));
    }

    move_no_clobber(fs, &entry.source_path, &entry.destination_path).map_err(|err| {
        FailureReason::new(
            FailureKind::MoveError,
            format!(
                "リネームに失敗しました: {} -> {}: {err}",
                entry.source_path.display(),
                entry.destination_path.display()
            ),
        )
    })
}
