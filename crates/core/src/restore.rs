use crate::apply::{backup_path_for, FailedEntry};
use crate::error::{EngineError, FailureKind, FailureReason, RestoreError};
use crate::fs_ops::{move_no_clobber, same_path_ignoring_case, FileSystem};
use crate::log_store::RenameLogStore;
use crate::planner::RenameEntry;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RestoreResult {
    pub restored: Vec<RenameEntry>,
    pub failed: Vec<FailedEntry>,
    /// Failed entries written back to the log so they can be retried.
    pub retained_log_entries: usize,
}

impl RestoreResult {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Reverses the last rename run recorded in `store`.
///
/// Entries are processed in log order and a failing entry never stops the
/// others. Afterwards the log holds only the entries that can still be
/// retried, or is removed when there are none.
pub fn restore_from_log(
    store: &RenameLogStore,
    fs: &dyn FileSystem,
) -> Result<RestoreResult, RestoreError> {
    let _lock = store
        .lock()
        .map_err(|err| match err.downcast::<EngineError>() {
            Ok(busy) => RestoreError::Busy(busy),
            Err(other) => RestoreError::Io(other),
        })?;
    let entries = store.load()?;

    let mut result = RestoreResult::default();
    for entry in entries {
        match restore_entry(fs, &entry) {
            Ok(()) => result.restored.push(entry),
            Err(reason) => {
                warn!(
                    "{} を元に戻せませんでした: {reason}",
                    entry.destination_path.display()
                );
                result.failed.push(FailedEntry { entry, reason });
            }
        }
    }

    // A cleanup failure already has its original back and its backup consumed.
    let retained: Vec<RenameEntry> = result
        .failed
        .iter()
        .filter(|failed| failed.reason.kind != FailureKind::CleanupError)
        .map(|failed| failed.entry.clone())
        .collect();
    if retained.is_empty() {
        store.clear()?;
    } else {
        store.save(&retained)?;
    }
    result.retained_log_entries = retained.len();

    info!(
        "取り消し完了: 復元 {}件, 失敗 {}件",
        result.restored.len(),
        result.failed.len()
    );
    Ok(result)
}

fn restore_entry(fs: &dyn FileSystem, entry: &RenameEntry) -> Result<(), FailureReason> {
    let source = &entry.source_path;
    let destination = &entry.destination_path;
    let backup = backup_path_for(source);

    if !fs.exists(&backup) {
        return Err(FailureReason::new(
            FailureKind::MissingBackupError,
            format!("バックアップが見つかりません: {}", backup.display()),
        ));
    }

    let move_back_failed = |err: std::io::Error| {
        FailureReason::new(
            FailureKind::MoveError,
            format!(
                "バックアップを戻せませんでした: {} -> {}: {err}",
                backup.display(),
                source.display()
            ),
        )
    };

    // On a case-insensitive filesystem a case-only rename shares one directory
    // entry with its source, so the renamed file has to go first.
    if same_path_ignoring_case(source, destination) {
        if fs.exists(destination) {
            fs.remove_file(destination).map_err(move_back_failed)?;
        }
        return fs.rename(&backup, source).map_err(move_back_failed);
    }

    if fs.exists(source) {
        return Err(FailureReason::new(
            FailureKind::SourceOccupiedError,
            format!("元のファイル名が既に使われています: {}", source.display()),
        ));
    }

    move_no_clobber(fs, &backup, source).map_err(move_back_failed)?;

    if fs.exists(destination) {
        fs.remove_file(destination).map_err(|err| {
            FailureReason::new(
                FailureKind::CleanupError,
                format!(
                    "リネーム後のファイルを削除できませんでした: {}: {err}",
                    destination.display()
                ),
            )
        })?;
    }
    Ok(())
}
