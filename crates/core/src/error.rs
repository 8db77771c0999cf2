use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("対象フォルダが存在しません: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("対象パスがフォルダではありません: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("拡張子は '.' で始めてください: {0}")]
    InvalidExtension(String),
    #[error("正規表現が不正です: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("取り消し可能な履歴がありません: {}", .0.display())]
    NoLog(PathBuf),
    #[error("リネームログが壊れています: {}", .path.display())]
    MalformedLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Busy(#[from] EngineError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl RestoreError {
    /// Absent and unreadable logs are both "nothing to restore" for the caller.
    pub fn is_no_log(&self) -> bool {
        matches!(self, Self::NoLog(_) | Self::MalformedLog { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("別のリネーム処理が実行中です (ロック: {})", .0.display())]
    EngineBusy(PathBuf),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureKind {
    BackupError,
    MoveError,
    MissingBackupError,
    SourceOccupiedError,
    CleanupError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
