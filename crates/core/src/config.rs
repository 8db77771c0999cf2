use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "rename-log.json";
pub const LOCK_FILE_NAME: &str = "rename.lock";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Defaults applied when the caller leaves a parameter out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub default_extensions: String,
    pub default_new_extension: String,
    pub default_pattern: Option<String>,
    pub use_metadata_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_extensions: String::new(),
            default_new_extension: ".txt".to_string(),
            default_pattern: None,
            use_metadata_default: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
}

impl AppPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            log_path: config_dir.join(LOG_FILE_NAME),
            lock_path: config_dir.join(LOCK_FILE_NAME),
            config_dir,
        }
    }
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "file-renamer", "file-renamer")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    Ok(AppPaths::in_dir(proj.config_dir()))
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?)
}

pub fn load_config_from(paths: &AppPaths) -> Result<AppConfig> {
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&paths.config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            paths.config_path.display()
        )
    })?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&app_paths()?, config)
}

pub fn save_config_to(paths: &AppPaths, config: &AppConfig) -> Result<()> {
    ensure_dir(&paths.config_dir)?;
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(&paths.config_path, body).with_context(|| {
        format!(
            "設定ファイルを書き込めませんでした: {}",
            paths.config_path.display()
        )
    })?;
    Ok(())
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("設定ディレクトリを作成できませんでした: {}", dir.display()))
}
