use crate::apply::BACKUP_SUFFIX;
use crate::error::ConfigError;
use crate::fs_ops::same_path_ignoring_case;
use crate::metadata::{MediaKind, MetadataMap, MetadataProviders};
use crate::transform::{resolve_base_name, NamingSource};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub target_directory: PathBuf,
    /// Extensions with the leading dot, lowercase. Empty matches every file.
    pub old_extensions: BTreeSet<String>,
    pub new_extension: String,
    pub regex_pattern: Option<String>,
    pub use_metadata: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::new(),
            old_extensions: BTreeSet::new(),
            new_extension: ".txt".to_string(),
            regex_pattern: None,
            use_metadata: false,
        }
    }
}

/// One rename, persisted in the log as a `[source, destination]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(PathBuf, PathBuf)", into = "(PathBuf, PathBuf)")]
pub struct RenameEntry {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl RenameEntry {
    pub fn new(source_path: PathBuf, destination_path: PathBuf) -> Self {
        Self {
            source_path,
            destination_path,
        }
    }
}

impl From<(PathBuf, PathBuf)> for RenameEntry {
    fn from((source_path, destination_path): (PathBuf, PathBuf)) -> Self {
        Self::new(source_path, destination_path)
    }
}

impl From<RenameEntry> for (PathBuf, PathBuf) {
    fn from(entry: RenameEntry) -> Self {
        (entry.source_path, entry.destination_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedRename {
    pub entry: RenameEntry,
    pub naming: NamingSource,
    pub media_kind: Option<MediaKind>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub matched_files: usize,
    pub skipped_extension: usize,
    pub skipped_backups: usize,
    /// Names that are not valid UTF-8 cannot be transformed without loss.
    pub skipped_non_utf8: usize,
    pub metadata_named: usize,
    pub disambiguated: usize,
    pub planned: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub entries: Vec<PlannedRename>,
    pub stats: RenameStats,
}

impl RenamePlan {
    /// The `(old, new)` pairs in plan order, for display.
    pub fn preview_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|planned| {
                (
                    planned.entry.source_path.display().to_string(),
                    planned.entry.destination_path.display().to_string(),
                )
            })
            .collect()
    }

    pub fn changed_entries(&self) -> impl Iterator<Item = &RenameEntry> {
        self.entries
            .iter()
            .filter(|planned| planned.changed)
            .map(|planned| &planned.entry)
    }
}

/// Parses a comma separated list such as `".jpg, .PNG"`. An empty list matches all files.
pub fn parse_extension_list(input: &str) -> Result<BTreeSet<String>, ConfigError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(normalize_extension)
        .collect()
}

fn normalize_extension(ext: &str) -> Result<String, ConfigError> {
    if ext.len() < 2 || !ext.starts_with('.') || ext.contains(['/', '\\']) {
        return Err(ConfigError::InvalidExtension(ext.to_string()));
    }
    Ok(ext.to_lowercase())
}

pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    match pattern.filter(|p| !p.is_empty()) {
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Checks everything that can be checked without touching the filesystem.
pub fn validate_options(options: &PlanOptions) -> Result<Option<Regex>, ConfigError> {
    let pattern = compile_pattern(options.regex_pattern.as_deref())?;
    normalize_extension(&options.new_extension)?;
    for ext in &options.old_extensions {
        normalize_extension(ext)?;
    }
    Ok(pattern)
}

pub fn generate_plan(options: &PlanOptions, providers: &MetadataProviders) -> Result<RenamePlan> {
    let pattern = validate_options(options)?;

    let target = &options.target_directory;
    if !target.exists() {
        return Err(ConfigError::MissingDirectory(target.clone()).into());
    }
    if !target.is_dir() {
        return Err(ConfigError::NotADirectory(target.clone()).into());
    }
    let root = fs::canonicalize(target)
        .with_context(|| format!("対象フォルダを解決できませんでした: {}", target.display()))?;

    let mut stats = RenameStats::default();
    let files = collect_matching_files(&root, &options.old_extensions, &mut stats)?;

    let metadata: Vec<MetadataMap> = if options.use_metadata {
        files
            .par_iter()
            .map(|(path, ext)| providers.read_for_extension(path, ext))
            .collect()
    } else {
        vec![MetadataMap::new(); files.len()]
    };

    let mut entries = Vec::with_capacity(files.len());
    let mut claimed = HashSet::<String>::new();

    for ((path, ext), metadata) in files.into_iter().zip(metadata) {
        let stem = path
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or_default();
        let (base, naming) = resolve_base_name(stem, pattern.as_ref(), &metadata);
        if naming != NamingSource::Pattern {
            stats.metadata_named += 1;
        }

        let target = resolve_collision(
            &path,
            &base,
            &options.new_extension,
            &mut claimed,
            &mut stats,
        )?;

        let changed = target != path;
        if !changed {
            stats.unchanged += 1;
        }
        stats.planned += 1;
        debug!("計画: {} -> {}", path.display(), target.display());

        entries.push(PlannedRename {
            entry: RenameEntry::new(path, target),
            naming,
            media_kind: MediaKind::from_extension(&ext),
            changed,
        });
    }

    info!(
        "リネーム計画: {}件 (変更なし {}件, 連番付与 {}件)",
        stats.planned, stats.unchanged, stats.disambiguated
    );

    Ok(RenamePlan {
        root,
        entries,
        stats,
    })
}

/// Files under `root` whose extension is selected, in path order, with their dotted extension.
fn collect_matching_files(
    root: &Path,
    extensions: &BTreeSet<String>,
    stats: &mut RenameStats,
) -> Result<Vec<(PathBuf, String)>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        stats.scanned_files += 1;

        let path = entry.path();
        if path.file_name().and_then(|name| name.to_str()).is_none() {
            warn!("UTF-8でないファイル名はスキップします: {}", path.display());
            stats.skipped_non_utf8 += 1;
            continue;
        }
        if is_backup_file(path) {
            stats.skipped_backups += 1;
            continue;
        }

        let ext = dotted_extension(path);
        if extensions.is_empty() || extensions.contains(&ext.to_lowercase()) {
            stats.matched_files += 1;
            out.push((path.to_path_buf(), ext));
        } else {
            stats.skipped_extension += 1;
        }
    }

    out.sort();
    Ok(out)
}

fn resolve_collision(
    original_path: &Path,
    base: &str,
    extension: &str,
    claimed: &mut HashSet<String>,
    stats: &mut RenameStats,
) -> Result<PathBuf> {
    let parent = original_path
        .parent()
        .context("親ディレクトリを取得できませんでした")?;

    let mut candidate = parent.join(format!("{}{}", base, extension));
    if is_available(&candidate, original_path, claimed) {
        claimed.insert(claim_key(&candidate));
        return Ok(candidate);
    }

    stats.disambiguated += 1;
    let mut n = 1usize;
    loop {
        candidate = parent.join(format!("{}_{:03}{}", base, n, extension));
        if is_available(&candidate, original_path, claimed) {
            claimed.insert(claim_key(&candidate));
            return Ok(candidate);
        }
        n += 1;
    }
}

fn is_available(candidate: &Path, original_path: &Path, claimed: &HashSet<String>) -> bool {
    if candidate == original_path {
        return true;
    }
    if claimed.contains(&claim_key(candidate)) {
        return false;
    }
    if same_path_ignoring_case(candidate, original_path) {
        return true;
    }
    fs::symlink_metadata(candidate).is_err()
}

// Destinations are compared case-insensitively so that a plan stays valid on
// case-insensitive filesystems.
fn claim_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|v| format!(".{}", v.to_string_lossy()))
        .unwrap_or_default()
}

pub(crate) fn is_backup_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_lowercase()
                .ends_with(BACKUP_SUFFIX)
        })
        .unwrap_or(false)
}
