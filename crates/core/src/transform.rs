use crate::metadata::MetadataMap;
use crate::sanitize::{normalize_timestamp, sanitize_filename};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Timestamp keys in priority order.
pub const TIMESTAMP_KEYS: &[&str] = &["DateTimeOriginal", "DateTimeDigitized", "DateTime"];
pub const ARTIST_KEY: &str = "artist";
pub const TITLE_KEY: &str = "title";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NamingSource {
    Pattern,
    CaptureTimestamp,
    ArtistTitle,
}

/// Computes the new base name (without extension) of a file.
///
/// Rules are applied in order and the last applicable one wins:
/// 1. every match of `pattern` is removed from `old_base_name`;
/// 2. a capture timestamp in `metadata` replaces the name;
/// 3. `artist` and `title` in `metadata` replace the name with `"{artist} - {title}"`.
///
/// Metadata names replace the pattern result instead of being combined with it.
pub fn compute_new_base_name(
    old_base_name: &str,
    pattern: Option<&Regex>,
    metadata: &MetadataMap,
) -> String {
    resolve_base_name(old_base_name, pattern, metadata).0
}

/// Same as [`compute_new_base_name`], also reporting which rule produced the name.
pub fn resolve_base_name(
    old_base_name: &str,
    pattern: Option<&Regex>,
    metadata: &MetadataMap,
) -> (String, NamingSource) {
    let mut name = match pattern {
        Some(regex) => regex.replace_all(old_base_name, "").into_owned(),
        None => old_base_name.to_string(),
    };
    let mut source = NamingSource::Pattern;

    if let Some(timestamp) = TIMESTAMP_KEYS
        .iter()
        .find_map(|key| non_empty(metadata, key))
    {
        name = normalize_timestamp(timestamp);
        source = NamingSource::CaptureTimestamp;
    }

    if let (Some(artist), Some(title)) = (
        non_empty(metadata, ARTIST_KEY),
        non_empty(metadata, TITLE_KEY),
    ) {
        name = format!("{artist} - {title}");
        source = NamingSource::ArtistTitle;
    }

    (sanitize_filename(&name), source)
}

fn non_empty<'a>(metadata: &'a MetadataMap, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}
