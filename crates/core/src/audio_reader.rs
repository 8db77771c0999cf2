use crate::metadata::{MetadataMap, MetadataProvider};
use anyhow::{Context, Result};
use id3::{Tag, TagLike};
use log::debug;
use std::path::Path;

/// Audio artist/title tags through the `id3` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3MetadataProvider;

impl MetadataProvider for Id3MetadataProvider {
    fn read(&self, path: &Path) -> MetadataMap {
        match read_id3_metadata(path) {
            Ok(values) => values,
            Err(err) => {
                debug!("タグなしとして扱います: {err:#}");
                MetadataMap::new()
            }
        }
    }
}

pub fn read_id3_metadata(path: &Path) -> Result<MetadataMap> {
    let tag = Tag::read_from_path(path)
        .with_context(|| format!("ID3タグを読めませんでした: {}", path.display()))?;

    let mut values = MetadataMap::new();
    for (key, value) in [
        ("artist", tag.artist()),
        ("title", tag.title()),
        ("album", tag.album()),
    ] {
        if let Some(value) = normalize(value) {
            values.insert(key.to_string(), value);
        }
    }
    Ok(values)
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{normalize, Id3MetadataProvider};
    use crate::metadata::MetadataProvider;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn files_without_tags_yield_empty_metadata() {
        let temp = tempdir().expect("tempdir");
        let untagged = temp.path().join("silence.mp3");
        fs::write(&untagged, [0u8; 64]).expect("write mp3");

        assert!(Id3MetadataProvider.read(&untagged).is_empty());
        assert!(Id3MetadataProvider
            .read(&temp.path().join("missing.mp3"))
            .is_empty());
    }

    #[test]
    fn normalize_drops_blank_frames() {
        assert_eq!(normalize(Some("  Artist \0")), Some("Artist".to_string()));
        assert_eq!(normalize(Some(" \0 ")), None);
        assert_eq!(normalize(None), None);
    }
}
