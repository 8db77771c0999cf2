use crate::metadata::{MetadataMap, MetadataProvider};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

const DATE_TAGS: &[(Tag, &str)] = &[
    (Tag::DateTimeOriginal, "DateTimeOriginal"),
    (Tag::DateTimeDigitized, "DateTimeDigitized"),
    (Tag::DateTime, "DateTime"),
];

const TEXT_TAGS: &[(Tag, &str)] = &[(Tag::Make, "Make"), (Tag::Model, "Model")];

/// Image capture metadata through `kamadak-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataProvider;

impl MetadataProvider for ExifMetadataProvider {
    fn read(&self, path: &Path) -> MetadataMap {
        match read_exif_metadata(path) {
            Ok(values) => values,
            Err(err) => {
                debug!("EXIFなしとして扱います: {err:#}");
                MetadataMap::new()
            }
        }
    }
}

pub fn read_exif_metadata(path: &Path) -> Result<MetadataMap> {
    let file = File::open(path)
        .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;

    let mut values = MetadataMap::new();
    for (tag, key) in DATE_TAGS {
        let date = exif
            .get_field(*tag, In::PRIMARY)
            .map(|field| ascii_value(&exif, field))
            .and_then(|raw| parse_date(&raw));
        if let Some(date) = date {
            values.insert(key.to_string(), date.format(EXIF_DATE_FORMAT).to_string());
        }
    }
    for (tag, key) in TEXT_TAGS {
        let text = exif
            .get_field(*tag, In::PRIMARY)
            .map(|field| ascii_value(&exif, field))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(text) = text {
            values.insert(key.to_string(), text);
        }
    }

    Ok(values)
}

// display_value() quotes ASCII values, so read the raw bytes when possible.
fn ascii_value(exif: &Exif, field: &Field) -> String {
    match &field.value {
        Value::Ascii(parts) if !parts.is_empty() => {
            String::from_utf8_lossy(&parts[0]).trim_end_matches('\0').to_string()
        }
        _ => field.display_value().with_unit(exif).to_string(),
    }
}

fn parse_date(input: &str) -> Option<NaiveDateTime> {
    let normalized = input.trim();

    let candidates = [
        EXIF_DATE_FORMAT,
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(normalized, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::{parse_date, ExifMetadataProvider, EXIF_DATE_FORMAT};
    use crate::metadata::MetadataProvider;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parse_date_accepts_exif_and_iso_forms() {
        let exif = parse_date("2023:01:02 10:11:12").expect("exif form");
        let iso = parse_date("2023-01-02T10:11:12").expect("iso form");
        assert_eq!(exif, iso);
        assert_eq!(exif.format(EXIF_DATE_FORMAT).to_string(), "2023:01:02 10:11:12");
    }

    #[test]
    fn parse_date_rejects_placeholder_dates() {
        assert!(parse_date("0000:00:00 00:00:00").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn unreadable_images_yield_empty_metadata() {
        let temp = tempdir().expect("tempdir");
        let fake = temp.path().join("broken.jpg");
        fs::write(&fake, b"not a jpeg").expect("write fake");

        assert!(ExifMetadataProvider.read(&fake).is_empty());
        assert!(ExifMetadataProvider
            .read(&temp.path().join("missing.jpg"))
            .is_empty());
    }
}
