use crate::audio_reader::Id3MetadataProvider;
use crate::exif_reader::ExifMetadataProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata keys and values read from a media file. Empty when nothing usable was found.
pub type MetadataMap = BTreeMap<String, String>;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "heic", "webp"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Accepts the extension with or without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.');
        if IMAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
        {
            Some(Self::Image)
        } else if AUDIO_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
        {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// Reads naming metadata from a file.
///
/// Implementations must not fail: unreadable files, unsupported formats and
/// missing tags all produce an empty map.
pub trait MetadataProvider: Send + Sync {
    fn read(&self, path: &Path) -> MetadataMap;
}

pub struct MetadataProviders {
    image: Box<dyn MetadataProvider>,
    audio: Box<dyn MetadataProvider>,
}

impl MetadataProviders {
    pub fn new(image: Box<dyn MetadataProvider>, audio: Box<dyn MetadataProvider>) -> Self {
        Self { image, audio }
    }

    pub fn provider_for(&self, kind: MediaKind) -> &dyn MetadataProvider {
        match kind {
            MediaKind::Image => self.image.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
        }
    }

    pub fn read_for_extension(&self, path: &Path, extension: &str) -> MetadataMap {
        match MediaKind::from_extension(extension) {
            Some(kind) => self.provider_for(kind).read(path),
            None => MetadataMap::new(),
        }
    }
}

impl Default for MetadataProviders {
    fn default() -> Self {
        Self::new(
            Box::new(ExifMetadataProvider),
            Box::new(Id3MetadataProvider),
        )
    }
}
