use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use image::RgbaImage;

/// Timestamp layout used by the feed for every item.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub image_id: String,
    /// Timestamp exactly as the feed reported it.
    pub timestamp: String,
    pub captured_at: NaiveDateTime,
}

impl CatalogItem {
    pub fn parse(timestamp: &str, image_id: impl Into<String>) -> Result<Self, chrono::ParseError> {
        let captured_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)?;
        Ok(Self {
            image_id: image_id.into(),
            timestamp: timestamp.to_string(),
            captured_at,
        })
    }

    /// Archive location of the full-size JPEG for this item.
    pub fn source_url(&self, archive_base: &str) -> String {
        let date = self.captured_at.date();
        format!(
            "{}/{:04}/{:02}/{:02}/jpg/{}.jpg",
            archive_base.trim_end_matches('/'),
            date.year(),
            date.month(),
            date.day(),
            self.image_id
        )
    }
}

/// Ordered feed contents, fingerprinted by the newest item's timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    items: Vec<CatalogItem>,
}

impl CatalogSnapshot {
    /// Returns `None` for an empty catalog; a snapshot always has an identifier.
    pub fn new(items: Vec<CatalogItem>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    pub fn identifier(&self) -> &str {
        &self.items[0].timestamp
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A materialized image: where it lives on disk and its decoded pixels.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub path: PathBuf,
    pub image: Arc<RgbaImage>,
}

/// Display-ready images indexed 0..N-1, always replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    frames: Vec<CachedImage>,
}

impl ImageSet {
    pub fn new(frames: Vec<CachedImage>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CachedImage> {
        self.frames.get(index)
    }
}
