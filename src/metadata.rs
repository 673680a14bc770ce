//! Image metadata extraction.
//!
//! Produces the `metadata.json` document for an upload: the exact pixel
//! dimensions of the decoded original plus every readable EXIF field.
//!
//! ## Sources
//!
//! - **Dimensions** come from the decoded raster, not from container headers,
//!   so they describe exactly what the renderer starts from.
//! - **EXIF** comes from the block the codec captured out of the container
//!   at decode time. Renditions are re-encoded without it, which is why the
//!   extraction reads the decoded source and never a rendition.
//!
//! ## Tag selection
//!
//! All fields of the primary image are emitted; kamadak-exif folds the EXIF
//! and GPS sub-IFDs into it. Thumbnail-IFD fields describe the embedded
//! preview, not the photo, and are skipped. Keys are tag names (`Make`,
//! `DateTimeOriginal`, …); tags the reader does not know keep its
//! `Tag(Context, number)` rendering so they stay unique.
//!
//! ## Values
//!
//! ASCII values are emitted as plain text with trailing NULs and padding
//! removed. Every other value uses kamadak-exif's human-readable rendering
//! with units, e.g. `"1/125 s"` or `"f/2.8"`.

use crate::imaging::DecodedImage;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Contents of `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    #[serde(rename = "width")]
    pub original_width: u32,
    #[serde(rename = "height")]
    pub original_height: u32,
    /// Tag name → display value, sorted by tag name.
    pub exif: BTreeMap<String, String>,
}

impl ImageMetadata {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Read dimensions and EXIF tags from a decoded image. Never fails: an image
/// without EXIF yields an empty map.
pub fn extract_metadata(decoded: &DecodedImage) -> ImageMetadata {
    ImageMetadata {
        original_width: decoded.width(),
        original_height: decoded.height(),
        exif: decoded.exif.as_deref().map(read_tags).unwrap_or_default(),
    }
}

fn read_tags(raw: &[u8]) -> BTreeMap<String, String> {
    match exif::Reader::new().read_raw(raw.to_vec()) {
        Ok(exif) => exif_tags(&exif),
        Err(e) => {
            debug!(error = %e, "ignoring unreadable EXIF block");
            BTreeMap::new()
        }
    }
}

fn exif_tags(exif: &exif::Exif) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for field in exif.fields() {
        if field.ifd_num != exif::In::PRIMARY {
            continue;
        }
        // First occurrence wins if a tag repeats.
        tags.entry(field.tag.to_string())
            .or_insert_with(|| field_value(field, exif));
    }
    tags
}

fn field_value(field: &exif::Field, exif: &exif::Exif) -> String {
    match &field.value {
        exif::Value::Ascii(parts) => parts
            .iter()
            .map(|part| {
                String::from_utf8_lossy(part)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => field.display_value().with_unit(exif).to_string(),
    }
}
