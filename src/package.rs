//! Result archive assembly.
//!
//! Bundles the three renditions and `metadata.json` into one ZIP:
//!
//! ```text
//! thumb_256.<ext>
//! medium_1024.<ext>
//! optimized.<ext>
//! metadata.json
//! ```
//!
//! The archive is deterministic: entries are written in the order above with
//! a fixed timestamp (1980-01-01, the ZIP epoch), so identical renditions
//! always produce identical bytes. Images are stored as-is since they are
//! already compressed; `metadata.json` is deflated.

use crate::imaging::{Rendition, RenditionKind};
use crate::metadata::ImageMetadata;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const METADATA_ENTRY: &str = "metadata.json";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

const ENTRY_COUNT: usize = RenditionKind::ALL.len() + 1;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid archive layout: {0}")]
    Layout(String),
}

/// One named member of the result archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The four entries of a result, in archive order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultArchive {
    entries: Vec<ArchiveEntry>,
}

impl ResultArchive {
    /// Assemble and check the archive layout.
    ///
    /// Requires exactly one rendition of each kind. Renditions are reordered
    /// into thumb, medium, optimized regardless of input order.
    pub fn assemble(
        renditions: &[Rendition],
        metadata: &ImageMetadata,
    ) -> Result<Self, PackageError> {
        let mut entries = Vec::with_capacity(ENTRY_COUNT);
        for kind in RenditionKind::ALL {
            let mut matching = renditions.iter().filter(|r| r.kind == kind);
            let rendition = matching
                .next()
                .ok_or_else(|| PackageError::Layout(format!("missing {kind} rendition")))?;
            if matching.next().is_some() {
                return Err(PackageError::Layout(format!("duplicate {kind} rendition")));
            }
            entries.push(ArchiveEntry {
                name: rendition.file_name(),
                bytes: rendition.bytes.clone(),
            });
        }
        entries.push(ArchiveEntry {
            name: METADATA_ENTRY.to_string(),
            bytes: metadata.to_json()?,
        });

        let archive = Self { entries };
        archive.check_layout()?;
        Ok(archive)
    }

    fn check_layout(&self) -> Result<(), PackageError> {
        if self.entries.len() != ENTRY_COUNT {
            return Err(PackageError::Layout(format!(
                "expected {ENTRY_COUNT} entries, got {}",
                self.entries.len()
            )));
        }
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(PackageError::Layout(format!(
                    "duplicate entry name {}",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Serialize to ZIP bytes.
    pub fn to_zip(&self) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = if entry.name == METADATA_ENTRY {
                CompressionMethod::Deflated
            } else {
                CompressionMethod::Stored
            };
            writer.start_file(entry.name.as_str(), entry_options(method))?;
            writer.write_all(&entry.bytes)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// A finished download.
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Build the ZIP for one request.
///
/// `source_name` is the client-supplied file name of the upload, if any; it
/// only influences the suggested download name.
pub fn package(
    renditions: &[Rendition],
    metadata: &ImageMetadata,
    source_name: Option<&str>,
) -> Result<PackagedArchive, PackageError> {
    let archive = ResultArchive::assemble(renditions, metadata)?;
    Ok(PackagedArchive {
        bytes: archive.to_zip()?,
        content_type: ARCHIVE_CONTENT_TYPE,
        filename: download_name(source_name),
    })
}

/// `<stem>-renditions.zip`, with the stem reduced to `[A-Za-z0-9._-]`.
pub fn download_name(source_name: Option<&str>) -> String {
    let stem = source_name
        .map(|name| {
            // Clients may send a full path; keep the last component.
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            let stem = match base.rfind('.') {
                Some(idx) if idx > 0 => &base[..idx],
                _ => base,
            };
            stem.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .take(64)
                .collect::<String>()
        })
        .filter(|stem| stem.chars().any(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}-renditions.zip")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Format;
    use crate::test_helpers::*;
    use std::collections::BTreeMap;

    fn rendition(kind: RenditionKind, format: Format) -> Rendition {
        Rendition {
            kind,
            format,
            width: 1,
            height: 1,
            bytes: format!("{kind}-bytes").into_bytes(),
        }
    }

    fn all_renditions(format: Format) -> Vec<Rendition> {
        RenditionKind::ALL
            .iter()
            .map(|&kind| rendition(kind, format))
            .collect()
    }

    fn metadata() -> ImageMetadata {
        ImageMetadata {
            original_width: 4000,
            original_height: 3000,
            exif: BTreeMap::from([("Make".to_string(), "Canon".to_string())]),
        }
    }

    #[test]
    fn archive_has_four_fixed_entries() {
        let packaged = package(&all_renditions(Format::Avif), &metadata(), None).unwrap();
        assert_eq!(
            archive_names(&packaged.bytes),
            vec![
                "thumb_256.avif",
                "medium_1024.avif",
                "optimized.avif",
                "metadata.json"
            ]
        );
        assert_eq!(packaged.content_type, "application/zip");
        assert_eq!(packaged.filename, "image-renditions.zip");
    }

    #[test]
    fn archive_entries_carry_rendition_bytes_and_metadata() {
        let packaged = package(&all_renditions(Format::Jpeg), &metadata(), None).unwrap();
        let entries = archive_entries(&packaged.bytes);
        assert_eq!(entries["thumb_256.jpeg"], b"thumb_256-bytes");
        assert_eq!(entries["optimized.jpeg"], b"optimized-bytes");

        let json: serde_json::Value = serde_json::from_slice(&entries["metadata.json"]).unwrap();
        assert_eq!(json["width"], 4000);
        assert_eq!(json["height"], 3000);
        assert_eq!(json["exif"]["Make"], "Canon");
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut renditions = all_renditions(Format::Png);
        renditions.reverse();
        let archive = ResultArchive::assemble(&renditions, &metadata()).unwrap();
        let names: Vec<&str> = archive.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["thumb_256.png", "medium_1024.png", "optimized.png", "metadata.json"]
        );
    }

    #[test]
    fn packaging_is_deterministic() {
        let first = package(&all_renditions(Format::WebP), &metadata(), None).unwrap();
        let second = package(&all_renditions(Format::WebP), &metadata(), None).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn missing_rendition_is_rejected() {
        let renditions = vec![
            rendition(RenditionKind::Thumb, Format::Png),
            rendition(RenditionKind::Optimized, Format::Png),
        ];
        let err = ResultArchive::assemble(&renditions, &metadata()).unwrap_err();
        assert!(err.to_string().contains("missing medium_1024"));
    }

    #[test]
    fn duplicate_rendition_is_rejected() {
        let mut renditions = all_renditions(Format::Png);
        renditions.push(rendition(RenditionKind::Thumb, Format::Jpeg));
        let err = ResultArchive::assemble(&renditions, &metadata()).unwrap_err();
        assert!(err.to_string().contains("duplicate thumb_256"));
    }

    #[test]
    fn download_name_uses_sanitized_stem() {
        assert_eq!(download_name(Some("holiday.jpg")), "holiday-renditions.zip");
        assert_eq!(
            download_name(Some("C:\\photos\\my photo (1).png")),
            "my_photo__1_-renditions.zip"
        );
        assert_eq!(download_name(Some("../../etc/passwd")), "passwd-renditions.zip");
        assert_eq!(download_name(Some(".hidden")), ".hidden-renditions.zip");
        assert_eq!(download_name(Some("???.jpg")), "image-renditions.zip");
        assert_eq!(download_name(None), "image-renditions.zip");
    }
}
