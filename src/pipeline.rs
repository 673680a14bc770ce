//! The request pipeline.
//!
//! ```text
//! UploadedImage ──► validate ──┬─► extract_metadata ──┐
//!                              │                      ├──► package ──► PackagedArchive
//!                              └─► render_renditions ─┘
//! ```
//!
//! Metadata extraction and rendering both read the decoded source and run
//! side by side under `rayon::join`. Either everything succeeds and a
//! complete archive comes back, or the request fails with one of the three
//! [`PipelineError`] classes. There is no partial result.

use crate::config::PipelineConfig;
use crate::imaging::{ImageCodec, RenderError, render_renditions};
use crate::metadata::extract_metadata;
use crate::package::{PackageError, PackagedArchive, package};
use crate::validate::{InputError, UploadedImage, validate_upload};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("render failure: {0}")]
    Render(#[from] RenderError),
    #[error("packaging failure: {0}")]
    Packaging(#[from] PackageError),
}

impl PipelineError {
    /// Whether the client caused the failure. Only these carry a reason back
    /// to the caller; the rest are reported generically.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}

/// Run one upload through validation, metadata extraction, rendering and
/// packaging.
pub fn process_upload(
    codec: &impl ImageCodec,
    upload: &UploadedImage,
    config: &PipelineConfig,
) -> Result<PackagedArchive, PipelineError> {
    let started = Instant::now();

    let decoded = validate_upload(codec, upload, config.max_upload_bytes)?;
    debug!(
        format = %decoded.format,
        width = decoded.width(),
        height = decoded.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "upload validated"
    );

    let render_config = config.render_config();
    let (metadata, renditions) = rayon::join(
        || extract_metadata(&decoded),
        || render_renditions(codec, &decoded, &render_config),
    );
    let renditions = renditions?;
    debug!(
        exif_fields = metadata.exif.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "renditions encoded"
    );

    let archive = package(&renditions, &metadata, upload.file_name.as_deref())?;
    info!(
        source = %decoded.format,
        output = %renditions.first().map(|r| r.format.to_string()).unwrap_or_default(),
        width = metadata.original_width,
        height = metadata.original_height,
        archive_bytes = archive.bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "upload processed"
    );
    Ok(archive)
}
