//! Upload validation.
//!
//! The first pipeline stage. An upload passes only if it is non-empty, within
//! the configured byte ceiling, sniffs as JPEG, PNG or WEBP from its own
//! bytes, and decodes cleanly within the codec's dimension limits. The
//! declared content type is informational only.

use crate::imaging::{CodecError, DecodedImage, Format, ImageCodec};
use thiserror::Error;
use tracing::debug;

/// Raw upload as received from the client.
#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    /// Content type the client declared, never trusted for format detection.
    pub content_type: Option<String>,
    /// Client-side file name, used only for the download name.
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Reasons an upload is rejected. Every variant is the client's fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no image data was uploaded")]
    Empty,
    #[error("upload is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("unrecognized image encoding, expected JPEG, PNG or WEBP")]
    UnknownFormat,
    #[error("unsupported image encoding '{0}', expected JPEG, PNG or WEBP")]
    UnsupportedFormat(String),
    #[error("image is too large: {0}")]
    Dimensions(String),
    #[error("image data is corrupt: {0}")]
    Corrupt(String),
    #[error("missing form field '{0}'")]
    MissingField(String),
    #[error("invalid form field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl InputError {
    /// Size violations, as opposed to malformed content.
    pub fn is_too_large(&self) -> bool {
        matches!(self, InputError::TooLarge { .. } | InputError::Dimensions(_))
    }

    /// The bytes are not an image encoding we accept.
    pub fn is_unsupported_media(&self) -> bool {
        matches!(
            self,
            InputError::UnknownFormat | InputError::UnsupportedFormat(_)
        )
    }
}

impl From<CodecError> for InputError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnknownFormat => InputError::UnknownFormat,
            CodecError::Unsupported(name) => InputError::UnsupportedFormat(name),
            CodecError::Limits(detail) => InputError::Dimensions(detail),
            CodecError::Io(e) => InputError::Corrupt(e.to_string()),
            CodecError::Decode(detail) | CodecError::Encode(detail) => InputError::Corrupt(detail),
        }
    }
}

/// Check an upload and decode it. Nothing downstream runs unless this succeeds.
pub fn validate_upload(
    codec: &impl ImageCodec,
    upload: &UploadedImage,
    max_upload_bytes: usize,
) -> Result<DecodedImage, InputError> {
    let bytes = upload.bytes.as_slice();
    if bytes.is_empty() {
        return Err(InputError::Empty);
    }
    if bytes.len() > max_upload_bytes {
        return Err(InputError::TooLarge {
            size: bytes.len(),
            limit: max_upload_bytes,
        });
    }

    let detected = image::guess_format(bytes).map_err(|_| InputError::UnknownFormat)?;
    let format = Format::from_image_format(detected)
        .filter(|f| f.is_accepted_input())
        .ok_or_else(|| {
            let name = detected
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("unknown");
            InputError::UnsupportedFormat(name.to_string())
        })?;

    if let Some(declared) = upload.content_type.as_deref() {
        if !declared.eq_ignore_ascii_case(format.mime_type()) {
            debug!(declared, detected = %format, "declared content type disagrees with content");
        }
    }

    Ok(codec.decode(bytes)?)
}
