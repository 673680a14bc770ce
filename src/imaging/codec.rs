//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait is the only seam between the pipeline and pixel
//! encoding: it decodes uploaded bytes into a [`DecodedImage`] and encodes a
//! raster back into bytes in a requested [`Format`]. There is no global codec
//! registry; callers hold a codec value and pass it down.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec), pure Rust and statically linked.

use super::params::{EncodeParams, Format};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image encoding")]
    UnknownFormat,
    #[error("unsupported image encoding: {0}")]
    Unsupported(String),
    #[error("image exceeds decoder limits: {0}")]
    Limits(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// A decoded upload: pixels plus whatever was read from the container
/// before any transform touched it.
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub format: Format,
    /// Raw TIFF payload of the source container's EXIF block, if it carried
    /// one. Parsed on demand by the metadata stage.
    pub exif: Option<Vec<u8>>,
}

impl DecodedImage {
    pub fn new(pixels: DynamicImage, format: Format) -> Self {
        Self {
            pixels,
            format,
            exif: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.pixels.color().has_alpha()
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.pixels.color())
            .field("format", &self.format)
            .field("exif_bytes", &self.exif.as_ref().map(Vec::len))
            .finish()
    }
}

/// Trait for image codecs.
///
/// `Sync` so a single codec can be shared across rayon workers.
pub trait ImageCodec: Sync {
    /// Sniff the encoding from `bytes` and decode it.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;

    /// Encode `image` according to `params`.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, CodecError>;

    /// Whether this codec was built with an encoder for `format`.
    fn can_encode(&self, format: Format) -> bool;
}
