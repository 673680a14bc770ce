//! Pure Rust image codec, no system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff encoding | `image::guess_format` (magic bytes, never the declared type) |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) under [`image::Limits`] |
//! | EXIF | `kamadak-exif` container reader (JPEG APP1, PNG eXIf, WebP EXIF) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! AVIF is output only. Encoding it needs the `avif` cargo feature; without
//! it [`RustCodec`] reports AVIF as not encodable. AVIF is never decoded,
//! since it is not an accepted upload encoding.

use super::codec::{CodecError, DecodedImage, ImageCodec};
use super::params::{EncodeParams, Format};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Default per-side pixel ceiling applied while decoding.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustCodec {
    max_dimension: u32,
}

impl RustCodec {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Reject images wider or taller than `max_dimension` during decode.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    fn limits(&self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }

    fn check_dimensions(&self, image: &DynamicImage) -> Result<(), CodecError> {
        if image.width() > self.max_dimension || image.height() > self.max_dimension {
            return Err(CodecError::Limits(format!(
                "{}x{} exceeds {} pixels per side",
                image.width(),
                image.height(),
                self.max_dimension
            )));
        }
        Ok(())
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("unknown")
}

fn map_decode_error(err: ImageError) -> CodecError {
    match err {
        ImageError::Limits(e) => CodecError::Limits(e.to_string()),
        ImageError::Unsupported(e) => CodecError::Unsupported(e.to_string()),
        other => CodecError::Decode(other.to_string()),
    }
}

/// Read the EXIF block straight from the container bytes and keep its raw
/// TIFF payload.
///
/// Missing EXIF is the common case and not worth a log line; anything else
/// means the block exists but could not be parsed, which is still not fatal.
fn read_exif(bytes: &[u8]) -> Option<Vec<u8>> {
    match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => Some(exif.buf().to_vec()),
        Err(exif::Error::NotFound(_)) => None,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable EXIF block");
            None
        }
    }
}

/// Reduce to 8-bit RGB(A), which every encoder here accepts.
fn as_8bit(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other if other.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
        }
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// PNG carries 8 and 16-bit integer samples natively; only float buffers need converting.
fn as_png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => as_8bit(image),
        _ => Cow::Borrowed(image),
    }
}

fn encode_jpeg(image: &DynamicImage, params: &EncodeParams) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    // JPEG has no alpha; flatten to RGB.
    let rgb = match image {
        DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    };
    let encoder = JpegEncoder::new_with_quality(&mut buf, params.quality.value() as u8);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

fn encode_png(image: &DynamicImage, params: &EncodeParams) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let compression = if params.max_effort {
        CompressionType::Best
    } else {
        CompressionType::Default
    };
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilterType::Adaptive);
    as_png_compatible(image).write_with_encoder(encoder)?;
    Ok(buf)
}

fn encode_webp(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buf);
    as_8bit(image).write_with_encoder(encoder)?;
    Ok(buf)
}

/// Encode as AVIF using ravif/rav1e.
#[cfg(feature = "avif")]
fn encode_avif(image: &DynamicImage, params: &EncodeParams) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut buf,
        params.avif_speed,
        params.quality.value() as u8,
    );
    as_8bit(image).write_with_encoder(encoder)?;
    Ok(buf)
}
impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let detected = image::guess_format(bytes).map_err(|_| CodecError::UnknownFormat)?;
        let format = Format::from_image_format(detected)
            .ok_or_else(|| CodecError::Unsupported(format_name(detected).to_string()))?;

        let pixels = match format {
            Format::Avif => return Err(CodecError::Unsupported("avif".into())),
            _ => {
                let mut reader = ImageReader::with_format(Cursor::new(bytes), detected);
                reader.limits(self.limits());
                reader.decode().map_err(map_decode_error)?
            }
        };
        self.check_dimensions(&pixels)?;

        Ok(DecodedImage {
            pixels,
            format,
            exif: read_exif(bytes),
        })
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
        let encoded = match params.format {
            Format::Jpeg => encode_jpeg(image, params),
            Format::Png => encode_png(image, params),
            Format::WebP => encode_webp(image),
            #[cfg(feature = "avif")]
            Format::Avif => encode_avif(image, params),
            #[cfg(not(feature = "avif"))]
            Format::Avif => return Err(CodecError::Unsupported("avif".into())),
        };
        encoded.map_err(|e| CodecError::Encode(format!("{} encode failed: {e}", params.format)))
    }

    fn can_encode(&self, format: Format) -> bool {
        match format {
            Format::Jpeg | Format::Png | Format::WebP => true,
            Format::Avif => cfg!(feature = "avif"),
        }
    }
}
