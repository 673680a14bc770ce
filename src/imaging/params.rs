//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between the
//! high-level [`operations`](super::operations) module (which decides which
//! renditions to create) and the [`codec`](super::codec) (which does the
//! actual pixel and byte work). Swapping the codec for a mock in tests does
//! not change any planning logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters applied after downscaling thumbnails.
//! - [`Format`]: Raster encodings the pipeline reads or writes.
//! - [`PreferredFormat`]: Which encoding renditions should use when the codec allows it.
//! - [`RenditionKind`]: The three fixed renditions and their archive names.
//! - [`EncodeParams`]: Full specification for one encode call.
//! - [`RenditionPlan`]: Target dimensions + encode params for one rendition.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for thumbnails.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// A raster encoding known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl Format {
    /// Encodings accepted as uploads.
    pub const ACCEPTED_INPUTS: [Format; 3] = [Format::Jpeg, Format::Png, Format::WebP];

    /// Map an `image` crate format onto ours. `None` for anything we never handle.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Format::Jpeg),
            ImageFormat::Png => Some(Format::Png),
            ImageFormat::WebP => Some(Format::WebP),
            ImageFormat::Avif => Some(Format::Avif),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Format::Jpeg => ImageFormat::Jpeg,
            Format::Png => ImageFormat::Png,
            Format::WebP => ImageFormat::WebP,
            Format::Avif => ImageFormat::Avif,
        }
    }

    /// File extension used for archive member names.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::WebP => "webp",
            Format::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::WebP => "image/webp",
            Format::Avif => "image/avif",
        }
    }

    pub fn is_accepted_input(self) -> bool {
        Self::ACCEPTED_INPUTS.contains(&self)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Output encoding policy for renditions.
///
/// `Avif` and `WebP` are used only when the codec can encode them; otherwise,
/// and always for `Original`, renditions stay in the source format's family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredFormat {
    #[default]
    Avif,
    WebP,
    Original,
}

impl FromStr for PreferredFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avif" => Ok(PreferredFormat::Avif),
            "webp" => Ok(PreferredFormat::WebP),
            "original" => Ok(PreferredFormat::Original),
            other => Err(format!(
                "unknown format '{other}' (expected avif, webp or original)"
            )),
        }
    }
}

/// The three renditions every request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionKind {
    Thumb,
    Medium,
    Optimized,
}

impl RenditionKind {
    /// Archive order.
    pub const ALL: [RenditionKind; 3] = [
        RenditionKind::Thumb,
        RenditionKind::Medium,
        RenditionKind::Optimized,
    ];

    /// Fixed member stem. Does not follow the configured bounds.
    pub fn name(self) -> &'static str {
        match self {
            RenditionKind::Thumb => "thumb_256",
            RenditionKind::Medium => "medium_1024",
            RenditionKind::Optimized => "optimized",
        }
    }
}

impl fmt::Display for RenditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for a single encode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    pub format: Format,
    pub quality: Quality,
    /// Spend more CPU for smaller output (best PNG compression).
    pub max_effort: bool,
    /// rav1e speed preset, 1 (slowest) to 10 (fastest). AVIF only.
    pub avif_speed: u8,
}

/// Everything needed to produce one rendition from the decoded source.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionPlan {
    pub kind: RenditionKind,
    pub width: u32,
    pub height: u32,
    /// False when the target equals the source size and no resampling is needed.
    pub resize: bool,
    pub sharpening: Option<Sharpening>,
    pub encode: EncodeParams,
}
