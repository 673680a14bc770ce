//! High-level rendering operations.
//!
//! These functions combine calculations with codec execution. They take the
//! render configuration, plan the three renditions, and call the codec.

use super::calculations::fit_within_bound;
use super::codec::{CodecError, DecodedImage, ImageCodec};
use super::params::{
    EncodeParams, Format, PreferredFormat, Quality, RenditionKind, RenditionPlan, Sharpening,
};
use image::DynamicImage;
use image::imageops::FilterType;
use rayon::prelude::*;
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot render a {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
    #[error("{kind} rendition failed: {source}")]
    Codec {
        kind: RenditionKind,
        #[source]
        source: CodecError,
    },
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Settings that shape the three renditions.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub thumb_bound: u32,
    pub medium_bound: u32,
    pub preferred_format: PreferredFormat,
    /// Quality for the bounded renditions.
    pub quality: Quality,
    /// Quality for the full-size optimized rendition.
    pub optimized_quality: Quality,
    pub avif_speed: u8,
    pub thumb_sharpening: Option<Sharpening>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            thumb_bound: 256,
            medium_bound: 1024,
            preferred_format: PreferredFormat::default(),
            quality: Quality::default(),
            optimized_quality: Quality::new(85),
            avif_speed: 6,
            thumb_sharpening: Some(Sharpening::light()),
        }
    }
}

/// One encoded output of the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub kind: RenditionKind,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl Rendition {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Archive member name; the extension always matches the encoder used.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.kind.name(), self.format.extension())
    }
}

/// Pick the single output format used for all renditions of one image.
///
/// The preferred modern format wins when the codec can encode it. Otherwise
/// the source family decides: PNG stays PNG, lossy sources become JPEG, and
/// anything carrying alpha goes to PNG since JPEG cannot hold it.
pub fn choose_output_format(
    codec: &impl ImageCodec,
    preferred: PreferredFormat,
    source: Format,
    has_alpha: bool,
) -> Format {
    let modern = match preferred {
        PreferredFormat::Avif => Some(Format::Avif),
        PreferredFormat::WebP => Some(Format::WebP),
        PreferredFormat::Original => None,
    };
    if let Some(format) = modern.filter(|f| codec.can_encode(*f)) {
        return format;
    }

    match source {
        Format::Png => Format::Png,
        Format::Jpeg => Format::Jpeg,
        Format::WebP | Format::Avif if has_alpha => Format::Png,
        Format::WebP | Format::Avif => Format::Jpeg,
    }
}

/// Plan the three renditions without executing them.
pub fn plan_renditions(
    original: (u32, u32),
    format: Format,
    config: &RenderConfig,
) -> Result<Vec<RenditionPlan>> {
    let (width, height) = original;
    let empty = || RenderError::EmptyImage { width, height };

    RenditionKind::ALL
        .iter()
        .map(|&kind| {
            let (bound, quality, max_effort, sharpening) = match kind {
                RenditionKind::Thumb => (
                    Some(config.thumb_bound),
                    config.quality,
                    false,
                    config.thumb_sharpening,
                ),
                RenditionKind::Medium => (Some(config.medium_bound), config.quality, false, None),
                RenditionKind::Optimized => (None, config.optimized_quality, true, None),
            };

            let (w, h) = match bound {
                Some(bound) => fit_within_bound(original, bound).ok_or_else(empty)?,
                None if width == 0 || height == 0 => return Err(empty()),
                None => original,
            };
            let resize = (w, h) != original;

            Ok(RenditionPlan {
                kind,
                width: w,
                height: h,
                resize,
                // Sharpening only compensates for downscaling softness.
                sharpening: sharpening.filter(|_| resize),
                encode: EncodeParams {
                    format,
                    quality,
                    max_effort,
                    avif_speed: config.avif_speed,
                },
            })
        })
        .collect()
}

/// Resize (when planned), sharpen, and encode one rendition.
pub fn render_rendition(
    codec: &impl ImageCodec,
    source: &DynamicImage,
    plan: &RenditionPlan,
) -> Result<Rendition> {
    let resized = if plan.resize {
        Cow::Owned(source.resize_exact(plan.width, plan.height, FilterType::Lanczos3))
    } else {
        Cow::Borrowed(source)
    };
    let finished = match plan.sharpening {
        Some(s) => Cow::Owned(resized.unsharpen(s.sigma, s.threshold)),
        None => resized,
    };

    let bytes = codec
        .encode(&finished, &plan.encode)
        .map_err(|source| RenderError::Codec {
            kind: plan.kind,
            source,
        })?;
    debug!(
        rendition = %plan.kind,
        format = %plan.encode.format,
        width = plan.width,
        height = plan.height,
        bytes = bytes.len(),
        "rendition encoded"
    );

    Ok(Rendition {
        kind: plan.kind,
        format: plan.encode.format,
        width: plan.width,
        height: plan.height,
        bytes,
    })
}

/// Produce all three renditions of a decoded image, encoding them in parallel.
///
/// Output order is always thumb, medium, optimized. Any failure aborts the
/// whole set.
pub fn render_renditions(
    codec: &impl ImageCodec,
    decoded: &DecodedImage,
    config: &RenderConfig,
) -> Result<Vec<Rendition>> {
    let format = choose_output_format(
        codec,
        config.preferred_format,
        decoded.format,
        decoded.has_alpha(),
    );
    let plans = plan_renditions((decoded.width(), decoded.height()), format, config)?;

    plans
        .par_iter()
        .map(|plan| render_rendition(codec, &decoded.pixels, plan))
        .collect()
}
