//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff + decode** | `image::guess_format` + `ImageReader` with limits |
//! | **EXIF** | `kamadak-exif` container reader |
//! | **Resize** | `resize_exact` with Lanczos3, never upscaling |
//! | **Thumbnail** | bounded resize + light `unsharpen` |
//! | **Encode** | AVIF (rav1e), WebP lossless, PNG, JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: High-level functions combining calculations + codec

mod calculations;
pub mod codec;
pub mod operations;
mod params;
pub mod rust_codec;

pub use calculations::fit_within_bound;
pub use codec::{CodecError, DecodedImage, ImageCodec};
pub use operations::{
    RenderConfig, RenderError, Rendition, choose_output_format, plan_renditions,
    render_renditions,
};
pub use params::{
    EncodeParams, Format, PreferredFormat, Quality, RenditionKind, RenditionPlan, Sharpening,
};
pub use rust_codec::RustCodec;
