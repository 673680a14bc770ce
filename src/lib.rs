//! # imgbundle
//!
//! Upload one image, download a ZIP holding three renditions of it plus a
//! metadata document.
//!
//! # Pipeline
//!
//! Every request runs the same single pass. Nothing is shared between
//! requests and nothing is written to disk:
//!
//! ```text
//! 1. Validate   bytes     →  DecodedImage     (sniffed JPEG/PNG/WEBP, size + dimension limits)
//! 2. Extract    decoded   →  ImageMetadata    (width, height, EXIF)      ┐ in parallel
//! 3. Render     decoded   →  3 × Rendition    (thumb_256, medium_1024,   ┘
//!                                              optimized)
//! 4. Package    renditions + metadata  →  ZIP
//! ```
//!
//! The archive always holds exactly these entries, in this order:
//!
//! ```text
//! thumb_256.<ext>
//! medium_1024.<ext>
//! optimized.<ext>
//! metadata.json      { "width": …, "height": …, "exif": { "Make": …, … } }
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`validate`] | Stage 1: rejects empty, oversized, unsupported or corrupt uploads |
//! | [`metadata`] | Stage 2: dimensions and EXIF tags of the original |
//! | [`imaging`] | Stage 3: rendition planning, resizing and encoding behind the [`imaging::ImageCodec`] trait |
//! | [`package`] | Stage 4: deterministic ZIP assembly |
//! | [`pipeline`] | Runs the four stages and classifies failures |
//! | [`server`] | axum routes: `POST /api/process`, `GET /health` |
//! | [`config`] | TOML config loading, merging onto stock defaults, validation |
//! | [`logging`] | tracing subscriber setup |
//!
//! # Failure Classes
//!
//! A request either returns a complete archive or fails as a whole:
//!
//! - **Invalid input**: the client's fault; reported as a 4xx with the reason.
//! - **Render failure** / **packaging failure**: ours; reported as a 500
//!   with a generic message, detail in the log.
//!
//! # Output Encoding
//!
//! Renditions are AVIF by default. When the AVIF encoder is compiled out
//! (`--no-default-features`) or the configuration asks for the original
//! format, they stay in the source's family: PNG stays PNG, JPEG stays JPEG,
//! WEBP becomes JPEG (or PNG when it has an alpha channel).

pub mod config;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod package;
pub mod pipeline;
pub mod server;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
