//! Shared test utilities for the imgbundle test suite.
//!
//! Builds small synthetic uploads in every accepted encoding, embeds EXIF
//! in each container, and unpacks result archives for assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let upload = jpeg_with_exif(64, 48);
//! let archive = process_upload(&RustCodec::new(), &UploadedImage::new(upload), &config)?;
//! let entries = archive_entries(&archive.bytes);
//! assert!(entries.contains_key("metadata.json"));
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

// =========================================================================
// Synthetic images
// =========================================================================

/// A gradient so encoders have something other than a flat field to chew on.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 200])
    });
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// EXIF
// =========================================================================

/// A little-endian TIFF block with Make, Model and Orientation set.
pub fn camera_exif_block() -> Vec<u8> {
    use exif::experimental::Writer;
    use exif::{Field, In, Tag, Value};

    let make = Field {
        tag: Tag::Make,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"Canon".to_vec()]),
    };
    let model = Field {
        tag: Tag::Model,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"EOS R5".to_vec()]),
    };
    let orientation = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![1]),
    };

    let mut writer = Writer::new();
    writer.push_field(&make);
    writer.push_field(&model);
    writer.push_field(&orientation);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, true).unwrap();
    buf.into_inner()
}

/// A JPEG carrying [`camera_exif_block`] in an APP1 segment right after SOI.
pub fn jpeg_with_exif(width: u32, height: u32) -> Vec<u8> {
    let jpeg = jpeg_bytes(width, height);
    let tiff = camera_exif_block();

    let segment_len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A PNG carrying [`camera_exif_block`] in an `eXIf` chunk.
pub fn png_with_exif(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    let mut encoder = PngEncoder::new(&mut buf);
    encoder.set_exif_metadata(camera_exif_block()).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// An extended (`VP8X`) WebP carrying [`camera_exif_block`] in an `EXIF` chunk.
pub fn webp_with_exif(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    let mut encoder = WebPEncoder::new_lossless(&mut buf);
    encoder.set_exif_metadata(camera_exif_block()).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// Archives
// =========================================================================

/// Unpack a zip into name → bytes. Panics on a malformed archive.
pub fn archive_entries(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        entries.insert(file.name().to_string(), data);
    }
    entries
}

/// Member names in archive order.
pub fn archive_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}
