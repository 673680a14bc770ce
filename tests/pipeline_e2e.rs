//! End-to-end runs of the public pipeline API.
//!
//! Run with: cargo test --test pipeline_e2e

use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use imgbundle::config::{PipelineConfig, load_config};
use imgbundle::imaging::{ImageCodec, PreferredFormat, RustCodec};
use imgbundle::pipeline::{PipelineError, process_upload};
use imgbundle::validate::UploadedImage;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 90])
    });
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn webp_with_alpha(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| image::Rgba([200, 10, 10, (x % 256) as u8]));
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

fn unzip(bytes: &[u8]) -> (Vec<String>, BTreeMap<String, Vec<u8>>) {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names = Vec::new();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        names.push(file.name().to_string());
        entries.insert(file.name().to_string(), data);
    }
    (names, entries)
}

fn original_family() -> PipelineConfig {
    PipelineConfig {
        preferred_format: PreferredFormat::Original,
        ..PipelineConfig::default()
    }
}

#[test]
fn landscape_png_produces_bounded_renditions() {
    let upload = UploadedImage::new(png(1600, 900)).with_file_name("harbour.png");
    let archive = process_upload(&RustCodec::new(), &upload, &original_family()).unwrap();
    assert_eq!(archive.filename, "harbour-renditions.zip");

    let (names, entries) = unzip(&archive.bytes);
    assert_eq!(
        names,
        ["thumb_256.png", "medium_1024.png", "optimized.png", "metadata.json"]
    );

    let codec = RustCodec::new();
    let thumb = codec.decode(&entries["thumb_256.png"]).unwrap();
    let medium = codec.decode(&entries["medium_1024.png"]).unwrap();
    let optimized = codec.decode(&entries["optimized.png"]).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (256, 144));
    assert_eq!((medium.width(), medium.height()), (1024, 576));
    assert_eq!((optimized.width(), optimized.height()), (1600, 900));

    let meta: serde_json::Value = serde_json::from_slice(&entries["metadata.json"]).unwrap();
    assert_eq!(meta["width"], 1600);
    assert_eq!(meta["height"], 900);
    assert_eq!(meta["exif"], serde_json::json!({}));
}

#[test]
fn portrait_bounds_apply_to_height() {
    let upload = UploadedImage::new(png(300, 600));
    let archive = process_upload(&RustCodec::new(), &upload, &original_family()).unwrap();
    let (_, entries) = unzip(&archive.bytes);

    let thumb = RustCodec::new().decode(&entries["thumb_256.png"]).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (128, 256));
    // Already within the medium bound: kept as is.
    let medium = RustCodec::new().decode(&entries["medium_1024.png"]).unwrap();
    assert_eq!((medium.width(), medium.height()), (300, 600));
}

#[test]
fn alpha_webp_falls_back_to_png() {
    let upload = UploadedImage::new(webp_with_alpha(40, 40));
    let archive = process_upload(&RustCodec::new(), &upload, &original_family()).unwrap();
    let (names, _) = unzip(&archive.bytes);
    assert_eq!(
        names,
        ["thumb_256.png", "medium_1024.png", "optimized.png", "metadata.json"]
    );
}

#[test]
fn same_input_gives_identical_archives() {
    let bytes = png(120, 80);
    let first =
        process_upload(&RustCodec::new(), &UploadedImage::new(bytes.clone()), &original_family())
            .unwrap();
    let second =
        process_upload(&RustCodec::new(), &UploadedImage::new(bytes), &original_family()).unwrap();
    assert_eq!(first.bytes, second.bytes);
}

#[test]
fn rejection_happens_before_any_output() {
    let err = process_upload(
        &RustCodec::new(),
        &UploadedImage::new(b"%PDF-1.7 not an image".to_vec()),
        &original_family(),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(err.is_client_error());
}

#[test]
fn configured_dimension_limit_is_enforced() {
    let config = PipelineConfig {
        max_dimension: 100,
        ..original_family()
    };
    let err = process_upload(&config.codec(), &UploadedImage::new(png(150, 50)), &config)
        .unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn stock_configuration_loads() {
    let config = load_config(None).unwrap();
    assert_eq!(config.pipeline, PipelineConfig::default());
}

#[cfg(feature = "avif")]
#[test]
fn default_configuration_renders_avif() {
    let upload = UploadedImage::new(png(96, 64));
    let archive = process_upload(&RustCodec::new(), &upload, &PipelineConfig::default()).unwrap();
    let (names, entries) = unzip(&archive.bytes);
    assert_eq!(
        names,
        ["thumb_256.avif", "medium_1024.avif", "optimized.avif", "metadata.json"]
    );

    let optimized = &entries["optimized.avif"];
    assert_eq!(image::guess_format(optimized).unwrap(), image::ImageFormat::Avif);
    let avif = avif_parse::read_avif(&mut Cursor::new(optimized)).unwrap();
    let av1 = avif.primary_item_metadata().unwrap();
    assert_eq!((av1.max_frame_width.get(), av1.max_frame_height.get()), (96, 64));

    // Renditions are outputs only; they are never accepted back as uploads.
    let err = process_upload(
        &RustCodec::new(),
        &UploadedImage::new(optimized.clone()),
        &PipelineConfig::default(),
    )
    .unwrap_err();
    assert!(err.is_client_error());
}
