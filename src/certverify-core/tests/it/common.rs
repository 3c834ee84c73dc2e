//! Shared fixtures: synthetic documents and engines.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use certverify_core::{
    FsSource, IdentityRegistry, MemoryStore, StaticTextExtractor, VerificationEngine,
    VerifyConfig,
};
use image::{GrayImage, ImageFormat, Luma};

pub const GENUINE_TEXT: &str = "Certificate of Completion. This is to certify that \
                                Jane Doe has completed the degree program and was \
                                awarded on 14 June 2021.";
pub const VAGUE_TEXT: &str = "hello there, general reader";

pub fn png(img: &GrayImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// No quality flags.
pub fn clean_png() -> Vec<u8> {
    png(&GrayImage::from_fn(48, 48, |x, y| {
        if (x + y) % 2 == 0 {
            Luma([40])
        } else {
            Luma([220])
        }
    }))
}

/// Blurry and dark, contrast fine: quality score 0.5.
pub fn blurry_dark_png() -> Vec<u8> {
    png(&GrayImage::from_fn(64, 8, |x, _| {
        if x < 40 {
            Luma([0])
        } else {
            Luma([((x - 40) * 8) as u8])
        }
    }))
}

/// Blurry, dark and flat: quality score 0.7.
pub fn murky_png() -> Vec<u8> {
    png(&GrayImage::from_pixel(24, 24, Luma([15])))
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) -> String {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

pub fn engine_with_text(config: VerifyConfig, text: &str) -> VerificationEngine {
    VerificationEngine::with_components(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(IdentityRegistry::new()),
        Arc::new(FsSource),
        Arc::new(StaticTextExtractor::new(text)),
    )
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
