//! Image fixtures.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("Failed to encode fixture");
    buf.into_inner()
}

/// Small PNG that stays under the size ceiling when re-encoded.
pub fn small_png() -> Vec<u8> {
    encode(&gradient(64, 48), ImageFormat::Png)
}

pub fn small_jpeg() -> Vec<u8> {
    encode(&gradient(64, 48), ImageFormat::Jpeg)
}

pub fn fallback_jpeg() -> Vec<u8> {
    encode(
        &DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]))),
        ImageFormat::Jpeg,
    )
}
