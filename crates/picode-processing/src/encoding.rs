//! Re-encoding of uploads under the stored-size ceiling.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::ProcessingError;

/// Format a full-size image is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Lossless, preferred whenever it fits.
    Png,
    /// Lossy fallback.
    Jpeg,
}

impl ImageEncoding {
    pub fn extension(self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpg",
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }

    /// The other encoding. A code's image exists under exactly one of the two.
    pub fn alternate(self) -> Self {
        match self {
            ImageEncoding::Png => ImageEncoding::Jpeg,
            ImageEncoding::Jpeg => ImageEncoding::Png,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub encoding: ImageEncoding,
    pub bytes: Vec<u8>,
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|source| ProcessingError::Encode {
            format: "png",
            source,
        })?;
    Ok(buffer)
}

/// JPEG has no alpha channel; transparency is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|source| ProcessingError::Encode {
            format: "jpeg",
            source,
        })?;
    Ok(buffer)
}

/// Pick the artifact to store: lossless if it fits within `max_bytes`,
/// otherwise lossy if that fits, otherwise `TooLarge`.
pub fn encode_within_ceiling(
    img: &DynamicImage,
    max_bytes: usize,
    jpeg_quality: u8,
) -> Result<EncodedImage, ProcessingError> {
    let png = encode_png(img)?;
    if png.len() <= max_bytes {
        return Ok(EncodedImage {
            encoding: ImageEncoding::Png,
            bytes: png,
        });
    }

    let jpeg = encode_jpeg(img, jpeg_quality)?;
    if jpeg.len() <= max_bytes {
        tracing::debug!(
            png_bytes = png.len(),
            jpeg_bytes = jpeg.len(),
            max_bytes,
            "Lossless encoding over ceiling, storing lossy"
        );
        return Ok(EncodedImage {
            encoding: ImageEncoding::Jpeg,
            bytes: jpeg,
        });
    }

    Err(ProcessingError::TooLarge {
        size: png.len().min(jpeg.len()),
        max: max_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random noise compresses badly losslessly but well lossily.
    fn noise_image(width: u32, height: u32) -> DynamicImage {
        let mut rng = StdRng::seed_from_u64(17);
        let img = RgbImage::from_fn(width, height, |_, _| {
            Rgb([rng.random(), rng.random(), rng.random()])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_small_image_stays_lossless() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([200, 10, 10])));
        let encoded = encode_within_ceiling(&img, 2 * 1024 * 1024, 85).unwrap();
        assert_eq!(encoded.encoding, ImageEncoding::Png);

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_falls_back_to_lossy_when_lossless_is_too_big() {
        let img = noise_image(256, 256);
        let png_len = encode_png(&img).unwrap().len();
        let jpeg_len = encode_jpeg(&img, 85).unwrap().len();
        assert!(jpeg_len < png_len);

        let encoded = encode_within_ceiling(&img, jpeg_len, 85).unwrap();
        assert_eq!(encoded.encoding, ImageEncoding::Jpeg);
        assert_eq!(encoded.bytes.len(), jpeg_len);
        assert_eq!(
            image::guess_format(&encoded.bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let img = noise_image(32, 32);
        let png_len = encode_png(&img).unwrap().len();
        let encoded = encode_within_ceiling(&img, png_len, 85).unwrap();
        assert_eq!(encoded.encoding, ImageEncoding::Png);
    }

    #[test]
    fn test_rejects_when_both_encodings_exceed() {
        let img = noise_image(128, 128);
        let png_len = encode_png(&img).unwrap().len();
        let jpeg_len = encode_jpeg(&img, 85).unwrap().len();
        let max = png_len.min(jpeg_len) - 1;

        match encode_within_ceiling(&img, max, 85) {
            Err(ProcessingError::TooLarge { size, max: limit }) => {
                assert_eq!(limit, max);
                assert!(size > max);
            }
            other => panic!("expected TooLarge, got {:?}", other.map(|e| e.encoding)),
        }
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([0, 0, 255, 0]),
        ));
        let bytes = encode_jpeg(&img, 90).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_encoding_metadata() {
        assert_eq!(ImageEncoding::Png.extension(), "png");
        assert_eq!(ImageEncoding::Jpeg.extension(), "jpg");
        assert_eq!(ImageEncoding::Jpeg.to_mime_type(), "image/jpeg");
        assert_eq!(ImageEncoding::Png.alternate(), ImageEncoding::Jpeg);
    }
}
