//! Decoding of uploaded bytes.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};

use crate::ProcessingError;

/// Decode an image, guessing the format from its contents.
///
/// The declared content type of an upload is never trusted; only the magic
/// bytes decide the decoder. Decoder allocation limits stay at the `image`
/// crate defaults.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, ProcessingError> {
    if data.is_empty() {
        return Err(ProcessingError::Decode("empty upload".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(ProcessingError::Decode("unrecognized image format".to_string()));
    }

    reader
        .decode()
        .map_err(|e| ProcessingError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_decode_png() {
        let img = decode_image(&png_bytes(12, 7)).unwrap();
        assert_eq!(img.dimensions(), (12, 7));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ProcessingError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode_image(&[]), Err(ProcessingError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let bytes = png_bytes(64, 64);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode_image(truncated),
            Err(ProcessingError::Decode(_))
        ));
    }
}
