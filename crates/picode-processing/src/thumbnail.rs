//! Thumbnail rendering
//!
//! A thumbnail is a fixed `width x height` canvas. The bottom band holds the
//! caption on the left and the original dimensions on the right; the area
//! above it is white with the source image centered in it. Sources that
//! already fit are never upscaled.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::encoding::encode_jpeg;
use crate::font::{draw_text, text_width, GLYPH_HEIGHT};
use crate::ProcessingError;

const BAND_HEIGHT: u32 = 16;
const TEXT_MARGIN: u32 = 4;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BAND_COLOR: Rgba<u8> = Rgba([40, 40, 40, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const THUMBNAIL_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: 180,
            height: 140,
        }
    }
}

impl ThumbnailSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Area above the caption band.
    pub fn content_area(&self) -> (u32, u32) {
        (self.width, self.height.saturating_sub(BAND_HEIGHT))
    }
}

/// Size of `(width, height)` after fitting it into `(max_width, max_height)`
/// with the aspect ratio preserved. Sizes that already fit are returned
/// unchanged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (width64, height64) = (width as u64, height as u64);
    let (max_width64, max_height64) = (max_width as u64, max_height as u64);

    // compare aspect ratios in integers to keep the floor exact
    let (fitted_width, fitted_height) = if width64 * max_height64 >= height64 * max_width64 {
        (max_width64, height64 * max_width64 / width64)
    } else {
        (width64 * max_height64 / height64, max_height64)
    };

    (
        (fitted_width as u32).clamp(1, max_width.max(1)),
        (fitted_height as u32).clamp(1, max_height.max(1)),
    )
}

/// Resize by repeated halving until the target is reached.
///
/// Each step halves the dimensions still above target, clamping to the
/// target rather than undershooting it. A dimension already at or below the
/// target jumps straight to it.
pub fn stepwise_downscale(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
    let target_width = target_width.max(1);
    let target_height = target_height.max(1);
    let (mut width, mut height) = img.dimensions();
    let mut current: Option<DynamicImage> = None;

    while (width, height) != (target_width, target_height) {
        width = if width > target_width {
            (width / 2).max(target_width)
        } else {
            target_width
        };
        height = if height > target_height {
            (height / 2).max(target_height)
        } else {
            target_height
        };

        let source = current.as_ref().unwrap_or(img);
        current = Some(source.resize_exact(width, height, FilterType::CatmullRom));
    }

    current.unwrap_or_else(|| img.clone())
}

/// Render the thumbnail canvas for `img`, captioned with `caption`.
pub fn render_thumbnail(img: &DynamicImage, caption: &str, spec: ThumbnailSpec) -> RgbaImage {
    let (source_width, source_height) = img.dimensions();
    let (content_width, content_height) = spec.content_area();

    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, BACKGROUND);

    if content_width > 0 && content_height > 0 {
        let (fitted_width, fitted_height) =
            fit_within(source_width, source_height, content_width, content_height);

        let placed = if (fitted_width, fitted_height) == (source_width, source_height) {
            img.to_rgba8()
        } else {
            stepwise_downscale(img, fitted_width, fitted_height).to_rgba8()
        };

        let x = (content_width - fitted_width) / 2;
        let y = (content_height - fitted_height) / 2;
        imageops::overlay(&mut canvas, &placed, x as i64, y as i64);
    }

    let band_top = content_height;
    let band_height = spec.height - band_top;
    if band_height > 0 {
        draw_filled_rect_mut(
            &mut canvas,
            Rect::at(0, band_top as i32).of_size(spec.width, band_height),
            BAND_COLOR,
        );
    }

    let text_y = band_top as i64 + (band_height.saturating_sub(GLYPH_HEIGHT) / 2) as i64;
    draw_text(&mut canvas, TEXT_MARGIN as i64, text_y, caption, TEXT_COLOR);

    let label = format!("({}x{})", source_width, source_height);
    let label_x = spec.width as i64 - TEXT_MARGIN as i64 - text_width(&label) as i64;
    draw_text(&mut canvas, label_x, text_y, &label, TEXT_COLOR);

    canvas
}

/// Render and encode the thumbnail as JPEG.
pub fn render_thumbnail_jpeg(
    img: &DynamicImage,
    caption: &str,
    spec: ThumbnailSpec,
) -> Result<Vec<u8>, ProcessingError> {
    let canvas = render_thumbnail(img, caption, spec);
    encode_jpeg(&DynamicImage::ImageRgba8(canvas), THUMBNAIL_JPEG_QUALITY)
}
