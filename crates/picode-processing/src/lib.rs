//! Picode Processing Library
//!
//! Image work for the upload path: decoding untrusted bytes, re-encoding
//! under the size ceiling, and rendering captioned thumbnails. Everything
//! here is CPU-bound and synchronous; async callers run it on the blocking
//! pool.

pub mod decode;
pub mod encoding;
pub mod error;
mod font;
pub mod thumbnail;

pub use decode::decode_image;
pub use encoding::{encode_jpeg, encode_png, encode_within_ceiling, EncodedImage, ImageEncoding};
pub use error::ProcessingError;
pub use thumbnail::{
    fit_within, render_thumbnail, render_thumbnail_jpeg, stepwise_downscale, ThumbnailSpec,
};
