//! Shared key layout for image artifacts.

use picode_core::Code;

/// Directory holding thumbnails.
pub const MINI_PREFIX: &str = "mini";

/// Thumbnails are always JPEG.
pub const MINI_EXTENSION: &str = "jpg";

/// Extensions a full image may be stored under, in lookup order.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];

/// Key of the full image: `{code}.{extension}`.
pub fn image_key(code: &Code, extension: &str) -> String {
    format!("{}.{}", code, extension)
}

/// Key of the thumbnail: `mini/{code}.jpg`.
pub fn mini_key(code: &Code) -> String {
    format!("{}/{}.{}", MINI_PREFIX, code, MINI_EXTENSION)
}

/// MIME type inferred from a key's extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
