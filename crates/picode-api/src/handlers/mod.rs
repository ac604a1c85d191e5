pub mod image_get;
pub mod upload;
