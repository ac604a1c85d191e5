//! Picode Storage Library
//!
//! Storage abstraction for uploaded images and their thumbnails.
//!
//! # Storage key format
//!
//! Keys are relative to the image root:
//!
//! - **Full image**: `{code}.png` or `{code}.jpg`
//! - **Thumbnail**: `mini/{code}.jpg`
//! - **Placeholder**: a fixed key such as `none.jpg`
//!
//! Keys must not contain `..` or a leading `/`. Key generation lives in the
//! `keys` module so writers and readers agree on the layout.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use traits::{ByteStream, SizedStream, Storage, StorageError, StorageResult};
