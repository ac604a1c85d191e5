//! Data models for the code pool and uploads.

mod pool;
mod upload;

pub use pool::*;
pub use upload::*;
