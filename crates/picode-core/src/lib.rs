//! Picode Core Library
//!
//! Domain types shared by every picode crate: the short code and its
//! keyspace, the allocation cursor, pool models, error types and
//! configuration.

pub mod code;
pub mod config;
pub mod error;
pub mod models;
pub mod pool_types;

// Re-export commonly used types
pub use code::{AllocationCursor, Code, CodeError, KeyspaceError, KEYSPACE_SIZE};
pub use config::{BaseConfig, Config, ImageHostConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{PoolRow, PoolStats, UploaderInfo};
pub use pool_types::PoolBackend;
