//! Picode Services Layer
//!
//! Orchestration on top of the pool, storage and processing crates: handing
//! out short codes and turning an upload into stored artifacts under a
//! claimed code. The API crate only talks to this layer and re-exported
//! types.

pub mod allocator;
pub mod ingestion;

pub use allocator::{CodeLease, NameAllocator};
pub use ingestion::{IngestedImage, IngestionPipeline, IngestionSettings};
pub use picode_storage::{create_storage, LocalStorage, Storage, StorageError, StorageResult};
