//! Application state shared by every handler.

use std::sync::Arc;

use picode_core::Config;
use picode_db::CodePool;
use picode_services::{IngestionPipeline, NameAllocator, Storage};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: Arc<dyn CodePool>,
    pub storage: Arc<dyn Storage>,
    pub allocator: Arc<NameAllocator>,
    pub ingestion: Arc<IngestionPipeline>,
}
