use std::sync::Arc;

use picode_core::Config;

use crate::{LocalStorage, Storage, StorageResult};

/// Create the storage backend for the configured image root.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let root = config.image_root();
    tracing::info!(image_root = %root.display(), "Initializing local image storage");

    let storage = LocalStorage::new(root.clone()).await?;
    Ok(Arc::new(storage))
}

#[cfg(test)]
mod tests {
    use picode_core::{Config, ImageHostConfig};

    use super::*;

    #[tokio::test]
    async fn test_create_storage_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scr");
        let config = Config(Box::new(ImageHostConfig::for_image_root(&root)));

        let storage = create_storage(&config).await.unwrap();
        assert!(root.is_dir());
        assert!(!storage.exists("none.jpg").await.unwrap());
    }
}
