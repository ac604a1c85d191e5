//! Image storage setup

use std::sync::Arc;

use anyhow::{Context, Result};
use picode_core::Config;
use picode_services::{create_storage, Storage};

/// Open the image root and check that the placeholder is present.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize image storage")?;

    let fallback = config.fallback_image();
    match storage.exists(fallback).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            fallback = %fallback,
            "Placeholder image is missing, unknown codes will get 404"
        ),
        Err(e) => {
            return Err(e).with_context(|| format!("Invalid FALLBACK_IMAGE key: {}", fallback))
        }
    }

    Ok(storage)
}
