//! Upload ingestion pipeline
//!
//! decode → encode under ceiling → lease code → render thumbnail → write → claim
//!
//! The claim is the last step and happens only once both artifacts are on
//! disk. Any failure before it leaves the code free. Artifacts are removed
//! again when a write fails, or when the upload is dropped before its claim
//! resolves and the row is still free. Once a claim has been attempted the
//! files under that code are left alone: a lost race means they belong to
//! the winner, and a failed claim may still have committed.

use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use picode_core::models::UploaderInfo;
use picode_core::{AppError, Code, Config};
use picode_db::CodePool;
use picode_processing::{
    decode_image, encode_within_ceiling, render_thumbnail_jpeg, EncodedImage, ImageEncoding,
    ThumbnailSpec,
};
use picode_storage::keys::{image_key, mini_key};
use picode_storage::Storage;

use crate::allocator::{CodeLease, NameAllocator};

/// Tunables of the pipeline, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub max_image_size_bytes: usize,
    pub jpeg_quality: u8,
    pub thumbnail: ThumbnailSpec,
    /// Drawn in front of the code in the thumbnail caption.
    pub caption_prefix: String,
    /// Bound on lost claim races per upload.
    pub max_attempts: u32,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            max_image_size_bytes: 2 * 1024 * 1024,
            jpeg_quality: 85,
            thumbnail: ThumbnailSpec::default(),
            caption_prefix: String::new(),
            max_attempts: 8,
        }
    }
}

impl IngestionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_image_size_bytes: config.max_image_size_bytes(),
            jpeg_quality: config.jpeg_quality(),
            thumbnail: ThumbnailSpec::new(config.thumbnail_width(), config.thumbnail_height()),
            caption_prefix: config.caption_prefix().to_string(),
            max_attempts: config.allocation_max_attempts(),
        }
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedImage {
    pub code: Code,
    pub encoding: ImageEncoding,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
}

/// Decoded upload with its chosen stored encoding.
struct PreparedImage {
    image: Arc<DynamicImage>,
    encoded: EncodedImage,
}

/// Artifacts written under a code whose claim has not resolved yet.
///
/// Dropped while armed, it removes them in the background provided the row
/// is still free by then.
struct PendingArtifacts {
    storage: Arc<dyn Storage>,
    pool: Arc<dyn CodePool>,
    code: Code,
    encoding: ImageEncoding,
    armed: bool,
}

impl PendingArtifacts {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingArtifacts {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(code = %self.code, "Upload dropped outside a runtime, artifacts left in place");
            return;
        };

        tracing::warn!(code = %self.code, "Upload dropped before claim, removing its artifacts");
        let storage = Arc::clone(&self.storage);
        let pool = Arc::clone(&self.pool);
        let code = self.code.clone();
        let encoding = self.encoding;
        runtime.spawn(async move {
            match pool.get(&code).await {
                Ok(Some(row)) if !row.free => {
                    tracing::info!(code = %code, "Code was claimed before the upload was dropped");
                }
                Ok(_) => remove_artifacts(storage.as_ref(), &code, encoding).await,
                Err(e) => {
                    tracing::warn!(code = %code, error = %e, "Cannot verify code, leaving artifacts in place");
                }
            }
        });
    }
}

pub struct IngestionPipeline {
    allocator: Arc<NameAllocator>,
    storage: Arc<dyn Storage>,
    settings: IngestionSettings,
}

impl IngestionPipeline {
    pub fn new(
        allocator: Arc<NameAllocator>,
        storage: Arc<dyn Storage>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            allocator,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Store an uploaded image and return the code it was claimed under.
    ///
    /// Decode and size errors are reported before a code is touched. A lost
    /// claim race is retried with a fresh code and never reaches the caller
    /// unless it keeps happening.
    #[tracing::instrument(skip(self, data), fields(upload.size_bytes = data.len()))]
    pub async fn ingest(
        &self,
        data: Bytes,
        uploader: UploaderInfo,
    ) -> Result<IngestedImage, AppError> {
        let start = std::time::Instant::now();

        // 1-4. Decode and pick the stored encoding, no side effects yet
        let prepared = self.prepare(data).await?;
        let encoding = prepared.encoded.encoding;

        for attempt in 1..=self.settings.max_attempts {
            // 5. Lease a free code
            let lease = self.allocator.allocate().await?;
            let code = lease.code().clone();

            // 6. Render the thumbnail captioned with the code
            let thumbnail = self.render_thumbnail(&prepared, &code).await?;

            // 7. Write thumbnail and full image
            let mut pending = self.pending_artifacts(&code, encoding);
            if let Err(e) = self.write_artifacts(&code, thumbnail, &prepared.encoded).await {
                tracing::error!(code = %code, error = %e, "Failed to store image artifacts");
                pending.disarm();
                remove_artifacts(self.storage.as_ref(), &code, encoding).await;
                return Err(e);
            }

            // 8. Claim, only now is the code used up
            let claimed = self.claim(&lease, &uploader).await;
            pending.disarm();

            match claimed {
                Ok(true) => {
                    self.remove_stale_alternate(&code, encoding).await;

                    let (width, height) = (prepared.image.width(), prepared.image.height());
                    tracing::info!(
                        code = %code,
                        encoding = encoding.extension(),
                        size_bytes = prepared.encoded.bytes.len(),
                        width,
                        height,
                        attempt,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Image stored"
                    );
                    return Ok(IngestedImage {
                        code,
                        encoding,
                        size_bytes: prepared.encoded.bytes.len(),
                        width,
                        height,
                    });
                }
                Ok(false) => {
                    // the files under this code are the winner's now
                    tracing::warn!(code = %code, attempt, "Lost claim race, retrying with a new code");
                }
                Err(e) => {
                    tracing::error!(code = %code, error = %e, "Failed to claim code, leaving artifacts in place");
                    return Err(e);
                }
            }
        }

        Err(AppError::AllocationFailed {
            attempts: self.settings.max_attempts,
        })
    }

    async fn prepare(&self, data: Bytes) -> Result<PreparedImage, AppError> {
        let max_bytes = self.settings.max_image_size_bytes;
        let quality = self.settings.jpeg_quality;

        let prepared = tokio::task::spawn_blocking(move || {
            let image = decode_image(&data)?;
            let encoded = encode_within_ceiling(&image, max_bytes, quality)?;
            Ok::<_, AppError>(PreparedImage {
                image: Arc::new(image),
                encoded,
            })
        })
        .await
        .map_err(|e| AppError::Internal(format!("Image processing task failed: {}", e)))??;

        Ok(prepared)
    }

    async fn render_thumbnail(
        &self,
        prepared: &PreparedImage,
        code: &Code,
    ) -> Result<Vec<u8>, AppError> {
        let image = Arc::clone(&prepared.image);
        let caption = format!("{}{}", self.settings.caption_prefix, code);
        let spec = self.settings.thumbnail;

        let thumbnail =
            tokio::task::spawn_blocking(move || render_thumbnail_jpeg(&image, &caption, spec))
                .await
                .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {}", e)))??;

        Ok(thumbnail)
    }

    fn pending_artifacts(&self, code: &Code, encoding: ImageEncoding) -> PendingArtifacts {
        PendingArtifacts {
            storage: Arc::clone(&self.storage),
            pool: Arc::clone(self.allocator.pool()),
            code: code.clone(),
            encoding,
            armed: true,
        }
    }

    async fn write_artifacts(
        &self,
        code: &Code,
        thumbnail: Vec<u8>,
        encoded: &EncodedImage,
    ) -> Result<(), AppError> {
        self.storage
            .upload_with_key(&mini_key(code), thumbnail, ImageEncoding::Jpeg.to_mime_type())
            .await?;

        self.storage
            .upload_with_key(
                &image_key(code, encoded.encoding.extension()),
                encoded.bytes.clone(),
                encoded.encoding.to_mime_type(),
            )
            .await?;

        Ok(())
    }

    async fn claim(&self, lease: &CodeLease, uploader: &UploaderInfo) -> Result<bool, AppError> {
        self.allocator.claim(lease, uploader).await
    }

    /// A leftover under the other extension would shadow or duplicate the
    /// image just claimed.
    async fn remove_stale_alternate(&self, code: &Code, encoding: ImageEncoding) {
        let stale = image_key(code, encoding.alternate().extension());
        if let Err(e) = self.storage.delete(&stale).await {
            tracing::warn!(key = %stale, error = %e, "Failed to remove stale image");
        }
    }
}

/// Best-effort removal of everything written under an unclaimed code.
async fn remove_artifacts(storage: &dyn Storage, code: &Code, encoding: ImageEncoding) {
    for key in [mini_key(code), image_key(code, encoding.extension())] {
        if let Err(e) = storage.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Failed to remove artifact of unclaimed code");
        }
    }
}
