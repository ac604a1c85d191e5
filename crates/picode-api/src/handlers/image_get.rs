use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use picode_core::{AppError, Code};
use picode_services::{Storage, StorageError};
use picode_storage::keys::{content_type_for_key, image_key, mini_key, IMAGE_EXTENSIONS};
use picode_storage::SizedStream;

use crate::error::HttpAppError;
use crate::state::AppState;
use picode_infra::ErrorResponse;

const MINI_SUFFIX: &str = ".mini";

/// Stored images never change once claimed.
const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// The placeholder, and files under a code that is not claimed yet, may be
/// replaced by a later upload.
const FALLBACK_CACHE: &str = "no-cache";

/// What a request path asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageRequest {
    code: Code,
    mini: bool,
}

impl ImageRequest {
    /// `bakul` or `bakul.mini`. Anything else is not an image request.
    fn parse(name: &str) -> Option<Self> {
        let (code, mini) = match name.strip_suffix(MINI_SUFFIX) {
            Some(code) => (code, true),
            None => (name, false),
        };

        Code::parse(code).ok().map(|code| ImageRequest { code, mini })
    }

    /// Storage keys to try, in order.
    fn candidate_keys(&self) -> Vec<String> {
        if self.mini {
            vec![mini_key(&self.code)]
        } else {
            IMAGE_EXTENSIONS
                .iter()
                .map(|extension| image_key(&self.code, extension))
                .collect()
        }
    }
}

/// Serve an image or its thumbnail
///
/// Malformed codes, unknown codes and missing files all serve the
/// placeholder image with status 200.
#[utoipa::path(
    get,
    path = "/{name}",
    tag = "images",
    params(
        ("name" = String, Path, description = "Image code, optionally suffixed with `.mini` for the thumbnail")
    ),
    responses(
        (status = 200, description = "Image, thumbnail or placeholder bytes", content_type = "image/*"),
        (status = 404, description = "Placeholder image is missing", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_image"))]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, HttpAppError> {
    if let Some(request) = ImageRequest::parse(&name) {
        for key in request.candidate_keys() {
            let Some(sized) = open(state.storage.as_ref(), &key).await else {
                continue;
            };

            if !is_claimed(&state, &request.code).await {
                tracing::debug!(code = %request.code, key = %key, "Serving file of unclaimed code");
                return build_response(&key, sized, FALLBACK_CACHE);
            }

            if !request.mini {
                record_view(&state, request.code.clone());
            }
            return build_response(&key, sized, IMMUTABLE_CACHE);
        }
    }

    tracing::debug!(name = %name, "Serving placeholder image");

    let fallback = state.config.fallback_image();
    match open(state.storage.as_ref(), fallback).await {
        Some(sized) => build_response(fallback, sized, FALLBACK_CACHE),
        None => Err(AppError::NotFound("Image not found".to_string()).into()),
    }
}

/// Open `key` for streaming. Missing files and read failures both yield
/// `None` so the caller can fall back.
async fn open(storage: &dyn Storage, key: &str) -> Option<SizedStream> {
    match storage.download_stream(key).await {
        Ok(sized) => Some(sized),
        Err(StorageError::NotFound(_)) => None,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to open image, falling back");
            None
        }
    }
}

/// Only a claimed row pins the file under its code for good. Lookup
/// failures count as unclaimed.
async fn is_claimed(state: &AppState, code: &Code) -> bool {
    match state.pool.get(code).await {
        Ok(row) => row.is_some_and(|row| !row.free),
        Err(e) => {
            tracing::warn!(code = %code, error = %e, "Failed to look up code");
            false
        }
    }
}

/// Count the view off the response path.
fn record_view(state: &Arc<AppState>, code: Code) {
    let pool = state.pool.clone();
    tokio::spawn(async move {
        if let Err(e) = pool.record_view(&code).await {
            tracing::warn!(code = %code, error = %e, "Failed to record image view");
        }
    });
}

fn build_response(
    key: &str,
    sized: SizedStream,
    cache_control: &'static str,
) -> Result<Response, HttpAppError> {
    let body_stream = sized.stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for_key(key))
        .header(header::CONTENT_LENGTH, sized.content_length)
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            AppError::Internal(e.to_string()).into()
        })
}
