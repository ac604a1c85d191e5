use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use picode_core::models::UploaderInfo;
use picode_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;
use picode_infra::ErrorResponse;

/// Multipart field carrying the image in protocol version 1.
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// `0` (default): raw image body, plain-text code in response.
    /// `1`: multipart field `image`, JSON response.
    version: Option<String>,
}

/// Upload protocol spoken by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadVersion {
    Raw,
    Multipart,
}

impl UploadVersion {
    fn parse(version: Option<&str>) -> Result<Self, AppError> {
        match version.map(str::trim) {
            None | Some("0") => Ok(UploadVersion::Raw),
            Some("1") => Ok(UploadVersion::Multipart),
            Some(other) => Err(AppError::BadRequest(format!(
                "Incorrect version: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadAnswer {
    /// Code of the stored image; the image is served at `/{url}`.
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub answer: UploadAnswer,
}

/// Upload an image
///
/// The image is re-encoded (lossless if it fits under the size ceiling,
/// lossy otherwise), thumbnailed and stored under a freshly claimed code.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "images",
    params(UploadQuery),
    request_body(
        content = Vec<u8>,
        content_type = "application/octet-stream",
        description = "Raw image bytes (version 0) or multipart/form-data with an `image` field (version 1)"
    ),
    responses(
        (status = 200, description = "Image stored; plain-text code for version 0", body = UploadResponse),
        (status = 400, description = "Unknown version or undecodable image", body = ErrorResponse),
        (status = 413, description = "Image too large under both encodings", body = ErrorResponse),
        (status = 503, description = "No code could be allocated", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(version = ?query.version, client_ip = ?client_ip))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    ClientIp(client_ip): ClientIp,
    request: Request,
) -> Result<Response, HttpAppError> {
    let version = UploadVersion::parse(query.version.as_deref())?;

    let data = match version {
        UploadVersion::Raw => Bytes::from_request(request, &state).await?,
        UploadVersion::Multipart => {
            let multipart = Multipart::from_request(request, &state).await?;
            extract_image_field(multipart).await?
        }
    };

    let uploader = client_ip
        .map(UploaderInfo::from_address)
        .unwrap_or_else(UploaderInfo::anonymous);

    let stored = state.ingestion.ingest(data, uploader).await?;
    let code = stored.code.to_string();

    let response = match version {
        UploadVersion::Raw => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            code,
        )
            .into_response(),
        UploadVersion::Multipart => (
            StatusCode::OK,
            Json(UploadResponse {
                success: true,
                answer: UploadAnswer { url: code },
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// Bytes of the `image` field; other fields are skipped.
async fn extract_image_field(mut multipart: Multipart) -> Result<Bytes, HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }

    Err(AppError::BadRequest(format!("Missing multipart field '{}'", IMAGE_FIELD)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!(UploadVersion::parse(None).unwrap(), UploadVersion::Raw);
        assert_eq!(UploadVersion::parse(Some("0")).unwrap(), UploadVersion::Raw);
        assert_eq!(
            UploadVersion::parse(Some("1")).unwrap(),
            UploadVersion::Multipart
        );
        assert!(matches!(
            UploadVersion::parse(Some("2")),
            Err(AppError::BadRequest(_))
        ));
        assert!(UploadVersion::parse(Some("one")).is_err());
    }
}
