//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::handlers;
use crate::setup::routes::health;
use picode_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Picode API",
        version = "0.1.0",
        description = "Image host addressed by five-letter codes. Upload an image, get a code, read the image at /{code} and its thumbnail at /{code}.mini."
    ),
    paths(
        handlers::upload::upload_image,
        handlers::image_get::get_image,
        health::health_check,
    ),
    components(schemas(
        handlers::upload::UploadResponse,
        handlers::upload::UploadAnswer,
        health::HealthResponse,
        models::PoolStats,
        picode_infra::ErrorResponse,
    )),
    tags(
        (name = "images", description = "Upload and read images"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
