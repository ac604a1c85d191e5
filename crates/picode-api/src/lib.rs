//! Picode API Library
//!
//! HTTP surface of the image host: upload, image and thumbnail reads,
//! health and the OpenAPI document.

mod api_doc;
mod handlers;
mod utils;

pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::HttpAppError;
pub use picode_infra::ErrorResponse;
