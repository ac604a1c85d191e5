//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p picode-api --test images_test`.
//! Tests use the in-memory pool and a temporary image root, so no database
//! is needed.

pub mod fixtures;

use std::sync::Arc;

use axum_test::TestServer;
use picode_api::setup::{routes, services, storage};
use picode_api::state::AppState;
use picode_core::{Config, ImageHostConfig};
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub image_root: std::path::PathBuf,
    _temp_dir: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Build the app over a fresh image root with the fallback image in place,
/// letting the caller adjust the configuration first.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut ImageHostConfig)) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let image_root = temp_dir.path().to_path_buf();

    let mut host = ImageHostConfig::for_image_root(&image_root);
    customize(&mut host);

    std::fs::write(image_root.join(&host.fallback_image), fixtures::fallback_jpeg())
        .expect("Failed to write fallback image");

    let config = Config(Box::new(host));

    let storage = storage::setup_storage(&config)
        .await
        .expect("Failed to set up storage");
    let state = services::initialize_services(&config, None, storage)
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone())
        .await
        .expect("Failed to set up routes");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        image_root,
        _temp_dir: temp_dir,
    }
}
