//! Configuration module
//!
//! Settings come from the environment (with an optional `.env` file) and are
//! validated once at startup.

use std::env;
use std::path::PathBuf;

use crate::pool_types::PoolBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_IMAGE_SIZE_BYTES: usize = 2 * 1024 * 1024;
const MAX_UPLOAD_BODY_BYTES: usize = 20 * 1024 * 1024;
const JPEG_QUALITY: u8 = 85;
const THUMBNAIL_WIDTH: u32 = 180;
const THUMBNAIL_HEIGHT: u32 = 140;
const ALLOCATION_BATCH_SIZE: usize = 100;
const ALLOCATION_MAX_ATTEMPTS: u32 = 8;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Smallest canvas that still leaves room for the caption band.
const MIN_THUMBNAIL_DIM: u32 = 32;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub http_concurrency_limit: usize,
    pub request_timeout_secs: u64,
    pub trusted_proxy_count: usize,
}

/// Image host configuration
#[derive(Clone, Debug)]
pub struct ImageHostConfig {
    pub base: BaseConfig,
    pub pool_backend: PoolBackend,
    pub database_url: Option<String>,
    // Storage layout
    pub image_root: PathBuf,
    pub fallback_image: String,
    // Ingestion
    pub max_image_size_bytes: usize,
    pub max_upload_body_bytes: usize,
    pub jpeg_quality: u8,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub caption_prefix: String,
    // Allocation
    pub allocation_batch_size: usize,
    pub allocation_max_attempts: u32,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ImageHostConfig>);

impl Config {
    fn as_host(&self) -> &ImageHostConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_host().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ImageHostConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_host().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_host().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_host().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_host().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_host().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_host().base.db_timeout_seconds
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_host().base.http_concurrency_limit
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.as_host().base.request_timeout_secs
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_host().base.trusted_proxy_count
    }

    pub fn pool_backend(&self) -> PoolBackend {
        self.as_host().pool_backend
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_host().database_url.as_deref()
    }

    pub fn image_root(&self) -> &PathBuf {
        &self.as_host().image_root
    }

    pub fn fallback_image(&self) -> &str {
        &self.as_host().fallback_image
    }

    pub fn max_image_size_bytes(&self) -> usize {
        self.as_host().max_image_size_bytes
    }

    pub fn max_upload_body_bytes(&self) -> usize {
        self.as_host().max_upload_body_bytes
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.as_host().jpeg_quality
    }

    pub fn thumbnail_width(&self) -> u32 {
        self.as_host().thumbnail_width
    }

    pub fn thumbnail_height(&self) -> u32 {
        self.as_host().thumbnail_height
    }

    pub fn caption_prefix(&self) -> &str {
        &self.as_host().caption_prefix
    }

    pub fn allocation_batch_size(&self) -> usize {
        self.as_host().allocation_batch_size
    }

    pub fn allocation_max_attempts(&self) -> u32 {
        self.as_host().allocation_max_attempts
    }
}

fn is_production_env(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

/// Read `key` from the environment, keeping `default` when it is unset.
/// A value that is set but does not parse is an error.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, anyhow::Error> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, value)),
    }
}

impl ImageHostConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let pool_backend = env::var("POOL_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<PoolBackend>()?;

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
            environment,
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?,
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", 0)?,
        };

        Ok(ImageHostConfig {
            base,
            pool_backend,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            image_root: PathBuf::from(env::var("IMAGE_ROOT").unwrap_or_else(|_| "./scr".to_string())),
            fallback_image: env::var("FALLBACK_IMAGE").unwrap_or_else(|_| "none.jpg".to_string()),
            max_image_size_bytes: env_or("MAX_IMAGE_SIZE_BYTES", MAX_IMAGE_SIZE_BYTES)?,
            max_upload_body_bytes: env_or("MAX_UPLOAD_BODY_BYTES", MAX_UPLOAD_BODY_BYTES)?,
            jpeg_quality: env_or("JPEG_QUALITY", JPEG_QUALITY)?,
            thumbnail_width: env_or("THUMBNAIL_WIDTH", THUMBNAIL_WIDTH)?,
            thumbnail_height: env_or("THUMBNAIL_HEIGHT", THUMBNAIL_HEIGHT)?,
            caption_prefix: env::var("CAPTION_PREFIX").unwrap_or_default(),
            allocation_batch_size: env_or("ALLOCATION_BATCH_SIZE", ALLOCATION_BATCH_SIZE)?,
            allocation_max_attempts: env_or("ALLOCATION_MAX_ATTEMPTS", ALLOCATION_MAX_ATTEMPTS)?,
        })
    }

    /// Configuration with defaults for every setting, backed by the in-memory pool.
    pub fn for_image_root(image_root: impl Into<PathBuf>) -> Self {
        ImageHostConfig {
            base: BaseConfig {
                server_port: 4000,
                cors_origins: vec!["*".to_string()],
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                environment: "development".to_string(),
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
                request_timeout_secs: REQUEST_TIMEOUT_SECS,
                trusted_proxy_count: 0,
            },
            pool_backend: PoolBackend::Memory,
            database_url: None,
            image_root: image_root.into(),
            fallback_image: "none.jpg".to_string(),
            max_image_size_bytes: MAX_IMAGE_SIZE_BYTES,
            max_upload_body_bytes: MAX_UPLOAD_BODY_BYTES,
            jpeg_quality: JPEG_QUALITY,
            thumbnail_width: THUMBNAIL_WIDTH,
            thumbnail_height: THUMBNAIL_HEIGHT,
            caption_prefix: String::new(),
            allocation_batch_size: ALLOCATION_BATCH_SIZE,
            allocation_max_attempts: ALLOCATION_MAX_ATTEMPTS,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.pool_backend == PoolBackend::Postgres {
            match self.database_url.as_deref() {
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when POOL_BACKEND=postgres"
                    ))
                }
                Some(url) if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                Some(_) => {}
            }
        }

        if self.fallback_image.trim().is_empty() {
            return Err(anyhow::anyhow!("FALLBACK_IMAGE must not be empty"));
        }

        if self.max_image_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_SIZE_BYTES must be greater than 0"));
        }

        if self.max_upload_body_bytes < self.max_image_size_bytes {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_BODY_BYTES ({}) must be at least MAX_IMAGE_SIZE_BYTES ({})",
                self.max_upload_body_bytes,
                self.max_image_size_bytes
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be between 1 and 100"));
        }

        if self.thumbnail_width < MIN_THUMBNAIL_DIM || self.thumbnail_height < MIN_THUMBNAIL_DIM {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_WIDTH and THUMBNAIL_HEIGHT must be at least {}",
                MIN_THUMBNAIL_DIM
            ));
        }

        if self.allocation_batch_size == 0 {
            return Err(anyhow::anyhow!("ALLOCATION_BATCH_SIZE must be greater than 0"));
        }

        if self.allocation_max_attempts == 0 {
            return Err(anyhow::anyhow!("ALLOCATION_MAX_ATTEMPTS must be greater than 0"));
        }

        if is_production_env(&self.base.environment)
            && self.base.cors_origins.iter().any(|origin| origin == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        Ok(())
    }
}
