use picode_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unsupported or corrupt image: {0}")]
    Decode(String),

    #[error("Failed to encode {format}: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Encoded image is {size} bytes, limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Decode(msg) => AppError::ImageDecode(msg),
            ProcessingError::TooLarge { size, max } => AppError::ImageTooLarge { size, max },
            encode @ ProcessingError::Encode { .. } => AppError::ImageEncode(encode.to_string()),
        }
    }
}
