use serde::{Deserialize, Serialize};

/// Who uploaded an image. Recorded on the pool row at claim time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderInfo {
    /// Client address as seen by the server, after proxy handling.
    pub address: Option<String>,
}

impl UploaderInfo {
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}
