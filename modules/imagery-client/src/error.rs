use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImageryError>;

#[derive(Debug, Error)]
pub enum ImageryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ImageryError {
    fn from(err: reqwest::Error) -> Self {
        ImageryError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ImageryError {
    fn from(err: serde_json::Error) -> Self {
        ImageryError::Parse(err.to_string())
    }
}
