use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PlacesError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PlacesError::Parse(err.to_string())
        } else {
            PlacesError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PlacesError {
    fn from(err: serde_json::Error) -> Self {
        PlacesError::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to read {path}: {message}")]
    File { path: String, message: String },

    #[error("{path} row {row}: {message}")]
    Row {
        path: String,
        row: u64,
        message: String,
    },

    #[error(transparent)]
    Places(#[from] PlacesError),
}
