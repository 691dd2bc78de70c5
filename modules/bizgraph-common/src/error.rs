use thiserror::Error;

#[derive(Error, Debug)]
pub enum BizGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
