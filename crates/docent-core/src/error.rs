use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend rejected the request ({0})")]
    ClientRejected(u16),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,
}

impl DocentError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocentError>;
