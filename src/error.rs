use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Failed to persist price history to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Delivery failures. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
