//! Directory adapter errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory API error: {0}")]
    Api(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}
