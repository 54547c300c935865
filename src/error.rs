use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostframeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{}: duration {:.1}s exceeds ceiling of {:.1}s", .path.display(), .duration, .limit)]
    SizeExceeded {
        path: PathBuf,
        duration: f64,
        limit: f64,
    },

    #[error("{description} failed (exit code {exit_code:?}): {stderr}")]
    Process {
        description: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("expected output does not exist: {}", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, PostframeError>;
