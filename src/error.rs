//! Error type shared by the library and the command-line front-end

use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for application-specific errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("downloader executable not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (code={code:?}) {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0} is not supported by this backend")]
    Unsupported(String),

    #[error("no preset named '{0}'")]
    PresetNotFound(String),

    #[error("preset '{0}' is predefined and cannot be changed")]
    PredefinedPreset(String),

    #[error("a preset named '{0}' already exists")]
    DuplicatePreset(String),

    #[error("'{0}' does not look like a downloadable link")]
    InvalidUrl(String),

    #[error("install failed: {0}")]
    InstallFailed(String),

    #[error("failed to initialize logging at {path}: {message}")]
    Logging { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
