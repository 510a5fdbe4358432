//! Unified error type for the weather-alert workspace.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unrecognized {kind} label: {label:?}")]
    UnrecognizedLabel { kind: &'static str, label: String },

    #[error("Upstream fetch failed: {0}")]
    Upstream(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn unrecognized(kind: &'static str, label: impl Into<String>) -> Self {
        Error::UnrecognizedLabel {
            kind,
            label: label.into(),
        }
    }
}
