use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("IO error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Template rendering error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Model error: {0}")]
    Model(#[from] candle_core::Error),

    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference runtime error: {0}")]
    Runtime(String),

    #[error("Missing model file: {}", .0.display())]
    MissingModelFile(PathBuf),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("No turn is waiting for a reply")]
    NoPendingTurn,

    #[error("Configuration error: {0}")]
    Config(String),
}

// The tokenizers error is a boxed dyn error, keep it out of the public type.
impl From<tokenizers::Error> for ChatError {
    fn from(err: tokenizers::Error) -> Self {
        ChatError::Tokenizer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
