use thiserror::Error;

/// Errors that can occur while loading a serialized query tree.
#[derive(Debug, Error)]
pub enum AstError {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AstError>;
