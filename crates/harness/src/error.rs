//! Error types for the gallery harness

use thiserror::Error;

/// Result type alias using HarnessError
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid flags for example '{name}': {reason}")]
    InvalidFlags { name: String, reason: String },

    #[error("{kind} service failed to start: {reason}")]
    ServiceStartup { kind: String, reason: String },

    #[error("{kind} service health check failed after {attempts} attempts")]
    ServiceHealthCheck { kind: String, attempts: usize },

    #[error("Renderer not found: {0}. Install node and the screenshot script")]
    RendererNotFound(String),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Artifact store error: {0}")]
    Store(String),

    #[error("Upload requested but version '{0}' marks a dirty working tree")]
    DirtyVersion(String),

    #[error("Upload requested but no store credentials are available")]
    MissingCredentials,

    #[error("Notebook error: {0}")]
    Notebook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
