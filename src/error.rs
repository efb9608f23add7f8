use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("required dependencies not found in owning group: {}", .0.join(", "))]
    DependencyMissing(Vec<String>),

    #[error("version token stale for {resource}, re-run to converge")]
    ConcurrencyConflict { resource: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("pipeline already exists: {0}")]
    PipelineExists(String),

    #[error("remote platform error (status {status}): {body}")]
    RemoteServer { status: u16, body: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
