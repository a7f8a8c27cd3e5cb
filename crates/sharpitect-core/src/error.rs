//! Error taxonomy shared across the workspace

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharpitectError {
    /// The workspace manifest could not be opened; analysis aborts.
    #[error("failed to open workspace at {path}: {reason}")]
    WorkspaceOpen { path: String, reason: String },

    /// A project yielded no compilation; its analysis result is empty.
    #[error("no compilation available for project {0}")]
    CompilationUnavailable(String),

    /// A query target id is absent from the graph.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad argument, rejected before touching storage.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// Repository I/O failure; fatal to the in-flight operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Cooperative cancellation; non-fatal.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SharpitectError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        SharpitectError::Storage(err.to_string())
    }

    /// Stable machine-readable code for the tool protocol.
    pub fn code(&self) -> &'static str {
        match self {
            SharpitectError::WorkspaceOpen { .. } => "workspace_open_error",
            SharpitectError::CompilationUnavailable(_) => "compilation_unavailable",
            SharpitectError::NotFound(_) => "not_found",
            SharpitectError::Validation(_) => "validation_error",
            SharpitectError::Storage(_) => "storage_error",
            SharpitectError::Cancelled => "cancelled",
            SharpitectError::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SharpitectError>;
