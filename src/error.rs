use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("external tool is missing: {tool}")]
    ExternalToolMissing { tool: String },

    #[error("external tool failed: {tool} (code={code:?}) {stderr}")]
    ExternalToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("missing {what} in {}", .item.display())]
    MissingInput { item: PathBuf, what: String },

    #[error("unreadable descriptor {}: {reason}", .path.display())]
    MetadataInvalid { path: PathBuf, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Only configuration problems abort a run; everything else stays local to one item or job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConvertError::Config(_) | ConvertError::ExternalToolMissing { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
