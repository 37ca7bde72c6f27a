//! Errors raised while loading, assembling and synthesizing a stack.

use std::path::PathBuf;
use thiserror::Error;

use super::types::LogicalId;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("asset file not found: {path:?}")]
    AssetNotFound { path: PathBuf },

    #[error("cannot read asset {path:?}: {source}")]
    AssetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset {path:?} changed after it was staged")]
    AssetChanged { path: PathBuf },

    #[error("duplicate logical id '{0}' in stack")]
    DuplicateLogicalId(LogicalId),

    #[error("resource '{from}' references '{to}', which has not been declared")]
    DanglingReference { from: LogicalId, to: LogicalId },

    #[error("config error: {0}")]
    Config(String),

    #[error("{} validation error(s):\n  {}", .0.len(), .0.join("\n  "))]
    Invalid(Vec<String>),

    #[error("cannot write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
