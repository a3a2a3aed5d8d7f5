//! Bridge compiler errors

use std::path::PathBuf;
use thiserror::Error;

pub type BridgenResult<T> = Result<T, BridgenError>;

#[derive(Debug, Error)]
pub enum BridgenError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
