//! Error types for native library provisioning

use std::path::PathBuf;
use thiserror::Error;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur while provisioning native libraries
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The library is not in the catalog
    #[error("Native library not available: {0}")]
    NotFound(String),

    /// The catalog is empty (not initialized, or nothing could be extracted)
    #[error("Native libraries have not been provisioned")]
    NotInitialized,

    /// The bundle has no resource for the library
    #[error("No bundled resource for {0}")]
    MissingResource(String),

    /// Filesystem error at a specific path
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ProvisionError> for soul_core::SoulError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::NotFound(name) => soul_core::SoulError::not_found("Native library", name),
            ProvisionError::NotInitialized => {
                soul_core::SoulError::NotInitialized("native library catalog".to_string())
            }
            ProvisionError::Io { source, .. } => soul_core::SoulError::Io(source),
            other => soul_core::SoulError::Other(other.to_string()),
        }
    }
}
