use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for portfolio operations
#[derive(Debug, Error)]
pub enum PortfolioError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Document format errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid portfolio file: {0}")]
    InvalidSchema(String),

    // File handle errors
    #[error("Permission to access '{0}' was denied")]
    PermissionDenied(PathBuf),

    #[error("No portfolio file is open")]
    NoFile,

    // Embedded store errors
    #[error("Local storage is full. Export a backup and remove old entries before saving again")]
    QuotaExceeded,

    #[error("Local storage is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    // Cloud errors
    #[error("Not signed in. Sign in to sync with the cloud")]
    NotSignedIn,

    #[error("Cloud sync is still starting up. Try again in a moment")]
    NotReady,

    #[error("Cloud provider error: {0}")]
    Provider(String),

    // Conflicts
    #[error("The portfolio file was changed outside this session. Reload or overwrite it first")]
    ExternalModification,

    // Document errors
    #[error("Topic not found: '{0}'")]
    TopicNotFound(String),

    #[error("Entry not found: '{0}'")]
    EntryNotFound(String),

    #[error("Topic name cannot be empty")]
    EmptyTopicName,

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for portfolio operations
pub type Result<T> = std::result::Result<T, PortfolioError>;

impl PortfolioError {
    /// Variant name, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            PortfolioError::Io(_) => "Io",
            PortfolioError::FileRead { .. } => "FileRead",
            PortfolioError::FileWrite { .. } => "FileWrite",
            PortfolioError::Json(_) => "Json",
            PortfolioError::InvalidSchema(_) => "InvalidSchema",
            PortfolioError::PermissionDenied(_) => "PermissionDenied",
            PortfolioError::NoFile => "NoFile",
            PortfolioError::QuotaExceeded => "QuotaExceeded",
            PortfolioError::StoreUnavailable(_) => "StoreUnavailable",
            PortfolioError::Storage(_) => "Storage",
            PortfolioError::NotSignedIn => "NotSignedIn",
            PortfolioError::NotReady => "NotReady",
            PortfolioError::Provider(_) => "Provider",
            PortfolioError::ExternalModification => "ExternalModification",
            PortfolioError::TopicNotFound(_) => "TopicNotFound",
            PortfolioError::EntryNotFound(_) => "EntryNotFound",
            PortfolioError::EmptyTopicName => "EmptyTopicName",
            PortfolioError::ConfigParse(_) => "ConfigParse",
            PortfolioError::ConfigSerialize(_) => "ConfigSerialize",
            PortfolioError::NoConfigDir => "NoConfigDir",
        }
    }

    /// Whether the payload itself was unusable (import/load should abort with no state change)
    pub fn is_invalid_document(&self) -> bool {
        matches!(
            self,
            PortfolioError::InvalidSchema(_) | PortfolioError::Json(_)
        )
    }

    /// Convert to a serializable representation for UI consumers
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

/// A serializable representation of PortfolioError
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&PortfolioError> for SerializableError {
    fn from(err: &PortfolioError) -> Self {
        let path = match err {
            PortfolioError::FileRead { path, .. } => Some(path.clone()),
            PortfolioError::FileWrite { path, .. } => Some(path.clone()),
            PortfolioError::PermissionDenied(path) => Some(path.clone()),
            _ => None,
        };

        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            path,
        }
    }
}

impl From<PortfolioError> for SerializableError {
    fn from(err: PortfolioError) -> Self {
        SerializableError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializable_error_carries_path() {
        let err = PortfolioError::PermissionDenied(PathBuf::from("/tmp/portfolio.json"));
        let ser = err.to_serializable();
        assert_eq!(ser.kind, "PermissionDenied");
        assert_eq!(ser.path, Some(PathBuf::from("/tmp/portfolio.json")));
        assert!(ser.message.contains("/tmp/portfolio.json"));
    }

    #[test]
    fn test_invalid_document_classification() {
        assert!(PortfolioError::InvalidSchema("x".into()).is_invalid_document());
        assert!(!PortfolioError::QuotaExceeded.is_invalid_document());
        assert!(!PortfolioError::NotSignedIn.is_invalid_document());
    }
}
