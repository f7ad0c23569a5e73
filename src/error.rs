//! Error types shared by every asset operation.
//!
//! `AssetError` is `Clone` so that a single failed fetch can be handed to
//! every caller that was waiting on it.

use thiserror::Error;

use crate::state::data::Category;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AssetError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// Transport failure (DNS, connect, timeout, body read)
    #[error("network failure fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Manifest JSON could not be parsed
    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    /// Requested asset is absent from a decoded bundle
    #[error("asset '{asset}' not found in bundle '{bundle}'")]
    ResourceNotFound { bundle: String, asset: String },

    /// Lookup before any selection finished for the category
    #[error("no {0} bundle has been loaded yet")]
    NotLoaded(Category),

    /// Bundle payload is not a readable archive or an entry is not an image
    #[error("failed to decode bundle '{bundle}': {message}")]
    Decode { bundle: String, message: String },

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The task performing a shared fetch ended without publishing a result
    #[error("fetch of '{0}' was aborted")]
    Aborted(String),
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::ManifestParse(err.to_string())
    }
}

impl AssetError {
    /// True for failures of the transfer itself (transport or HTTP status)
    pub fn is_network(&self) -> bool {
        matches!(self, AssetError::Network { .. } | AssetError::Http { .. })
    }
}
