//! Error types for dondever

use std::fmt;

/// Unified error type for catalog operations
#[derive(Debug)]
pub enum CatalogError {
    /// No TMDB API key configured (explicit value or TMDB_API_KEY env)
    MissingApiKey,
    /// Platform has no TMDB provider id, so it cannot be synced
    MissingProviderId(String),
    /// No platform stored under the given slug
    PlatformNotFound(String),
    /// HTTP request failed (network error, timeout, etc.)
    Network(reqwest::Error),
    /// HTTP error status code
    HttpStatus(reqwest::StatusCode),
    /// Failed to parse a JSON response or snapshot payload
    Parse(serde_json::Error),
    /// Database operation failed
    Database(rusqlite::Error),
    /// Snapshot file I/O failed
    Io(std::io::Error),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::MissingApiKey => write!(
                f,
                "TMDB API key not configured. Set it explicitly or via env TMDB_API_KEY"
            ),
            CatalogError::MissingProviderId(name) => {
                write!(f, "Platform '{}' does not have a TMDB provider id set", name)
            }
            CatalogError::PlatformNotFound(slug) => {
                write!(f, "No platform with slug '{}'", slug)
            }
            CatalogError::Network(e) => write!(f, "Network error: {}", e),
            CatalogError::HttpStatus(status) => write!(f, "HTTP error: {}", status),
            CatalogError::Parse(e) => write!(f, "Parse error: {}", e),
            CatalogError::Database(e) => write!(f, "Database error: {}", e),
            CatalogError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Network(e) => Some(e),
            CatalogError::Parse(e) => Some(e),
            CatalogError::Database(e) => Some(e),
            CatalogError::Io(e) => Some(e),
            CatalogError::MissingApiKey
            | CatalogError::MissingProviderId(_)
            | CatalogError::PlatformNotFound(_)
            | CatalogError::HttpStatus(_) => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Network(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err)
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Database(err)
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

/// Result alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
