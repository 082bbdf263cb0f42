//! Error types for marketplace operations.

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors that abort a marketplace operation.
///
/// A failed integrity check is not an error; it is reported through
/// [`InstallResult::IntegrityFailure`](super::installer::InstallResult).
#[derive(Debug)]
pub enum MarketplaceError {
    /// The catalog answered a slug lookup with a non-success status
    SlugResolution { slug: String, status: StatusCode },

    /// The catalog answered a version lookup with a non-success status
    VersionFetch {
        item_id: String,
        version: String,
        status: StatusCode,
    },

    /// The catalog rejected a usage-count increment
    UsageCount { item_id: String, status: StatusCode },

    /// The archive host answered with a non-success status
    Download { url: String, status: StatusCode },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    Transport {
        operation: &'static str,
        url: String,
        source: reqwest::Error,
    },

    /// The catalog response body could not be decoded
    CatalogResponse {
        operation: &'static str,
        source: reqwest::Error,
    },

    /// A catalog URL could not be built from the configured base URL
    InvalidUrl { url: String, reason: String },

    /// The slug would place the install directory outside its category
    InvalidSlug { slug: String },

    /// An archive entry would be written outside the target directory
    UnsafeArchiveEntry { entry: String },

    /// Archive extraction failed
    ExtractionFailed {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error locating the user's home directory
    HomeDirectory,

    /// Error performing I/O operations
    Io { source: std::io::Error },

    /// Error serializing or parsing JSON
    JsonParse { source: serde_json::Error },
}

impl fmt::Display for MarketplaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlugResolution { slug, status } => {
                write!(f, "Failed to resolve slug '{slug}': HTTP {status}")
            }
            Self::VersionFetch {
                item_id,
                version,
                status,
            } => write!(
                f,
                "Failed to fetch version '{version}' of item '{item_id}': HTTP {status}"
            ),
            Self::UsageCount { item_id, status } => write!(
                f,
                "Failed to increment usage count for item '{item_id}': HTTP {status}"
            ),
            Self::Download { url, status } => {
                write!(f, "Download failed for {url}: HTTP {status}")
            }
            Self::Transport {
                operation,
                url,
                source,
            } => write!(f, "Failed to {operation} ({url}): {source}"),
            Self::CatalogResponse { operation, source } => {
                write!(f, "Invalid catalog response during {operation}: {source}")
            }
            Self::InvalidUrl { url, reason } => write!(f, "Invalid URL '{url}': {reason}"),
            Self::InvalidSlug { slug } => {
                write!(f, "Invalid slug: path traversal detected in \"{slug}\"")
            }
            Self::UnsafeArchiveEntry { entry } => {
                write!(f, "Archive entry escapes the install directory: \"{entry}\"")
            }
            Self::ExtractionFailed { path, source } => {
                write!(f, "Failed to extract archive into {}: {source}", path.display())
            }
            Self::HomeDirectory => write!(f, "Could not determine the home directory"),
            Self::Io { source } => write!(f, "I/O error: {source}"),
            Self::JsonParse { source } => write!(f, "Failed to parse JSON: {source}"),
        }
    }
}

impl std::error::Error for MarketplaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::CatalogResponse { source, .. } => Some(source),
            Self::ExtractionFailed { source, .. } => Some(source.as_ref()),
            Self::Io { source } => Some(source),
            Self::JsonParse { source } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MarketplaceError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<serde_json::Error> for MarketplaceError {
    fn from(source: serde_json::Error) -> Self {
        Self::JsonParse { source }
    }
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketplaceError>;
