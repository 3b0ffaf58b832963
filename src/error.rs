//! Error types for github-corpus

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for corpus operations
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Everything that can go wrong while building a corpus.
///
/// Only some of these ever leave the library: fetch failures are absorbed by
/// the searcher and the downloader, and malformed archive entries are skipped
/// by the archive filter. They still exist as values so the places that absorb
/// them can log a precise cause.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A `Link` header was present but did not follow the `<url>; rel="name"` grammar
    #[error("could not find links in header: {header:?}")]
    MalformedHeader {
        /// The complete header value
        header: String,
    },

    /// A caller passed a value the query builder cannot use
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A page or archive request failed (transport error, non-2xx status, bad payload)
    #[error("fetch of {url} failed: {reason}")]
    Fetch {
        /// The URL that was requested
        url: String,
        /// Human-readable cause
        reason: String,
    },

    /// An archive entry had no usable path below the wrapper directory
    #[error("malformed archive entry: {path:?}")]
    MalformedArchiveEntry {
        /// The entry path as stored in the archive
        path: String,
    },

    /// The archive itself could not be read
    #[error("unreadable archive: {0}")]
    Archive(String),

    /// The syntax validator failed for a reason other than "does not parse"
    #[error("syntax validator failed: {0}")]
    Validator(String),

    /// No syntax validator exists for the requested language
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Filesystem error with the path that caused it
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being created, read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CorpusError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a fetch failure for `url`
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        CorpusError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
