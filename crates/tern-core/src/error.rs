//! Error types for tern-core

use thiserror::Error;

/// Result type alias for tern operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tern server
#[derive(Debug, Error)]
pub enum Error {
    /// Request line missing, not UTF-8, or not exactly three tokens
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// No CRLFCRLF between headers and body
    #[error("Missing header/body separator")]
    MissingSeparator,

    /// Header line without exactly one `": "`
    #[error("Invalid header: {0}")]
    InvalidHeaderFormat(String),

    /// Version token other than HTTP/1.1
    #[error("Unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// Bad percent-escape or non-UTF-8 path
    #[error("Path decode error: {0}")]
    PathDecode(String),

    /// Decoded path is not a valid request URI
    #[error("URI parse error: {0}")]
    UriParse(String),

    /// Pattern and path have a different number of segments
    #[error("Segment count mismatch: pattern has {expected}, path has {found}")]
    SegmentCountMismatch { expected: usize, found: usize },

    /// Route not found
    #[error("Route not found: {0}")]
    NoRouteMatch(String),

    /// Buffered request exceeds the configured limit
    #[error("Request too large: {size} bytes exceeds limit of {limit} bytes")]
    RequestTooLarge { size: usize, limit: usize },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert a router mismatch for `path` into an error
    pub fn from_mismatch(mismatch: tern_router::Mismatch, path: &str) -> Self {
        match mismatch {
            tern_router::Mismatch::SegmentCount { expected, found } => {
                Error::SegmentCountMismatch { expected, found }
            }
            tern_router::Mismatch::Segment { .. } => Error::NoRouteMatch(path.to_string()),
        }
    }
}
