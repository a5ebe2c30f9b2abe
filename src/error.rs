//! Error types for the symbol indexing engine.
//!
//! One enum covers the whole taxonomy. Most variants are recoverable by
//! design: parse failures degrade to an empty file record, IO and version
//! trouble degrade to a re-index, and query-side failures degrade to
//! "symbol not found". Each carries enough context to act on.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing and query operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// AST construction failed for a file. Recovered locally: the file's
    /// record is produced empty with a parse-failure flag and indexing
    /// continues.
    #[error("Failed to parse '{uri}': {reason}")]
    Parse { uri: String, reason: String },

    /// File system errors
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

    /// Shard format version differs from the expected value. The shard is
    /// treated as missing and the file is re-indexed.
    #[error("Shard for '{uri}' has version {found}, expected {expected}")]
    VersionMismatch {
        uri: String,
        found: u32,
        expected: u32,
    },

    /// A worker task or resolver fallback did not complete in time.
    #[error("Operation '{operation}' timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Cooperative cancellation; no partial state was written.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Invariant violation. Fails loudly in tests; production queries
    /// degrade to "no result".
    #[error("Index invariant violated: {reason}")]
    Invariant { reason: String },

    /// Worker pool errors
    #[error("Worker pool failure: {reason}")]
    WorkerPool { reason: String },

    /// General errors for cases where we need to preserve context
    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::VersionMismatch { .. } => vec![
                "The shard will be regenerated on the next indexing pass",
                "Run 'smartindex index --force' to rebuild everything now",
            ],
            Self::Invariant { .. } => vec![
                "Run 'smartindex clear' followed by 'smartindex index' to rebuild from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::FileRead { .. } | Self::FileWrite { .. } => vec![
                "Check disk space and permissions in the cache directory",
                "The in-memory index stays correct; the shard is re-written on the next change",
            ],
            Self::Timeout { .. } => vec![
                "The file is marked for retry on the next indexing tick",
                "Raise indexing.max_concurrent_jobs if the machine has spare cores",
            ],
            Self::Config { .. } => vec![
                "Run 'smartindex init --force' to regenerate .smart-index/settings.toml",
            ],
            _ => vec![],
        }
    }

    /// True for failures that degrade to "symbol not found" on the query
    /// side rather than surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Invariant { .. } | Self::Config { .. })
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
