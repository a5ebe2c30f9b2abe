//! Common utilities shared across modules.

use chrono::Utc;
use sha2::{Digest, Sha256};

/// SHA256 hash of content as a lowercase hex string.
pub fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// First `len` hex characters of the SHA256 of `input`.
///
/// Used for stable symbol ids (8 chars of the URI hash, 4 chars of the
/// signature hash) and for shard path fan-out.
pub fn short_hash(input: &str, len: usize) -> String {
    let mut full = calculate_hash(input);
    full.truncate(len);
    full
}

/// Get current UTC timestamp in seconds since UNIX_EPOCH.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// File modification time in milliseconds since UNIX_EPOCH.
///
/// Returns 0 for files whose mtime predates the epoch; such files always
/// compare unequal to a recorded mtime and get re-indexed.
pub fn mtime_millis(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
