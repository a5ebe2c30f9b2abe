//! Counters reported by indexing runs and the stats query.

use crate::pool::PoolStats;
use std::fmt;
use std::time::Duration;

/// Outcome of one `ensure_up_to_date` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub files_removed: usize,
    pub elapsed: Duration,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scanned, {} indexed, {} skipped, {} failed, {} removed in {:.2}s",
            self.files_scanned,
            self.files_indexed,
            self.files_skipped,
            self.files_failed,
            self.files_removed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Point-in-time view of the persistent index.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundStats {
    pub files: usize,
    pub symbol_names: usize,
    pub symbol_ids: usize,
    pub reference_names: usize,
    pub cache_size_bytes: u64,
    pub pool: PoolStats,
}

impl fmt::Display for BackgroundStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} symbol names, {} symbol ids, {} referenced names, {:.1} MB on disk",
            self.files,
            self.symbol_names,
            self.symbol_ids,
            self.reference_names,
            self.cache_size_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}
