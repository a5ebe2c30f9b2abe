//! Configuration module for the symbol indexing engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SI_` and use double
//! underscores to separate nested levels:
//! - `SI_INDEXING__MAX_CONCURRENT_JOBS=8` sets `indexing.max_concurrent_jobs`
//! - `SI_WATCHER__DEBOUNCE_MS=300` sets `watcher.debounce_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Hard excludes applied regardless of user patterns: dependency stores,
/// VCS metadata, build outputs, and the cache directory itself.
pub const HARD_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "dist",
    "build",
    "out",
    ".next",
    "coverage",
];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Cache subdirectory under the workspace root
    #[serde(default = "default_cache_directory")]
    pub cache_directory: PathBuf,

    /// Workspace root; discovered at load time, not persisted
    #[serde(default, skip_serializing)]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// User glob patterns excluded from indexing, in addition to the
    /// unconditional hard excludes
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Files above this size are skipped with a log, not an error
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Soft cache size limit; exceeding it logs a warning
    #[serde(default = "default_max_cache_size_mb")]
    pub max_cache_size_mb: u64,

    /// Worker pool size, clamped to 1..=16
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Per-task parse timeout in milliseconds
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// When true, an external VCS watcher supplies change sets in addition
    /// to filesystem events
    #[serde(default = "default_false")]
    pub enable_git_integration: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Property-chain resolution may delegate to a type-backed fallback
    Hybrid,
    Standalone,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_mode")]
    pub mode: ResolverMode,

    /// Timeout for the type-backed fallback in hybrid mode
    #[serde(default = "default_hybrid_timeout_ms")]
    pub hybrid_timeout_ms: u64,

    /// Module specifier aliases from project config, e.g. `"@app/" -> ["src/"]`
    #[serde(default)]
    pub path_aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// Debounce window for change events in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_cache_directory() -> PathBuf {
    PathBuf::from(".smart-index")
}
fn default_max_file_size() -> u64 {
    1024 * 1024
}
fn default_max_cache_size_mb() -> u64 {
    512
}
fn default_max_concurrent_jobs() -> usize {
    num_cpus::get().saturating_sub(1).clamp(1, 16)
}
fn default_task_timeout_ms() -> u64 {
    10_000
}
fn default_false() -> bool {
    false
}
fn default_mode() -> ResolverMode {
    ResolverMode::Standalone
}
fn default_hybrid_timeout_ms() -> u64 {
    200
}
fn default_debounce_ms() -> u64 {
    600
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_directory: default_cache_directory(),
            workspace_root: None,
            indexing: IndexingConfig::default(),
            resolver: ResolverConfig::default(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec!["**/*.min.js".to_string(), "**/*.generated.*".to_string()],
            max_file_size: default_max_file_size(),
            max_cache_size_mb: default_max_cache_size_mb(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            task_timeout_ms: default_task_timeout_ms(),
            enable_git_integration: false,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            hybrid_timeout_ms: default_hybrid_timeout_ms(),
            path_aliases: BTreeMap::new(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, figment::Error> {
        let (workspace_root, config_path) = match Self::find_workspace_root() {
            Some(root) => {
                let path = root.join(".smart-index/settings.toml");
                (Some(root), path)
            }
            None => (None, PathBuf::from(".smart-index/settings.toml")),
        };

        let mut settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nesting levels; single underscore
            // stays inside field names
            .merge(Env::prefixed("SI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()?;

        settings.workspace_root = workspace_root;
        settings.indexing.max_concurrent_jobs = settings.indexing.max_concurrent_jobs.clamp(1, 16);
        Ok(settings)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        let mut settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .extract()?;
        settings.indexing.max_concurrent_jobs = settings.indexing.max_concurrent_jobs.clamp(1, 16);
        Ok(settings)
    }

    /// Find the workspace root by looking for a .smart-index directory,
    /// searching from the current directory up to the filesystem root
    pub fn find_workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            if ancestor.join(".smart-index").is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }
        None
    }

    /// Absolute cache directory for a given workspace root
    pub fn cache_dir(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.cache_directory)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let parent = path.parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        let temp = path.with_extension("toml.tmp");
        std::fs::write(&temp, toml_string)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    /// Create a default settings file under the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".smart-index/settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
