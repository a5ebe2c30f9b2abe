//! Log output for the indexing engine.
//!
//! Lines are stamped with seconds since startup rather than wall-clock
//! time, which is what matters when reading an indexing run: how long
//! after launch did the scan, the wave, the query happen. Levels come
//! from `[logging]` in settings, per module when configured; a `RUST_LOG`
//! value replaces the whole configured filter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use crate::config::LoggingConfig;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// `   12.043s` since process start.
struct Uptime {
    started: Instant,
}

impl Default for Uptime {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl FormatTime for Uptime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{:>9.3}s", self.started.elapsed().as_secs_f64())
    }
}

/// Flatten the logging config into an EnvFilter directive string: the
/// default level first, then one `module=level` directive per override.
fn filter_spec(config: &LoggingConfig) -> String {
    let mut spec = config.default.clone();
    for (module, level) in &config.modules {
        spec.push(',');
        spec.push_str(module);
        spec.push('=');
        spec.push_str(level);
    }
    spec
}

/// Install the subscriber. Later calls are no-ops, so library consumers
/// and tests can both call this without coordination.
pub fn init_with_config(config: &LoggingConfig) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let filter = match std::env::var("RUST_LOG") {
        Ok(overridden) => EnvFilter::new(overridden),
        Err(_) => EnvFilter::new(filter_spec(config)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(Uptime::default())
        .with_target(true)
        .try_init();
}

/// Install the subscriber with the default (quiet) configuration.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level lifecycle event, tagged with the emitting component as a
/// structured field so filters and log processors can key on it.
///
/// ```ignore
/// log_event!("watcher", "monitoring {count} files");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $($message:tt)+) => {
        tracing::info!(component = $component, $($message)+)
    };
}

/// Debug-level variant of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $($message:tt)+) => {
        tracing::debug!(component = $component, $($message)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_filter_spec_default_only() {
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules: BTreeMap::new(),
        };
        assert_eq!(filter_spec(&config), "warn");
    }

    #[test]
    fn test_filter_spec_with_module_overrides() {
        let mut modules = BTreeMap::new();
        modules.insert("indexer".to_string(), "debug".to_string());
        modules.insert("watcher".to_string(), "trace".to_string());
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules,
        };
        // BTreeMap keeps the directive order stable
        assert_eq!(filter_spec(&config), "warn,indexer=debug,watcher=trace");
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_config(&LoggingConfig::default());
    }
}
