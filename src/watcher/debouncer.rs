//! Per-URI debounce window for change events.
//!
//! Every change arms (or re-arms) a deadline one window into the future;
//! a URI becomes ready once its deadline passes with no further change.
//! Saves and deletions disarm the entry instead, since they are handled
//! immediately by the watcher loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    /// Armed deadlines: uri -> instant at which it counts as settled.
    deadlines: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            deadlines: HashMap::new(),
        }
    }

    /// Arm the URI, or push an already-armed deadline out by a full
    /// window from now.
    pub fn touch(&mut self, uri: &str) {
        self.touch_at(uri, Instant::now());
    }

    fn touch_at(&mut self, uri: &str, now: Instant) {
        self.deadlines.insert(uri.to_string(), now + self.window);
    }

    /// Disarm a URI. Returns whether it was armed.
    pub fn cancel(&mut self, uri: &str) -> bool {
        self.deadlines.remove(uri).is_some()
    }

    /// Take every URI whose window has fully elapsed, in stable order.
    pub fn drain_ready(&mut self) -> Vec<String> {
        self.drain_ready_at(Instant::now())
    }

    fn drain_ready_at(&mut self, now: Instant) -> Vec<String> {
        let mut ready: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(uri, _)| uri.clone())
            .collect();
        ready.sort();
        for uri in &ready {
            self.deadlines.remove(uri);
        }
        ready
    }

    pub fn is_idle(&self) -> bool {
        self.deadlines.is_empty()
    }
}
