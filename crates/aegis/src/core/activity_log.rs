//! Bounded "Neural Logs" panel, newest first.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

use crate::constants::ACTIVITY_LOG_CAPACITY;

/// Lines shown when the dashboard starts.
const BOOT_LINES: [&str; 2] = ["Initializing Neural Link...", "Strategy Engine: ONLINE"];

/// Length of a write error kept in the log line (full text goes to the user).
const ERROR_EXCERPT_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub message: String,
}

/// Shared activity log. Every entry is mirrored to `tracing`.
#[derive(Debug)]
pub struct ActivityLog {
    lines: Mutex<VecDeque<LogLine>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(ACTIVITY_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let log = Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        };
        for line in BOOT_LINES.iter().rev() {
            log.push_quiet(line);
        }
        log
    }

    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "aegis::activity", "{message}");
        self.push_quiet(&message);
    }

    /// Log a failed write as `ERROR: <first 20 chars>...`.
    pub fn push_error(&self, message: &str) {
        let excerpt: String = message.chars().take(ERROR_EXCERPT_CHARS).collect();
        self.push(format!("ERROR: {excerpt}..."));
    }

    fn push_quiet(&self, message: &str) {
        let line = LogLine {
            at: Local::now(),
            message: message.to_string(),
        };
        // A poisoned lock only means a panic mid-push; the deque is still valid.
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push_front(line);
        lines.truncate(self.capacity);
    }

    /// Newest first, at most `n` lines.
    pub fn recent(&self, n: usize) -> Vec<LogLine> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
