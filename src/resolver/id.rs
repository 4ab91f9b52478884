//! Unique element identifiers
//!
//! Ids look like `bleak-{type}-{index}-{timestamp_ms}-{counter}`. The
//! counter is process-wide and never repeats, so two elements rendered in
//! the same millisecond at the same index still get distinct ids.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static ELEMENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Next value of the process-wide counter, starting at 1
pub fn next_counter() -> u64 {
    ELEMENT_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

pub fn format_unique_id(kind: &str, index: usize, timestamp_ms: i64, counter: u64) -> String {
    format!("bleak-{kind}-{index}-{timestamp_ms}-{counter}")
}

/// Source of per-render element ids
pub trait IdGenerator: Send + Sync {
    fn generate(&self, kind: &str, index: usize) -> String;
}

/// Wall-clock timestamp plus the process-wide counter
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicIds;

impl IdGenerator for MonotonicIds {
    fn generate(&self, kind: &str, index: usize) -> String {
        format_unique_id(kind, index, Utc::now().timestamp_millis(), next_counter())
    }
}
