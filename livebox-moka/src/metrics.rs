//! Moka backend capacity metrics.
//!
//! Enable the `metrics` feature to record them.
//!
//! - `livebox_moka_entries{backend}`: current number of entries (gauge)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for cache entry count gauge.
    pub static ref MOKA_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "livebox_moka_entries",
            "Current number of entries in the Moka cache."
        );
        "livebox_moka_entries"
    };
}

/// Records the current entry count for `backend`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_capacity(backend: &str, entries: u64) {
    metrics::gauge!(*MOKA_ENTRIES, "backend" => backend.to_string()).set(entries as f64);
}

/// Records the current entry count (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_capacity(_backend: &str, _entries: u64) {}
