//! Backend metrics.
//!
//! Enable the `metrics` feature to record them.
//!
//! - `livebox_backend_reads_total{backend, result="hit|miss"}`
//! - `livebox_backend_writes_total{backend}`

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for backend reads.
    pub static ref BACKEND_READS: &'static str = {
        metrics::describe_counter!(
            "livebox_backend_reads_total",
            "Total number of cache backend reads, labeled by hit or miss."
        );
        "livebox_backend_reads_total"
    };

    /// Metric name for backend writes.
    pub static ref BACKEND_WRITES: &'static str = {
        metrics::describe_counter!(
            "livebox_backend_writes_total",
            "Total number of cache backend writes."
        );
        "livebox_backend_writes_total"
    };
}

/// Records one backend read.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_read(backend: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(*BACKEND_READS, "backend" => backend.to_string(), "result" => result)
        .increment(1);
}

/// Records one backend read (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_read(_backend: &str, _hit: bool) {}

/// Records one backend write.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_write(backend: &str) {
    metrics::counter!(*BACKEND_WRITES, "backend" => backend.to_string()).increment(1);
}

/// Records one backend write (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_write(_backend: &str) {}
