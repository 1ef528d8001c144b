//! Metrics declaration and recording helpers.
//!
//! Everything here compiles to no-ops unless the `metrics` feature is
//! enabled.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Fetch metrics

    /// Track fetches answered from the cache.
    pub static ref FETCH_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "livebox_fetch_hit_total",
            "Total number of fetches answered from a fresh cache entry."
        );
        "livebox_fetch_hit_total"
    };
    /// Track fetches that ran the loader.
    pub static ref FETCH_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "livebox_fetch_miss_total",
            "Total number of fetches that ran the loader."
        );
        "livebox_fetch_miss_total"
    };
    /// Track fetches that joined an in-flight loader call.
    pub static ref FETCH_SHARED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "livebox_fetch_shared_total",
            "Total number of fetches that awaited another caller's loader call."
        );
        "livebox_fetch_shared_total"
    };
    /// Track failed loader calls.
    pub static ref FETCH_ERROR_COUNTER: &'static str = {
        metrics::describe_counter!(
            "livebox_fetch_error_total",
            "Total number of failed loader calls."
        );
        "livebox_fetch_error_total"
    };
    /// Histogram of loader durations.
    pub static ref LOADER_DURATION: &'static str = {
        metrics::describe_histogram!(
            "livebox_loader_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of loader calls in seconds."
        );
        "livebox_loader_duration_seconds"
    };

    // Realtime metrics

    /// Gauge of open realtime channels.
    pub static ref CHANNELS_OPEN: &'static str = {
        metrics::describe_gauge!(
            "livebox_channels_open",
            "Number of currently open realtime channels."
        );
        "livebox_channels_open"
    };
    /// Track delivered push events.
    pub static ref PUSH_EVENTS: &'static str = {
        metrics::describe_counter!(
            "livebox_push_events_total",
            "Total number of realtime changes delivered to subscribers."
        );
        "livebox_push_events_total"
    };

    // Mutation metrics

    /// Track confirmed optimistic mutations.
    pub static ref MUTATIONS_CONFIRMED: &'static str = {
        metrics::describe_counter!(
            "livebox_mutations_confirmed_total",
            "Total number of optimistic mutations confirmed by the server."
        );
        "livebox_mutations_confirmed_total"
    };
    /// Track reverted optimistic mutations.
    pub static ref MUTATIONS_ROLLED_BACK: &'static str = {
        metrics::describe_counter!(
            "livebox_mutations_rolled_back_total",
            "Total number of optimistic mutations whose remote call failed."
        );
        "livebox_mutations_rolled_back_total"
    };
}

/// How a fetch was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh cache entry.
    Hit,
    /// Loader ran.
    Miss,
    /// Joined an in-flight loader call.
    Shared,
    /// Loader failed.
    Error,
}

/// Records one fetch.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch(resource: &str, outcome: FetchOutcome) {
    let name = match outcome {
        FetchOutcome::Hit => *FETCH_HIT_COUNTER,
        FetchOutcome::Miss => *FETCH_MISS_COUNTER,
        FetchOutcome::Shared => *FETCH_SHARED_COUNTER,
        FetchOutcome::Error => *FETCH_ERROR_COUNTER,
    };
    metrics::counter!(name, "resource" => resource.to_string()).increment(1);
}

/// Records one fetch (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch(_resource: &str, _outcome: FetchOutcome) {}

/// Records the duration of a loader call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_loader_duration(resource: &str, duration: Duration) {
    metrics::histogram!(*LOADER_DURATION, "resource" => resource.to_string())
        .record(duration.as_secs_f64());
}

/// Records the duration of a loader call (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_loader_duration(_resource: &str, _duration: Duration) {}

/// Records a channel opening.
#[cfg(feature = "metrics")]
#[inline]
pub fn channel_opened(resource: &str) {
    metrics::gauge!(*CHANNELS_OPEN, "resource" => resource.to_string()).increment(1.0);
}

/// Records a channel opening (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn channel_opened(_resource: &str) {}

/// Records a channel closing.
#[cfg(feature = "metrics")]
#[inline]
pub fn channel_closed(resource: &str) {
    metrics::gauge!(*CHANNELS_OPEN, "resource" => resource.to_string()).decrement(1.0);
}

/// Records a channel closing (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn channel_closed(_resource: &str) {}

/// Records one delivered push event.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_push(resource: &str, kind: &'static str) {
    metrics::counter!(*PUSH_EVENTS, "resource" => resource.to_string(), "kind" => kind)
        .increment(1);
}

/// Records one delivered push event (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_push(_resource: &str, _kind: &'static str) {}

/// Records the outcome of an optimistic mutation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_mutation(operation: &'static str, confirmed: bool) {
    let name = if confirmed {
        *MUTATIONS_CONFIRMED
    } else {
        *MUTATIONS_ROLLED_BACK
    };
    metrics::counter!(name, "operation" => operation).increment(1);
}

/// Records the outcome of an optimistic mutation (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_mutation(_operation: &'static str, _confirmed: bool) {}
