//! Observability setup: structured logging and fan-out metrics.
//!
//! Metrics go through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use routedb_common::config::LoggingConfig;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with structured logging.
///
/// `RUST_LOG` wins over `config.filter`. Returns `false` when a global
/// subscriber was already installed (the existing one is kept).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::info!(filter = %config.filter, "tracing initialized");
    }
    installed
}

/// Record one fan-out call (query, update, execute).
pub fn record_fanout_metrics(op: &'static str, targets: usize, duration_us: u64, success: bool) {
    metrics::counter!("routedb_fanout_total", "op" => op, "success" => success.to_string())
        .increment(1);
    metrics::histogram!("routedb_fanout_targets", "op" => op).record(targets as f64);
    metrics::histogram!("routedb_fanout_duration_us", "op" => op).record(duration_us as f64);
}

/// Record failures captured by an administrative fan-out (cancel, close).
pub fn record_admin_failures(op: &'static str, failures: usize) {
    if failures == 0 {
        return;
    }
    metrics::counter!("routedb_admin_failures_total", "op" => op).increment(failures as u64);
}

/// Record one merged cursor built over `sources` shard cursors.
pub fn record_merge_metrics(ordered: bool, sources: usize) {
    let kind = if ordered { "ordered" } else { "concat" };
    metrics::counter!("routedb_merged_cursors_total", "kind" => kind).increment(1);
    metrics::histogram!("routedb_merged_cursor_sources", "kind" => kind).record(sources as f64);
}
