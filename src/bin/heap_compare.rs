//! Heap Compare Binary
//!
//! Compares two normalized snapshot files, or runs as a spoke.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `HEAP_RECONCILER_THRESHOLD`: next-best match threshold (default: 0.7)
//! - `HEAP_RECONCILER_PROPERTY_CAP`: per-pair property cap (default: unbounded)
//! - `HEAP_RECONCILER_WORKERS`: number of spokes (default: 1)
//! - `HEAP_RECONCILER_BATCH_SIZE`: records per batch frame (default: 64)
//! - `HEAP_RECONCILER_WORKER_TIMEOUT_SECS`: spoke timeout (default: none)
//! - `HEAP_RECONCILER_SPOKES`: "process" to run spokes as child processes,
//!   "thread" for in-process spokes (default: thread)
//! - `RUST_LOG`: log level filter (default: heap_compare=info,heap_reconciler=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Logs go to stderr; stdout carries the result document, or protocol
//! frames in spoke mode.
//!
//! ## Usage
//!
//! ```bash
//! heap_compare current.json next.json > result.json
//! heap_compare spoke        # protocol over stdin/stdout
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{stdin, stdout, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heap_reconciler::comparator::SnapshotStatistics;
use heap_reconciler::hub::{LineSink, LineSource, SPOKE_SUBCOMMAND};
use heap_reconciler::{
    run_spoke, CompareOptions, ConfigError, ProcessLauncher, Snapshot, SnapshotComparator,
    SnapshotComparison, SpokeRequest, SpokeResponse, TransportError, RECONCILER_SCHEMA_VERSION,
};

/// Environment variable selecting the spoke launcher.
const ENV_SPOKES: &str = "HEAP_RECONCILER_SPOKES";

/// Binary-level failures.
#[derive(Debug, Error)]
enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("spoke failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to write result: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("usage: heap_compare <current.json> <next.json> | heap_compare spoke")]
    Usage,
}

/// Result document written to stdout.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    schema_version: &'static str,
    options: &'a CompareOptions,
    statistics: SnapshotStatistics,
    results: &'a SnapshotComparison,
}

/// Initialize the tracing subscriber with JSON or pretty format, on stderr.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "heap_compare=info,heap_reconciler=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .init();
    }
}

async fn load_snapshot(path: &Path) -> Result<Snapshot, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serve the spoke protocol on stdin/stdout until `finished`.
async fn spoke_mode() -> Result<(), LoadError> {
    let source: LineSource<_, SpokeRequest> = LineSource::new(BufReader::new(stdin()));
    let sink: LineSink<_, SpokeResponse> = LineSink::new(stdout());
    let summary = run_spoke(source, sink).await?;
    info!(
        current = summary.current_values,
        next = summary.next_values,
        matches = summary.matches,
        "spoke done"
    );
    Ok(())
}

async fn compare_mode(current_path: &Path, next_path: &Path) -> Result<(), LoadError> {
    let options = CompareOptions::from_env()?;

    let mut comparator = SnapshotComparator::new(options.clone());
    if std::env::var(ENV_SPOKES).is_ok_and(|v| v == "process") {
        comparator = comparator.with_launcher(Arc::new(ProcessLauncher::current_exe()?));
    }

    let current = load_snapshot(current_path).await?;
    let next = load_snapshot(next_path).await?;
    info!(
        current_objects = current.objects.len(),
        current_primitives = current.primitives.len(),
        next_objects = next.objects.len(),
        next_primitives = next.primitives.len(),
        "snapshots loaded"
    );

    let current_sizes = current.size_tables();
    let next_sizes = next.size_tables();
    let comparison = comparator.compare(current, next).await;
    let statistics = comparison.statistics(&current_sizes, &next_sizes);

    info!(
        object_difference = statistics.objects.total_size_difference.difference,
        object_percentage = statistics.objects.total_size_difference.percentage,
        "comparison finished"
    );

    let report = Report {
        schema_version: RECONCILER_SCHEMA_VERSION,
        options: &options,
        statistics,
        results: &comparison,
    };
    let mut document = serde_json::to_vec_pretty(&report).map_err(LoadError::Encode)?;
    document.push(b'\n');

    let mut out = stdout();
    out.write_all(&document).await.map_err(LoadError::Write)?;
    out.flush().await.map_err(LoadError::Write)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = match args.as_slice() {
        [mode] if mode == SPOKE_SUBCOMMAND => spoke_mode().await,
        [current, next] => {
            info!(version = env!("CARGO_PKG_VERSION"), "starting heap compare");
            compare_mode(Path::new(current), Path::new(next)).await
        }
        _ => Err(LoadError::Usage),
    };

    if let Err(e) = &outcome {
        tracing::error!(error = %e, "heap compare failed");
    }
    outcome.map_err(Into::into)
}
