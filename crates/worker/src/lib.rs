//! Reference-template worker: loads configuration, runs both views and
//! writes the reference document.

pub mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formref_pipeline::document::{build_reference, write_document, ReferenceDocument};
use formref_pipeline::jsonl::JsonlLandmarkSource;

use crate::config::{LogFormat, WorkerConfig};

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "formref_worker=info,formref_pipeline=info";

/// Install the global tracing subscriber.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// Build the reference document from the configured directories and write
/// it to `config.output_path`.
pub async fn run(config: &WorkerConfig) -> anyhow::Result<ReferenceDocument> {
    tracing::info!(
        front_dir = %config.run.front_dir.display(),
        side_dir = %config.run.side_dir.display(),
        canonical_length = config.run.template.canonical_length,
        drop_worst_pct = config.run.template.drop_worst_pct,
        use_median = config.run.template.use_median,
        max_parallel_clips = config.run.batch.max_parallel_clips,
        "Building reference templates"
    );

    let document = build_reference(Arc::new(JsonlLandmarkSource), &config.run)
        .await
        .context("Failed to build reference templates")?;

    write_document(&document, &config.output_path)
        .await
        .with_context(|| format!("Failed to write {}", config.output_path.display()))?;

    Ok(document)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
