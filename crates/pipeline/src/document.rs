//! The two-view reference run and its persisted output document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formref_core::aggregate::{aggregate_templates, AggregateTemplate};
use formref_core::config::TemplateConfig;
use formref_core::error::CoreError;
use formref_core::template::{ClipOutcome, PerClipTemplate, RejectionReason};
use formref_core::types::View;

use crate::batch::{process_view_dir, BatchOptions, ViewBatch};
use crate::error::PipelineError;
use crate::provider::LandmarkSource;

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Everything one reference run needs besides the landmark source.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub front_dir: PathBuf,
    pub side_dir: PathBuf,
    pub template: TemplateConfig,
    pub batch: BatchOptions,
}

impl RunConfig {
    /// Conventional layout: `<reference_dir>/front` and `<reference_dir>/side`.
    pub fn for_reference_dir(reference_dir: impl AsRef<Path>) -> Self {
        let root = reference_dir.as_ref();
        Self {
            front_dir: root.join(View::Front.as_str()),
            side_dir: root.join(View::Side.as_str()),
            template: TemplateConfig::default(),
            batch: BatchOptions::default(),
        }
    }

    pub fn dir_for(&self, view: View) -> &Path {
        match view {
            View::Front => &self.front_dir,
            View::Side => &self.side_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedClip {
    pub file: String,
    pub reason: RejectionReason,
}

/// Per-view section of the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewReport {
    pub templates: Vec<PerClipTemplate>,
    pub rejected: Vec<RejectedClip>,
    /// `None` only when no clip of the view survived.
    pub aggregate: Option<AggregateTemplate>,
}

impl ViewReport {
    /// Split a batch into templates and rejections and aggregate the
    /// templates.
    pub fn from_batch(batch: ViewBatch, config: &TemplateConfig) -> Result<Self, CoreError> {
        let mut templates = Vec::new();
        let mut rejected = Vec::new();
        for outcome in batch.outcomes {
            match outcome {
                ClipOutcome::Template(t) => templates.push(t),
                ClipOutcome::Rejected { file, reason } => {
                    rejected.push(RejectedClip { file, reason })
                }
            }
        }

        let aggregate = aggregate_templates(&templates, config)?;
        Ok(Self {
            templates,
            rejected,
            aggregate,
        })
    }
}

/// The persisted result of one reference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub front: ViewReport,
    pub side: ViewReport,
}

impl ReferenceDocument {
    pub fn view(&self, view: View) -> &ViewReport {
        match view {
            View::Front => &self.front,
            View::Side => &self.side,
        }
    }
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

fn log_report(view: View, report: &ViewReport) {
    let Some(aggregate) = &report.aggregate else {
        tracing::warn!(
            view = %view,
            rejected = report.rejected.len(),
            "No clips survived for this view"
        );
        return;
    };
    for entry in &aggregate.distances {
        tracing::debug!(
            view = %view,
            file = %entry.file,
            distance = entry.distance,
            "Clip distance to centre"
        );
    }
    tracing::info!(
        view = %view,
        kept = aggregate.kept.len(),
        dropped = ?aggregate.dropped,
        rejected = report.rejected.len(),
        spread_type = aggregate.spread_type.as_str(),
        "View aggregated"
    );
}

/// Process both view directories concurrently and aggregate each.
///
/// Both views are always processed and logged. A view with no surviving
/// clips then fails the run with [`PipelineError::NoSurvivingClips`].
pub async fn build_reference(
    source: Arc<dyn LandmarkSource>,
    config: &RunConfig,
) -> Result<ReferenceDocument, PipelineError> {
    config.template.validate()?;
    let template = Arc::new(config.template.clone());

    let (front, side) = tokio::join!(
        process_view_dir(
            Arc::clone(&source),
            config.dir_for(View::Front),
            View::Front,
            Arc::clone(&template),
            config.batch,
        ),
        process_view_dir(
            source,
            config.dir_for(View::Side),
            View::Side,
            Arc::clone(&template),
            config.batch,
        ),
    );

    let front = ViewReport::from_batch(front?, &template)?;
    let side = ViewReport::from_batch(side?, &template)?;
    log_report(View::Front, &front);
    log_report(View::Side, &side);

    for (view, report) in [(View::Front, &front), (View::Side, &side)] {
        if report.aggregate.is_none() {
            return Err(PipelineError::NoSurvivingClips { view });
        }
    }

    Ok(ReferenceDocument {
        run_id: Uuid::now_v7(),
        created_at: Utc::now(),
        front,
        side,
    })
}

/// Write `document` as pretty JSON. The file is written next to `path`
/// first and renamed into place, so readers never see a partial document.
pub async fn write_document(
    document: &ReferenceDocument,
    path: &Path,
) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }

    let json = serde_json::to_vec_pretty(document)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, json)
        .await
        .map_err(|e| PipelineError::io(&staging, e))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    tracing::info!(path = %path.display(), run_id = %document.run_id, "Reference document written");
    Ok(())
}

/// Read a previously written document.
pub async fn read_document(path: &Path) -> Result<ReferenceDocument, PipelineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
