//! Concurrent processing of one view directory.
//!
//! Clip work is synchronous, so each clip runs on the blocking pool.
//! A semaphore bounds how many run at once and outcomes come back in
//! file-name order regardless of completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use formref_core::config::TemplateConfig;
use formref_core::template::{ClipOutcome, ClipStage, PerClipTemplate, RejectionReason};
use formref_core::types::View;

use crate::clip::{clip_file_name, failed, process_clip_file};
use crate::error::PipelineError;
use crate::provider::LandmarkSource;

/// Default number of clips processed concurrently per view.
pub const DEFAULT_MAX_PARALLEL_CLIPS: usize = 4;

/// Scheduling knobs for a view batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub max_parallel_clips: usize,
    /// Wall-clock limit per clip. `None` waits indefinitely.
    pub clip_timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_parallel_clips: DEFAULT_MAX_PARALLEL_CLIPS,
            clip_timeout: None,
        }
    }
}

/// Every clip outcome for one view, in file-name order.
#[derive(Debug, Clone)]
pub struct ViewBatch {
    pub view: View,
    pub outcomes: Vec<ClipOutcome>,
}

impl ViewBatch {
    pub fn templates(&self) -> Vec<PerClipTemplate> {
        self.outcomes
            .iter()
            .filter_map(ClipOutcome::template)
            .cloned()
            .collect()
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &RejectionReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            ClipOutcome::Rejected { file, reason } => Some((file.as_str(), reason)),
            ClipOutcome::Template(_) => None,
        })
    }

    pub fn template_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.template().is_some()).count()
    }
}

/// Clip files in `dir` that `source` accepts, sorted by file name.
pub async fn list_clips(
    source: &dyn LandmarkSource,
    dir: &Path,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| PipelineError::io(dir, e))? {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(&path, e))?
            .is_file();
        if is_file && source.accepts(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Run one clip on the blocking pool. `permit` moves into the blocking
/// closure so the slot stays taken until the work itself ends, even when
/// the wait for it times out.
async fn run_clip(
    permit: OwnedSemaphorePermit,
    source: Arc<dyn LandmarkSource>,
    path: PathBuf,
    view: View,
    config: Arc<TemplateConfig>,
    timeout: Option<Duration>,
) -> ClipOutcome {
    let file = clip_file_name(&path);
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        process_clip_file(source.as_ref(), &path, view, &config)
    });

    let joined = match timeout {
        None => task.await,
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                // The blocking thread cannot be cancelled. It keeps its
                // permit until it returns and its result is dropped.
                let reason = RejectionReason::TimedOut {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                };
                tracing::warn!(file = %file, view = %view, reason = %reason, "Clip rejected");
                return ClipOutcome::Rejected { file, reason };
            }
        },
    };

    joined.unwrap_or_else(|e| {
        tracing::error!(file = %file, view = %view, error = %e, "Clip task failed");
        failed(&file, ClipStage::Unprocessed, format!("clip task failed: {e}"))
    })
}

/// Process every accepted clip in `dir` for `view`.
///
/// Per-clip problems become rejected outcomes. Only failing to list the
/// directory is an error.
pub async fn process_view_dir(
    source: Arc<dyn LandmarkSource>,
    dir: &Path,
    view: View,
    config: Arc<TemplateConfig>,
    options: BatchOptions,
) -> Result<ViewBatch, PipelineError> {
    let paths = list_clips(source.as_ref(), dir).await?;
    tracing::info!(
        view = %view,
        dir = %dir.display(),
        clips = paths.len(),
        "Processing view directory"
    );

    let semaphore = Arc::new(Semaphore::new(options.max_parallel_clips.max(1)));
    let mut set = JoinSet::new();

    for (index, path) in paths.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);
        let timeout = options.clip_timeout;

        set.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(permit) => run_clip(permit, source, path, view, config, timeout).await,
                Err(_) => {
                    failed(&clip_file_name(&path), ClipStage::Unprocessed, "scheduler closed")
                }
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<ClipOutcome>> = vec![None; paths.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => tracing::error!(view = %view, error = %e, "Clip scheduler task failed"),
        }
    }

    let outcomes = slots
        .into_iter()
        .zip(&paths)
        .map(|(slot, path)| {
            slot.unwrap_or_else(|| {
                failed(&clip_file_name(path), ClipStage::Unprocessed, "clip task did not report")
            })
        })
        .collect();

    Ok(ViewBatch { view, outcomes })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
