//! End-to-end runs over synthetic JSON-lines clips on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use formref_core::aggregate::SpreadType;
use formref_core::template::RejectionReason;
use formref_core::types::{Channel, View};
use formref_pipeline::document::{build_reference, read_document, write_document, RunConfig};
use formref_pipeline::jsonl::JsonlLandmarkSource;
use formref_pipeline::PipelineError;

/// One frame of a squat with the hips lowered by `depth`.
fn frame(depth: f64) -> serde_json::Value {
    json!({
        "nose": [0.5, 0.1],
        "left_shoulder": [0.42, 0.20 + depth],
        "right_shoulder": [0.58, 0.20 + depth],
        "left_hip": [0.44, 0.50 + depth],
        "right_hip": [0.56, 0.50 + depth],
        "left_knee": [0.42 - depth, 0.70],
        "right_knee": [0.58 + depth, 0.70],
        "left_ankle": [0.42, 0.90],
        "right_ankle": [0.58, 0.90],
        "left_foot_index": [0.40, 0.95],
        "right_foot_index": [0.62, 0.95],
    })
}

/// Write a clip of `n` frames reaching `max_depth`, with every
/// `gap_every`-th frame undetected.
fn write_squat(path: &Path, n: usize, max_depth: f64, gap_every: Option<usize>) {
    let mut lines = vec![json!({"fps": 30.0, "width": 640, "height": 480}).to_string()];
    for i in 0..n {
        if gap_every.is_some_and(|g| i % g == g - 1) {
            lines.push("null".to_string());
            continue;
        }
        let phase = i as f64 / (n - 1) as f64;
        let depth = max_depth * (1.0 - (2.0 * std::f64::consts::PI * phase).cos()) / 2.0;
        lines.push(frame(depth).to_string());
    }
    fs::write(path, lines.join("\n")).unwrap();
}

fn reference_dir() -> (tempfile::TempDir, RunConfig) {
    let tmp = tempfile::tempdir().unwrap();
    let config = RunConfig::for_reference_dir(tmp.path());
    fs::create_dir_all(&config.front_dir).unwrap();
    fs::create_dir_all(&config.side_dir).unwrap();
    (tmp, config)
}

fn populate(dir: &Path) {
    write_squat(&dir.join("clip_a.jsonl"), 100, 0.10, None);
    write_squat(&dir.join("clip_b.jsonl"), 110, 0.11, Some(10));
    write_squat(&dir.join("clip_c.jsonl"), 90, 0.09, None);
    write_squat(&dir.join("clip_d.jsonl"), 30, 0.10, None);
    fs::write(dir.join("README.txt"), "not a clip").unwrap();
}

#[tokio::test]
async fn full_run_builds_both_views() {
    let (tmp, config) = reference_dir();
    populate(&config.front_dir);
    populate(&config.side_dir);

    let doc = build_reference(Arc::new(JsonlLandmarkSource), &config)
        .await
        .unwrap();

    for view in View::ALL {
        let report = doc.view(view);
        assert_eq!(report.templates.len(), 3, "{view}");
        assert_eq!(report.rejected.len(), 1, "{view}");
        assert_eq!(report.rejected[0].file, "clip_d.jsonl");
        assert_matches!(
            report.rejected[0].reason,
            RejectionReason::TooFewValidFrames { valid: 30, min: 60 }
        );

        let aggregate = report.aggregate.as_ref().unwrap();
        assert_eq!(aggregate.view, view);
        assert_eq!(aggregate.n_samples, 60);
        assert_eq!(aggregate.spread_type, SpreadType::Mad);
        assert_eq!(aggregate.kept, ["clip_a.jsonl", "clip_b.jsonl", "clip_c.jsonl"]);
        assert!(aggregate.dropped.is_empty());
        for channel in view.channels() {
            assert_eq!(aggregate.centre.get(*channel).unwrap().len(), 60);
            assert_eq!(aggregate.spread.get(*channel).unwrap().len(), 60);
        }
    }
    assert!(doc.side.aggregate.as_ref().unwrap().centre.get(Channel::Knee).is_some());

    let out = tmp.path().join("reference_templates.json");
    write_document(&doc, &out).await.unwrap();
    let back = read_document(&out).await.unwrap();
    assert_eq!(back.run_id, doc.run_id);
    assert_eq!(back.front.templates.len(), 3);
}

#[tokio::test]
async fn empty_view_fails_the_run() {
    let (_tmp, config) = reference_dir();
    populate(&config.side_dir);

    let result = build_reference(Arc::new(JsonlLandmarkSource), &config).await;
    assert_matches!(result, Err(PipelineError::NoSurvivingClips { view: View::Front }));
}

#[tokio::test]
async fn missing_view_directory_fails_the_run() {
    let (_tmp, config) = reference_dir();
    populate(&config.front_dir);
    fs::remove_dir(&config.side_dir).unwrap();

    let result = build_reference(Arc::new(JsonlLandmarkSource), &config).await;
    assert_matches!(result, Err(PipelineError::Io { .. }));
}

#[tokio::test]
async fn malformed_clip_is_rejected_not_fatal() {
    let (_tmp, config) = reference_dir();
    populate(&config.front_dir);
    populate(&config.side_dir);
    fs::write(config.side_dir.join("clip_0.jsonl"), "{\"fps\": 30.0}\n").unwrap();

    let doc = build_reference(Arc::new(JsonlLandmarkSource), &config)
        .await
        .unwrap();
    let rejected: Vec<&str> = doc.side.rejected.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(rejected, ["clip_0.jsonl", "clip_d.jsonl"]);
    assert_matches!(
        doc.side.rejected[0].reason,
        RejectionReason::ProcessingFailed { .. }
    );
}
