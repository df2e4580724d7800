//! Outlier-robust aggregation of per-clip templates into one reference.
//!
//! Two passes: a preliminary centre over every clip ranks clips by their
//! distance to it, the furthest fraction is dropped, and the final centre
//! and spread are computed from the kept clips only.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::{TemplateConfig, MIN_CLIPS_FOR_OUTLIER_DROP};
use crate::error::CoreError;
use crate::stats::{mean, median, median_absolute_deviation, std_deviation};
use crate::template::PerClipTemplate;
use crate::types::{Channel, Trajectories, View};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Dispersion measure reported alongside the centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadType {
    /// Median absolute deviation (paired with a median centre).
    Mad,
    /// Population standard deviation (paired with a mean centre).
    Std,
}

impl SpreadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mad => "mad",
            Self::Std => "std",
        }
    }
}

/// One clip's distance to the preliminary centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDistance {
    pub file: String,
    pub distance: f64,
}

/// Reference template for one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTemplate {
    pub view: View,
    pub channels: Vec<Channel>,
    pub n_samples: usize,
    pub centre: Trajectories,
    pub spread: Trajectories,
    pub spread_type: SpreadType,
    /// Kept clip files, sorted by name.
    pub kept: Vec<String>,
    /// Dropped clip files, nearest first.
    pub dropped: Vec<String>,
    /// Every clip with its distance, ascending.
    pub distances: Vec<ClipDistance>,
}

// ---------------------------------------------------------------------------
// Distance and keep count
// ---------------------------------------------------------------------------

/// Mean absolute difference between `trajectories` and `centre`, pooled
/// over every channel of `centre` and every timestep.
///
/// Series of different lengths are compared over their common prefix.
/// Channels missing from `trajectories` are skipped. Returns 0.0 when no
/// samples overlap.
pub fn distance_to_centre(trajectories: &Trajectories, centre: &Trajectories) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (channel, c) in centre.iter() {
        let Some(t) = trajectories.get(channel) else {
            continue;
        };
        let n = t.len().min(c.len());
        sum += t[..n]
            .iter()
            .zip(&c[..n])
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>();
        count += n;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Number of clips kept out of `total` for a drop fraction.
///
/// Below [`MIN_CLIPS_FOR_OUTLIER_DROP`] clips nothing is dropped. Otherwise
/// `ceil(total * (1 - drop_pct))`, never less than one.
pub fn keep_count(total: usize, drop_pct: f64) -> usize {
    let drop_pct = if total < MIN_CLIPS_FOR_OUTLIER_DROP {
        0.0
    } else {
        drop_pct.clamp(0.0, 1.0)
    };
    // Shave float noise so e.g. 5 * 0.8 never ceils to 5.
    let keep = (total as f64 * (1.0 - drop_pct) - 1e-9).ceil() as usize;
    keep.clamp(1, total.max(1))
}

// ---------------------------------------------------------------------------
// Centre and spread
// ---------------------------------------------------------------------------

fn per_timestep<F>(
    templates: &[&PerClipTemplate],
    channels: &[Channel],
    n_samples: usize,
    reduce: F,
) -> Trajectories
where
    F: Fn(&[f64]) -> f64,
{
    let mut column = Vec::with_capacity(templates.len());
    channels
        .iter()
        .map(|&channel| {
            let series = (0..n_samples)
                .map(|t| {
                    column.clear();
                    column.extend(
                        templates
                            .iter()
                            .filter_map(|tpl| tpl.trajectories.get(channel))
                            .filter_map(|s| s.get(t).copied()),
                    );
                    reduce(&column)
                })
                .collect();
            (channel, series)
        })
        .collect()
}

/// Elementwise centre across clips: median or mean per channel per
/// timestep.
pub fn compute_centre(
    templates: &[&PerClipTemplate],
    channels: &[Channel],
    n_samples: usize,
    use_median: bool,
) -> Trajectories {
    if use_median {
        per_timestep(templates, channels, n_samples, median)
    } else {
        per_timestep(templates, channels, n_samples, mean)
    }
}

/// Elementwise spread: MAD with a median centre, standard deviation with a
/// mean centre.
pub fn compute_spread(
    templates: &[&PerClipTemplate],
    channels: &[Channel],
    n_samples: usize,
    use_median: bool,
) -> Trajectories {
    if use_median {
        per_timestep(templates, channels, n_samples, median_absolute_deviation)
    } else {
        per_timestep(templates, channels, n_samples, std_deviation)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn check_consistent(
    templates: &[PerClipTemplate],
) -> Result<(View, Vec<Channel>, usize), CoreError> {
    let first = &templates[0];
    let channels: Vec<Channel> = first.trajectories.channels().collect();
    let n_samples = first.n_samples();

    for t in &templates[1..] {
        if t.view != first.view {
            return Err(CoreError::ContractViolation(format!(
                "cannot aggregate {} template '{}' with {} template '{}'",
                t.view, t.file, first.view, first.file
            )));
        }
        if !t.trajectories.channels().eq(channels.iter().copied()) {
            return Err(CoreError::ContractViolation(format!(
                "template '{}' has a different channel set from '{}'",
                t.file, first.file
            )));
        }
        if t.n_samples() != n_samples {
            return Err(CoreError::ContractViolation(format!(
                "template '{}' has {} samples, expected {n_samples}",
                t.file,
                t.n_samples()
            )));
        }
    }
    Ok((first.view, channels, n_samples))
}

/// Combine same-view templates into one [`AggregateTemplate`].
///
/// Returns `Ok(None)` for an empty input. Mixing views, channel sets or
/// lengths is a [`CoreError::ContractViolation`]. Clips with equal
/// distance keep their input order in the ranking.
pub fn aggregate_templates(
    templates: &[PerClipTemplate],
    config: &TemplateConfig,
) -> Result<Option<AggregateTemplate>, CoreError> {
    if templates.is_empty() {
        return Ok(None);
    }
    let (view, channels, n_samples) = check_consistent(templates)?;
    let use_median = config.use_median;

    let all: Vec<&PerClipTemplate> = templates.iter().collect();
    let preliminary = compute_centre(&all, &channels, n_samples, use_median);

    let mut ranked: Vec<(&PerClipTemplate, f64)> = all
        .iter()
        .map(|t| (*t, distance_to_centre(&t.trajectories, &preliminary)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let keep = keep_count(ranked.len(), config.drop_worst_pct);
    let kept_templates: Vec<&PerClipTemplate> = ranked[..keep].iter().map(|(t, _)| *t).collect();

    let centre = compute_centre(&kept_templates, &channels, n_samples, use_median);
    let spread = compute_spread(&kept_templates, &channels, n_samples, use_median);

    let mut kept: Vec<String> = kept_templates.iter().map(|t| t.file.clone()).collect();
    kept.sort();
    let dropped = ranked[keep..].iter().map(|(t, _)| t.file.clone()).collect();
    let distances = ranked
        .iter()
        .map(|(t, d)| ClipDistance {
            file: t.file.clone(),
            distance: *d,
        })
        .collect();

    Ok(Some(AggregateTemplate {
        view,
        channels,
        n_samples,
        centre,
        spread,
        spread_type: if use_median {
            SpreadType::Mad
        } else {
            SpreadType::Std
        },
        kept,
        dropped,
        distances,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::quality_gate::QualityReport;
    use crate::segmentation::RepSegment;

    /// Side-view template whose hip series is `hip`, whose knee series is
    /// `knee`, and whose ankle/torso series mirror `knee`.
    fn tpl(file: &str, knee: &[f64], hip: &[f64]) -> PerClipTemplate {
        let traj = Trajectories::new()
            .with(Channel::Knee, knee.to_vec())
            .with(Channel::Hip, hip.to_vec())
            .with(Channel::Ankle, knee.to_vec())
            .with(Channel::Torso, knee.to_vec());
        PerClipTemplate::new(
            file,
            View::Side,
            30.0,
            RepSegment {
                start: 0,
                bottom: 30,
                end: 60,
            },
            QualityReport::new(90, 90),
            traj,
        )
        .unwrap()
    }

    fn cfg(drop_worst_pct: f64, use_median: bool) -> TemplateConfig {
        TemplateConfig {
            drop_worst_pct,
            use_median,
            ..Default::default()
        }
    }

    // -- distance_to_centre ---------------------------------------------------

    #[test]
    fn identical_distance_is_zero() {
        let centre = Trajectories::new()
            .with(Channel::Knee, vec![10.0, 20.0, 30.0])
            .with(Channel::Hip, vec![5.0, 10.0, 15.0]);
        assert_eq!(distance_to_centre(&centre.clone(), &centre), 0.0);
    }

    #[test]
    fn constant_offset_distance() {
        let centre = Trajectories::new().with(Channel::Knee, vec![10.0, 20.0, 30.0]);
        let t = Trajectories::new().with(Channel::Knee, vec![12.0, 22.0, 32.0]);
        assert_eq!(distance_to_centre(&t, &centre), 2.0);
    }

    #[test]
    fn mismatched_lengths_use_common_prefix() {
        let centre = Trajectories::new().with(Channel::Knee, vec![10.0, 20.0]);
        let t = Trajectories::new().with(Channel::Knee, vec![11.0, 21.0, 31.0]);
        assert_eq!(distance_to_centre(&t, &centre), 1.0);
    }

    #[test]
    fn no_overlap_distance_is_zero() {
        let centre = Trajectories::new().with(Channel::Knee, vec![10.0]);
        let t = Trajectories::new().with(Channel::Hip, vec![11.0]);
        assert_eq!(distance_to_centre(&t, &centre), 0.0);
    }

    // -- keep_count -----------------------------------------------------------

    #[test]
    fn keep_count_small_samples_keep_all() {
        assert_eq!(keep_count(4, 0.5), 4);
        assert_eq!(keep_count(1, 0.9), 1);
    }

    #[test]
    fn keep_count_rounds_up() {
        assert_eq!(keep_count(5, 0.2), 4);
        assert_eq!(keep_count(6, 0.2), 5);
        assert_eq!(keep_count(10, 0.25), 8);
    }

    #[test]
    fn keep_count_never_zero() {
        assert_eq!(keep_count(5, 0.99), 1);
    }

    // -- aggregate_templates --------------------------------------------------

    #[test]
    fn empty_input_has_no_result() {
        assert_matches!(aggregate_templates(&[], &TemplateConfig::default()), Ok(None));
    }

    #[test]
    fn single_template_is_its_own_centre() {
        let t = tpl("a.jsonl", &[10.0, 20.0, 30.0], &[5.0, 10.0, 15.0]);
        let agg = aggregate_templates(&[t], &TemplateConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(agg.centre.get(Channel::Knee), Some(&[10.0, 20.0, 30.0][..]));
        assert_eq!(agg.kept, vec!["a.jsonl"]);
        assert!(agg.dropped.is_empty());
        assert_eq!(agg.spread.get(Channel::Knee), Some(&[0.0, 0.0, 0.0][..]));
    }

    #[test]
    fn median_centre_of_three() {
        let templates = [
            tpl("a.jsonl", &[10.0, 20.0], &[5.0, 10.0]),
            tpl("b.jsonl", &[12.0, 22.0], &[7.0, 12.0]),
            tpl("c.jsonl", &[14.0, 24.0], &[9.0, 14.0]),
        ];
        let agg = aggregate_templates(&templates, &cfg(0.0, true))
            .unwrap()
            .unwrap();
        assert_eq!(agg.centre.get(Channel::Knee), Some(&[12.0, 22.0][..]));
        assert_eq!(agg.centre.get(Channel::Hip), Some(&[7.0, 12.0][..]));
        assert_eq!(agg.spread_type, SpreadType::Mad);
        assert_eq!(agg.spread.get(Channel::Knee), Some(&[2.0, 2.0][..]));
        assert_eq!(agg.n_samples, 2);
    }

    #[test]
    fn severe_outlier_is_dropped() {
        let templates = [
            tpl("a.jsonl", &[10.0, 20.0], &[5.0, 10.0]),
            tpl("b.jsonl", &[11.0, 21.0], &[6.0, 11.0]),
            tpl("c.jsonl", &[12.0, 22.0], &[7.0, 12.0]),
            tpl("d.jsonl", &[13.0, 23.0], &[8.0, 13.0]),
            tpl("e.jsonl", &[100.0, 200.0], &[50.0, 100.0]),
        ];
        let agg = aggregate_templates(&templates, &cfg(0.2, true))
            .unwrap()
            .unwrap();
        assert_eq!(agg.dropped, vec!["e.jsonl"]);
        assert!(!agg.kept.contains(&"e.jsonl".to_string()));
        assert_eq!(agg.kept.len(), 4);
        assert_eq!(agg.distances.last().unwrap().file, "e.jsonl");
        assert!(agg
            .distances
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn few_templates_never_drop() {
        let templates = [
            tpl("a.jsonl", &[10.0], &[5.0]),
            tpl("b.jsonl", &[20.0], &[10.0]),
        ];
        let agg = aggregate_templates(&templates, &cfg(0.5, true))
            .unwrap()
            .unwrap();
        assert_eq!(agg.kept.len(), 2);
        assert!(agg.dropped.is_empty());
    }

    #[test]
    fn mean_centre_uses_std_spread() {
        let templates = [
            tpl("a.jsonl", &[10.0, 20.0], &[5.0, 10.0]),
            tpl("b.jsonl", &[12.0, 22.0], &[7.0, 12.0]),
        ];
        let agg = aggregate_templates(&templates, &cfg(0.0, false))
            .unwrap()
            .unwrap();
        assert_eq!(agg.spread_type, SpreadType::Std);
        assert_eq!(agg.centre.get(Channel::Knee), Some(&[11.0, 21.0][..]));
        assert_eq!(agg.spread.get(Channel::Knee), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn kept_files_are_sorted_and_ties_stable() {
        let templates = [
            tpl("z.jsonl", &[1.0], &[1.0]),
            tpl("m.jsonl", &[1.0], &[1.0]),
            tpl("a.jsonl", &[1.0], &[1.0]),
        ];
        let agg = aggregate_templates(&templates, &cfg(0.0, true))
            .unwrap()
            .unwrap();
        assert_eq!(agg.kept, vec!["a.jsonl", "m.jsonl", "z.jsonl"]);
        let order: Vec<&str> = agg.distances.iter().map(|d| d.file.as_str()).collect();
        assert_eq!(order, vec!["z.jsonl", "m.jsonl", "a.jsonl"]);
    }

    #[test]
    fn mixed_lengths_are_a_contract_violation() {
        let templates = [
            tpl("a.jsonl", &[1.0, 2.0], &[1.0, 2.0]),
            tpl("b.jsonl", &[1.0], &[1.0]),
        ];
        assert_matches!(
            aggregate_templates(&templates, &TemplateConfig::default()),
            Err(CoreError::ContractViolation(_))
        );
    }

    #[test]
    fn spread_type_labels() {
        let json = serde_json::to_value(SpreadType::Mad).unwrap();
        assert_eq!(json, "mad");
        assert_eq!(SpreadType::Std.as_str(), "std");
    }
}
