//! Scoring a learner's repetition against a reference centre.
//!
//! Comparison is shape-based: both sides are resampled to a common length,
//! zeroed at their first sample, and min-max scaled per channel before a
//! weighted mean absolute error is mapped onto a 0–100 score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resample::resample;
use crate::trajectory::fill_holes;
use crate::types::{Channel, Trajectories, View};

/// Channels whose min-max range falls below this carry no shape and scale
/// to zero.
const FLAT_RANGE: f64 = 1e-6;

/// Frames whose summed channel weight is below this are not scored.
const MIN_FRAME_WEIGHT: f64 = 1e-6;

/// Norms below this make a cosine similarity meaningless.
const MIN_NORM: f64 = 1e-9;

/// Overlapping samples required before a cosine similarity is reported.
pub const MIN_COSINE_OVERLAP: usize = 5;

/// Score at or above which a rep is classed green.
pub const GREEN_SCORE: u8 = 80;

/// Score at or above which a rep is classed amber.
pub const AMBER_SCORE: u8 = 60;

// ---------------------------------------------------------------------------
// Per-view weighting
// ---------------------------------------------------------------------------

/// Channel weights and error ceiling used to score one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSpec {
    pub weights: &'static [(Channel, f64)],
    /// Weighted error at (or above) which the score bottoms out at 0.
    pub max_err: f64,
}

const SIDE_SPEC: ComparisonSpec = ComparisonSpec {
    weights: &[
        (Channel::Knee, 0.35),
        (Channel::Hip, 0.35),
        (Channel::Ankle, 0.10),
        (Channel::Torso, 0.20),
    ],
    max_err: 0.35,
};

const FRONT_SPEC: ComparisonSpec = ComparisonSpec {
    weights: &[
        (Channel::Valgus, 0.40),
        (Channel::Symmetry, 0.30),
        (Channel::Pelvic, 0.20),
        (Channel::Depth, 0.10),
    ],
    max_err: 0.25,
};

impl ComparisonSpec {
    pub fn for_view(view: View) -> Self {
        match view {
            View::Side => SIDE_SPEC,
            View::Front => FRONT_SPEC,
        }
    }

    pub fn weight(&self, channel: Channel) -> f64 {
        self.weights
            .iter()
            .find(|(c, _)| *c == channel)
            .map_or(0.0, |(_, w)| *w)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.weights.iter().map(|(c, _)| *c)
    }
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Fill gaps, resample to `steps`, and subtract the first sample.
pub fn normalise_trace(series: &[f64], steps: usize) -> Vec<f64> {
    if series.is_empty() || steps == 0 {
        return Vec::new();
    }
    let resampled = resample(&fill_holes(series), steps);
    let base = resampled[0];
    if !base.is_finite() {
        return resampled;
    }
    resampled.into_iter().map(|v| v - base).collect()
}

/// Min-max scale to `[0, 1]`, ignoring non-finite samples.
///
/// A flat series scales to all zeros. Non-finite samples stay non-finite.
pub fn normalise_by_range(series: &[f64]) -> Vec<f64> {
    let (lo, hi) = series
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;

    series
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                v
            } else if range > FLAT_RANGE {
                (v - lo) / range
            } else {
                0.0
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Error and score
// ---------------------------------------------------------------------------

/// Per-timestep weighted mean of absolute channel differences, averaged
/// over every timestep that had at least one comparable channel.
///
/// Returns `None` when nothing could be compared.
pub fn average_weighted_error(
    user: &Trajectories,
    reference: &Trajectories,
    spec: &ComparisonSpec,
) -> Option<f64> {
    let pairs: Vec<(f64, &[f64], &[f64])> = spec
        .channels()
        .filter_map(|c| Some((spec.weight(c), user.get(c)?, reference.get(c)?)))
        .collect();
    let n = pairs
        .iter()
        .map(|(_, u, r)| u.len().min(r.len()))
        .max()
        .unwrap_or(0);

    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..n {
        let mut frame_err = 0.0;
        let mut frame_w = 0.0;
        for (w, u, r) in &pairs {
            let (Some(&uv), Some(&rv)) = (u.get(i), r.get(i)) else {
                continue;
            };
            if !uv.is_finite() || !rv.is_finite() {
                continue;
            }
            frame_err += w * (uv - rv).abs();
            frame_w += w;
        }
        if frame_w > MIN_FRAME_WEIGHT {
            sum += frame_err / frame_w;
            count += 1;
        }
    }

    (count > 0).then(|| sum / count as f64)
}

/// Map an error onto 0–100, where `max_err` or worse scores 0.
pub fn score_from_error(error: Option<f64>, max_err: f64) -> u8 {
    let Some(err) = error else {
        return 0;
    };
    let clamped = err.clamp(0.0, max_err);
    (100.0 * (1.0 - clamped / max_err)).round() as u8
}

/// Traffic-light banding of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Green,
    Amber,
    Red,
}

pub fn classify_score(score: u8) -> ScoreBand {
    if score >= GREEN_SCORE {
        ScoreBand::Green
    } else if score >= AMBER_SCORE {
        ScoreBand::Amber
    } else {
        ScoreBand::Red
    }
}

/// Outcome of comparing one learner rep to a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepScore {
    pub score: u8,
    pub error: Option<f64>,
    pub band: ScoreBand,
}

/// Score a learner's per-channel series against a reference centre.
///
/// Inputs may be of any length and contain gaps (non-finite samples).
pub fn score_rep_against_reference(
    user: &Trajectories,
    reference: &Trajectories,
    view: View,
    steps: usize,
) -> RepScore {
    let spec = ComparisonSpec::for_view(view);
    let prepare = |t: &Trajectories| -> Trajectories {
        spec.channels()
            .filter_map(|c| {
                let series = t.get(c)?;
                Some((c, normalise_by_range(&normalise_trace(series, steps))))
            })
            .collect()
    };

    let error = average_weighted_error(&prepare(user), &prepare(reference), &spec);
    let score = score_from_error(error, spec.max_err);
    RepScore {
        score,
        error,
        band: classify_score(score),
    }
}

// ---------------------------------------------------------------------------
// Cosine similarity
// ---------------------------------------------------------------------------

/// How many finite samples each side contributed for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub user: usize,
    pub reference: usize,
    pub both: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosineSimilarity {
    pub per_channel: BTreeMap<Channel, f64>,
    pub coverage: BTreeMap<Channel, Coverage>,
}

fn cosine(u: &[f64], r: &[f64]) -> f64 {
    let dot: f64 = u.iter().zip(r).map(|(a, b)| a * b).sum();
    let nu = u.iter().map(|v| v * v).sum::<f64>().sqrt();
    let nr = r.iter().map(|v| v * v).sum::<f64>().sqrt();
    if nu < MIN_NORM || nr < MIN_NORM {
        return 0.0;
    }
    (dot / (nu * nr)).clamp(-1.0, 1.0)
}

/// Cosine similarity per channel over index-aligned samples finite on both
/// sides. Fewer than [`MIN_COSINE_OVERLAP`] such samples scores 0.
pub fn cosine_similarity_by_channel(
    user: &Trajectories,
    reference: &Trajectories,
    channels: &[Channel],
) -> CosineSimilarity {
    let mut result = CosineSimilarity::default();
    for &channel in channels {
        let u = user.get(channel).unwrap_or(&[]);
        let r = reference.get(channel).unwrap_or(&[]);
        let n = u.len().min(r.len());

        let mut cov = Coverage {
            user: 0,
            reference: 0,
            both: 0,
        };
        let mut uu = Vec::with_capacity(n);
        let mut rr = Vec::with_capacity(n);
        for i in 0..n {
            let (uv, rv) = (u[i], r[i]);
            cov.user += usize::from(uv.is_finite());
            cov.reference += usize::from(rv.is_finite());
            if uv.is_finite() && rv.is_finite() {
                uu.push(uv);
                rr.push(rv);
                cov.both += 1;
            }
        }

        let sim = if cov.both < MIN_COSINE_OVERLAP {
            0.0
        } else {
            cosine(&uu, &rr)
        };
        result.per_channel.insert(channel, sim);
        result.coverage.insert(channel, cov);
    }
    result
}

// ---------------------------------------------------------------------------
// Cosine rep score
// ---------------------------------------------------------------------------

/// Weighted similarity at or below which a rep scores 0.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.6;

const SIDE_COSINE_WEIGHTS: &[(Channel, f64)] = &[
    (Channel::Knee, 0.35),
    (Channel::Hip, 0.25),
    (Channel::Ankle, 0.15),
    (Channel::Torso, 0.25),
];

const FRONT_COSINE_WEIGHTS: &[(Channel, f64)] = &[
    (Channel::Valgus, 0.40),
    (Channel::Symmetry, 0.25),
    (Channel::Pelvic, 0.20),
    (Channel::Depth, 0.15),
];

/// Per-channel weights for the cosine rep score. Each table sums to 1.
pub fn cosine_weights(view: View) -> &'static [(Channel, f64)] {
    match view {
        View::Side => SIDE_COSINE_WEIGHTS,
        View::Front => FRONT_COSINE_WEIGHTS,
    }
}

/// Map a weighted similarity onto 0–100. `min_sim` or below scores 0 and a
/// perfect match scores 100.
pub fn similarity_to_score(sim: f64, min_sim: f64) -> f64 {
    (((sim - min_sim) / (1.0 - min_sim)) * 100.0).clamp(0.0, 100.0)
}

/// A channel whose shape strays far enough from the reference to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFlag {
    KneeValgus,
    LeftRightImbalance,
    InsufficientDepth,
    ExcessiveForwardLean,
    PoorKneeTracking,
}

impl FormFlag {
    pub fn message(&self) -> &'static str {
        match self {
            Self::KneeValgus => "Knee valgus detected",
            Self::LeftRightImbalance => "Left-right imbalance",
            Self::InsufficientDepth => "Insufficient depth",
            Self::ExcessiveForwardLean => "Excessive forward lean",
            Self::PoorKneeTracking => "Poor knee tracking",
        }
    }

    /// The channel this flag watches and the similarity below which it is
    /// raised.
    pub fn threshold(&self) -> (Channel, f64) {
        match self {
            Self::KneeValgus => (Channel::Valgus, 0.35),
            Self::LeftRightImbalance => (Channel::Symmetry, 0.70),
            Self::InsufficientDepth => (Channel::Depth, 0.65),
            Self::ExcessiveForwardLean => (Channel::Torso, 0.70),
            Self::PoorKneeTracking => (Channel::Knee, 0.75),
        }
    }

    pub fn for_view(view: View) -> &'static [FormFlag] {
        match view {
            View::Front => &[Self::KneeValgus, Self::LeftRightImbalance, Self::InsufficientDepth],
            View::Side => &[Self::ExcessiveForwardLean, Self::PoorKneeTracking],
        }
    }
}

impl std::fmt::Display for FormFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Flags raised by per-channel similarities. Channels absent from
/// `per_channel` raise nothing.
pub fn detect_form_issues(
    per_channel: &BTreeMap<Channel, f64>,
    view: View,
) -> Vec<FormFlag> {
    FormFlag::for_view(view)
        .iter()
        .copied()
        .filter(|flag| {
            let (channel, min) = flag.threshold();
            per_channel.get(&channel).is_some_and(|sim| *sim < min)
        })
        .collect()
}

/// Cosine-based comparison of one rep against a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosineRepScore {
    /// 0–100.
    pub score: f64,
    pub weighted_similarity: f64,
    pub per_channel: BTreeMap<Channel, f64>,
    pub flags: Vec<FormFlag>,
}

/// Score canonical-length user and reference traces by weighted
/// per-channel cosine similarity and flag channels that diverge.
pub fn score_rep_by_cosine(
    user: &Trajectories,
    reference: &Trajectories,
    view: View,
) -> CosineRepScore {
    let weights = cosine_weights(view);
    let channels: Vec<Channel> = weights.iter().map(|(c, _)| *c).collect();
    let sims = cosine_similarity_by_channel(user, reference, &channels);

    let weighted_similarity: f64 = weights
        .iter()
        .map(|(c, w)| w * sims.per_channel.get(c).copied().unwrap_or(0.0))
        .sum();

    CosineRepScore {
        score: similarity_to_score(weighted_similarity, DEFAULT_MIN_SIMILARITY),
        weighted_similarity,
        flags: detect_form_issues(&sims.per_channel, view),
        per_channel: sims.per_channel,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
