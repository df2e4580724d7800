//! Absolute form checks on a single rep.
//!
//! Unlike the template comparison in [`crate::similarity`], these checks
//! look at a handful of angle summaries and compare them with fixed
//! coaching thresholds.

use serde::{Deserialize, Serialize};

use crate::types::{Channel, Trajectories, View};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Knee angle at the bottom at or below which the rep is deep enough.
pub const DEFAULT_MIN_DEPTH_KNEE: f64 = 115.0;

/// Largest torso lean from vertical, degrees, in either view.
pub const DEFAULT_MAX_FORWARD_TORSO: f64 = 45.0;

/// Largest feet-minus-knees width, as a fraction of frame width.
pub const DEFAULT_MAX_VALGUS_METRIC: f64 = 0.025;

/// Stricter torso lean limit applied from the side.
pub const DEFAULT_SIDE_MAX_TORSO: f64 = 42.0;

/// Largest change in torso angle between the top and bottom of the rep.
pub const DEFAULT_MAX_TORSO_DELTA: f64 = 18.0;

/// Largest torso lean allowed at the bottom of the rep.
pub const DEFAULT_BOTTOM_TORSO_MAX: f64 = 42.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormThresholds {
    pub min_depth_knee: f64,
    pub max_forward_torso: f64,
    pub max_valgus_metric: f64,
    pub side_max_torso: f64,
    pub max_torso_delta: f64,
    pub bottom_torso_max: f64,
}

impl Default for FormThresholds {
    fn default() -> Self {
        Self {
            min_depth_knee: DEFAULT_MIN_DEPTH_KNEE,
            max_forward_torso: DEFAULT_MAX_FORWARD_TORSO,
            max_valgus_metric: DEFAULT_MAX_VALGUS_METRIC,
            side_max_torso: DEFAULT_SIDE_MAX_TORSO,
            max_torso_delta: DEFAULT_MAX_TORSO_DELTA,
            bottom_torso_max: DEFAULT_BOTTOM_TORSO_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// RepSummary
// ---------------------------------------------------------------------------

/// Angle summaries of one rep. Missing values skip the checks that need
/// them, except depth and forward lean which fail without a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepSummary {
    pub view: View,
    /// Smallest knee angle over the rep, degrees.
    pub min_knee: Option<f64>,
    /// Largest torso lean over the rep, degrees.
    pub max_torso: Option<f64>,
    /// Torso lean at the start of the rep.
    pub top_torso: Option<f64>,
    /// Torso lean where the knee angle is smallest.
    pub bottom_torso: Option<f64>,
    /// Feet width minus knee width, as a fraction of frame width.
    pub valgus_metric: Option<f64>,
}

impl RepSummary {
    pub fn new(view: View) -> Self {
        Self {
            view,
            min_knee: None,
            max_torso: None,
            top_torso: None,
            bottom_torso: None,
            valgus_metric: None,
        }
    }

    /// Summarise side-view knee and torso trajectories. Non-finite samples
    /// are ignored.
    pub fn from_side_trajectories(trajectories: &Trajectories) -> Self {
        let knee = trajectories.get(Channel::Knee).unwrap_or(&[]);
        let torso = trajectories.get(Channel::Torso).unwrap_or(&[]);

        let bottom = knee
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .min_by(|a, b| a.1.total_cmp(b.1));

        Self {
            min_knee: bottom.map(|(_, v)| *v),
            max_torso: torso
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .max_by(f64::total_cmp),
            top_torso: torso.iter().copied().find(|v| v.is_finite()),
            bottom_torso: bottom
                .and_then(|(i, _)| torso.get(i).copied())
                .filter(|v| v.is_finite()),
            ..Self::new(View::Side)
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// A failed check, with the advice shown for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormIssue {
    NotDeepEnough,
    ForwardLean,
    SideViewLean,
    InconsistentBackAngle,
    BottomLean,
    KneesCaveIn,
}

impl FormIssue {
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotDeepEnough => "Go a bit deeper. Aim to bend your knees more at the bottom.",
            Self::ForwardLean => "Try to keep your chest a little more upright.",
            Self::SideViewLean => {
                "From the side view, you're leaning too far forwards. \
                 Try to keep your back more neutral."
            }
            Self::InconsistentBackAngle => {
                "Try to keep your back angle more consistent. \
                 Avoid rounding or overcompensating through the spine."
            }
            Self::BottomLean => {
                "At the bottom, try to keep your chest from leaning too far forward."
            }
            Self::KneesCaveIn => {
                "Keep your knees tracking over your toes. Avoid them collapsing inwards."
            }
        }
    }
}

impl std::fmt::Display for FormIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.advice())
    }
}

/// Result of [`check_form`]. Checks that do not apply to the view, or whose
/// input is missing, pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormCheck {
    pub depth_ok: bool,
    pub forward_lean_ok: bool,
    pub side_back_ok: bool,
    pub torso_delta_ok: bool,
    pub bottom_torso_ok: bool,
    pub valgus_ok: bool,
    /// Failed checks in evaluation order.
    pub issues: Vec<FormIssue>,
}

impl FormCheck {
    pub fn overall_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check one rep against fixed form thresholds.
pub fn check_form(rep: &RepSummary, thresholds: &FormThresholds) -> FormCheck {
    let side = rep.view == View::Side;
    let front = rep.view == View::Front;
    let mut issues = Vec::new();
    let mut check = |ok: bool, issue: FormIssue| {
        if !ok {
            issues.push(issue);
        }
        ok
    };

    let depth_ok = check(
        rep.min_knee.is_some_and(|k| k <= thresholds.min_depth_knee),
        FormIssue::NotDeepEnough,
    );
    let forward_lean_ok = check(
        rep.max_torso.is_some_and(|t| t <= thresholds.max_forward_torso),
        FormIssue::ForwardLean,
    );
    let side_back_ok = check(
        !side || rep.max_torso.map_or(true, |t| t <= thresholds.side_max_torso),
        FormIssue::SideViewLean,
    );
    let torso_delta_ok = check(
        !side
            || match (rep.top_torso, rep.bottom_torso) {
                (Some(top), Some(bottom)) => (bottom - top).abs() <= thresholds.max_torso_delta,
                _ => true,
            },
        FormIssue::InconsistentBackAngle,
    );
    let bottom_torso_ok = check(
        !side || rep.bottom_torso.map_or(true, |t| t <= thresholds.bottom_torso_max),
        FormIssue::BottomLean,
    );
    let valgus_ok = check(
        !front || rep.valgus_metric.map_or(true, |v| v <= thresholds.max_valgus_metric),
        FormIssue::KneesCaveIn,
    );

    FormCheck {
        depth_ok,
        forward_lean_ok,
        side_back_ok,
        torso_delta_ok,
        bottom_torso_ok,
        valgus_ok,
        issues,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn side_rep(min_knee: f64, max_torso: f64) -> RepSummary {
        RepSummary {
            min_knee: Some(min_knee),
            max_torso: Some(max_torso),
            ..RepSummary::new(View::Side)
        }
    }

    fn check(rep: RepSummary) -> FormCheck {
        check_form(&rep, &FormThresholds::default())
    }

    // -- depth and lean -------------------------------------------------------

    #[test]
    fn good_side_rep_passes() {
        let result = check(side_rep(100.0, 30.0));
        assert!(result.overall_ok());
        assert!(result.depth_ok && result.forward_lean_ok && result.side_back_ok);
    }

    #[test]
    fn shallow_rep_fails_depth() {
        let result = check(side_rep(130.0, 30.0));
        assert!(!result.depth_ok);
        assert_eq!(result.issues, [FormIssue::NotDeepEnough]);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let result = check(side_rep(115.0, 42.0));
        assert!(result.overall_ok(), "{:?}", result.issues);
    }

    #[test]
    fn missing_summaries_fail_depth_and_lean() {
        let result = check(RepSummary::new(View::Front));
        assert_eq!(result.issues, [FormIssue::NotDeepEnough, FormIssue::ForwardLean]);
        assert!(result.side_back_ok && result.valgus_ok);
    }

    #[test]
    fn side_view_applies_stricter_lean() {
        let side = check(side_rep(100.0, 44.0));
        assert!(side.forward_lean_ok);
        assert_eq!(side.issues, [FormIssue::SideViewLean]);

        let front = check(RepSummary {
            view: View::Front,
            ..side_rep(100.0, 44.0)
        });
        assert!(front.overall_ok());
    }

    // -- torso angle ----------------------------------------------------------

    #[test]
    fn large_torso_change_is_flagged() {
        let result = check(RepSummary {
            top_torso: Some(10.0),
            bottom_torso: Some(35.0),
            ..side_rep(110.0, 35.0)
        });
        assert!(!result.torso_delta_ok);
        assert!(result.bottom_torso_ok);
    }

    #[test]
    fn torso_change_needs_both_ends() {
        let result = check(RepSummary {
            bottom_torso: Some(35.0),
            ..side_rep(110.0, 35.0)
        });
        assert!(result.torso_delta_ok);
    }

    #[test]
    fn deep_lean_at_bottom_is_flagged() {
        let result = check(RepSummary {
            bottom_torso: Some(50.0),
            ..side_rep(110.0, 40.0)
        });
        assert!(!result.bottom_torso_ok);
        assert_eq!(result.issues, [FormIssue::BottomLean]);
    }

    // -- valgus ---------------------------------------------------------------

    #[test]
    fn valgus_only_checked_from_the_front() {
        let rep = RepSummary {
            view: View::Front,
            valgus_metric: Some(0.04),
            ..side_rep(100.0, 30.0)
        };
        assert_eq!(check(rep).issues, [FormIssue::KneesCaveIn]);

        let side = RepSummary {
            view: View::Side,
            ..rep
        };
        assert!(check(side).valgus_ok);
    }

    #[test]
    fn custom_thresholds_override_defaults() {
        let strict = FormThresholds {
            min_depth_knee: 90.0,
            ..FormThresholds::default()
        };
        assert!(!check_form(&side_rep(100.0, 30.0), &strict).depth_ok);
    }

    // -- summaries ------------------------------------------------------------

    #[test]
    fn side_summary_reads_bottom_at_smallest_knee() {
        let t = Trajectories::new()
            .with(Channel::Knee, vec![170.0, 120.0, 95.0, f64::NAN, 160.0])
            .with(Channel::Torso, vec![f64::NAN, 20.0, 38.0, 45.0, 12.0]);
        let s = RepSummary::from_side_trajectories(&t);
        assert_eq!(s.view, View::Side);
        assert_eq!(s.min_knee, Some(95.0));
        assert_eq!(s.max_torso, Some(45.0));
        assert_eq!(s.top_torso, Some(20.0));
        assert_eq!(s.bottom_torso, Some(38.0));
        assert_eq!(s.valgus_metric, None);
    }

    #[test]
    fn empty_trajectories_summarise_to_nothing() {
        assert_eq!(
            RepSummary::from_side_trajectories(&Trajectories::new()),
            RepSummary::new(View::Side)
        );
    }

    #[test]
    fn issues_display_their_advice() {
        assert_eq!(
            FormIssue::ForwardLean.to_string(),
            "Try to keep your chest a little more upright."
        );
    }
}
