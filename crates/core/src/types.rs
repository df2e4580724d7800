//! Shared domain types: joints, views, channels and keyed trajectories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A 2D point. Serialised as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale a normalised `[0, 1]` landmark into pixel space.
    pub fn to_pixels(self, frame: FrameSize) -> Self {
        Self::new(self.x * frame.width, self.y * frame.height)
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl From<[f64; 2]> for Point2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point2> for [f64; 2] {
    fn from(p: Point2) -> Self {
        [p.x, p.y]
    }
}

/// Pixel dimensions of the source frames of a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Joints
// ---------------------------------------------------------------------------

/// Body landmarks the metric extractors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftFootIndex,
    RightFootIndex,
}

impl Joint {
    pub const ALL: [Joint; 10] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::LeftFootIndex,
        Joint::RightFootIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }

    /// Look up a joint by its snake_case name. Unknown names (landmarks the
    /// extractors never read) yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == name)
    }
}

/// The named joint positions detected in one frame, in normalised
/// image coordinates (y grows downward).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks(BTreeMap<Joint, Point2>);

impl PoseLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, joint: Joint, point: Point2) -> Self {
        self.0.insert(joint, point);
        self
    }

    pub fn insert(&mut self, joint: Joint, point: Point2) {
        self.0.insert(joint, point);
    }

    pub fn remove(&mut self, joint: Joint) -> Option<Point2> {
        self.0.remove(&joint)
    }

    pub fn get(&self, joint: Joint) -> Option<Point2> {
        self.0.get(&joint).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Joint, Point2)> for PoseLandmarks {
    fn from_iter<I: IntoIterator<Item = (Joint, Point2)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Views and channels
// ---------------------------------------------------------------------------

/// Camera perspective a clip was recorded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Front,
    Side,
}

/// Side-view (sagittal plane) channels.
pub const SIDE_CHANNELS: &[Channel] =
    &[Channel::Hip, Channel::Knee, Channel::Ankle, Channel::Torso];

/// Front-view (frontal plane) channels.
pub const FRONT_CHANNELS: &[Channel] = &[
    Channel::Valgus,
    Channel::Symmetry,
    Channel::Pelvic,
    Channel::Depth,
];

impl View {
    pub const ALL: [View; 2] = [View::Front, View::Side];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Side => "side",
        }
    }

    /// The fixed channel set every template of this view carries.
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            Self::Front => FRONT_CHANNELS,
            Self::Side => SIDE_CHANNELS,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named scalar biomechanical signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Hip flexion angle (shoulder–hip–knee), degrees.
    Hip,
    /// Knee flexion angle (hip–knee–ankle), degrees.
    Knee,
    /// Ankle angle (knee–ankle–toe), degrees.
    Ankle,
    /// Forward lean from vertical, degrees.
    Torso,
    /// Mean lateral knee offset from the ankle, relative to stance width.
    Valgus,
    /// Left/right knee-x difference relative to hip width, minus the
    /// clip's first-frame value.
    Symmetry,
    /// Left/right hip height difference relative to frame height.
    Pelvic,
    /// Hip centre height relative to frame height.
    Depth,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hip => "hip",
            Self::Knee => "knee",
            Self::Ankle => "ankle",
            Self::Torso => "torso",
            Self::Valgus => "valgus",
            Self::Symmetry => "symmetry",
            Self::Pelvic => "pelvic",
            Self::Depth => "depth",
        }
    }

    pub fn view(&self) -> View {
        match self {
            Self::Hip | Self::Knee | Self::Ankle | Self::Torso => View::Side,
            Self::Valgus | Self::Symmetry | Self::Pelvic | Self::Depth => View::Front,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trajectories
// ---------------------------------------------------------------------------

/// Per-channel scalar series, keyed by [`Channel`].
///
/// Serialised as `{ "knee": [..], "hip": [..] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectories(BTreeMap<Channel, Vec<f64>>);

impl Trajectories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Channel, series: Vec<f64>) -> Self {
        self.0.insert(channel, series);
        self
    }

    pub fn insert(&mut self, channel: Channel, series: Vec<f64>) {
        self.0.insert(channel, series);
    }

    pub fn get(&self, channel: Channel) -> Option<&[f64]> {
        self.0.get(&channel).map(Vec::as_slice)
    }

    /// Append one sample to `channel`, creating the series if needed.
    pub fn push(&mut self, channel: Channel, value: f64) {
        self.0.entry(channel).or_default().push(value);
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &[f64])> {
        self.0.iter().map(|(c, s)| (*c, s.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply `f` to every series, producing a new mapping.
    pub fn map_series<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        Self(self.0.iter().map(|(c, s)| (*c, f(s))).collect())
    }
}

impl FromIterator<(Channel, Vec<f64>)> for Trajectories {
    fn from_iter<I: IntoIterator<Item = (Channel, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
