//! Pure signal-processing and aggregation logic for building reference
//! movement templates from repeated exercise recordings.
//!
//! Nothing in this crate performs I/O or async work. Landmark decoding,
//! directory handling and persistence live in `formref-pipeline`.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod form_check;
pub mod metrics;
pub mod quality_gate;
pub mod resample;
pub mod segmentation;
pub mod similarity;
pub mod smoothing;
pub mod stats;
pub mod template;
pub mod trajectory;
pub mod types;
