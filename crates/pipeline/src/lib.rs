//! Clip-level orchestration and batch processing for reference templates.
//!
//! Turns directories of pre-extracted landmark recordings into per-clip
//! templates and one aggregate per view, using the pure logic in
//! `formref-core`.

pub mod batch;
pub mod clip;
pub mod document;
pub mod error;
pub mod jsonl;
pub mod provider;

#[cfg(test)]
mod test_support;

pub use error::PipelineError;
