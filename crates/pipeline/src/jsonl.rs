//! Landmark recordings stored as JSON lines.
//!
//! Layout of a `.jsonl` clip file:
//!
//! ```text
//! {"fps": 30.0, "width": 1280, "height": 720}
//! {"left_hip": [0.41, 0.52], "right_hip": [0.58, 0.51], ...}
//! null
//! ...
//! ```
//!
//! The first line is the clip header; every following non-blank line is one
//! frame, either `null` (no detection) or an object of normalised `[x, y]`
//! joint positions. Landmarks other than the known [`Joint`]s are ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use formref_core::types::{Joint, PoseLandmarks, Point2};

use crate::error::PipelineError;
use crate::provider::{ClipMetadata, ClipReader, LandmarkFrame, LandmarkSource};

/// File extension of landmark recordings.
pub const LANDMARK_EXTENSION: &str = "jsonl";

#[derive(Debug, Deserialize)]
struct ClipHeader {
    fps: f64,
    width: u32,
    height: u32,
}

/// Opens `.jsonl` landmark recordings from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonlLandmarkSource;

impl LandmarkSource for JsonlLandmarkSource {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(LANDMARK_EXTENSION))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ClipReader>, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let reader = JsonlClipReader::from_reader(BufReader::new(file), path)?;
        Ok(Box::new(reader))
    }
}

/// Streams frames from one JSON-lines recording.
#[derive(Debug)]
pub struct JsonlClipReader<R> {
    path: PathBuf,
    lines: Lines<R>,
    line_no: usize,
    metadata: ClipMetadata,
}

impl<R: BufRead> JsonlClipReader<R> {
    /// Read the header line and prepare to stream frames. `path` is used
    /// for error messages only.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let mut lines = reader.lines();
        let mut line_no = 0;

        let header_line = loop {
            line_no += 1;
            match lines.next() {
                Some(Ok(l)) if l.trim().is_empty() => continue,
                Some(Ok(l)) => break l,
                Some(Err(e)) => return Err(PipelineError::io(&path, e)),
                None => return Err(PipelineError::MissingHeader(path)),
            }
        };

        let header: ClipHeader =
            serde_json::from_str(&header_line).map_err(|e| PipelineError::Parse {
                path: path.clone(),
                line: line_no,
                message: format!("invalid clip header: {e}"),
            })?;
        if header.width == 0 || header.height == 0 {
            return Err(PipelineError::Parse {
                path,
                line: line_no,
                message: format!(
                    "frame size must be non-zero, got {}x{}",
                    header.width, header.height
                ),
            });
        }

        Ok(Self {
            path,
            lines,
            line_no,
            metadata: ClipMetadata {
                fps: header.fps,
                width: header.width,
                height: header.height,
            },
        })
    }

    fn parse_frame(&self, line: &str) -> Result<LandmarkFrame, PipelineError> {
        let raw: Option<BTreeMap<String, Point2>> =
            serde_json::from_str(line).map_err(|e| PipelineError::Parse {
                path: self.path.clone(),
                line: self.line_no,
                message: e.to_string(),
            })?;

        Ok(match raw {
            None => LandmarkFrame::NoDetection,
            Some(points) => LandmarkFrame::Detected(
                points
                    .into_iter()
                    .filter_map(|(name, p)| Joint::from_name(&name).map(|j| (j, p)))
                    .collect::<PoseLandmarks>(),
            ),
        })
    }
}

impl<R: BufRead + Send> ClipReader for JsonlClipReader<R> {
    fn metadata(&self) -> ClipMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, PipelineError> {
        loop {
            self.line_no += 1;
            let line = match self.lines.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(PipelineError::io(&self.path, e)),
                Some(Ok(l)) => l,
            };
            if line.trim().is_empty() {
                continue;
            }
            return self.parse_frame(&line).map(Some);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;

    fn reader(text: &str) -> Result<JsonlClipReader<Cursor<Vec<u8>>>, PipelineError> {
        JsonlClipReader::from_reader(Cursor::new(text.as_bytes().to_vec()), "clip.jsonl")
    }

    #[test]
    fn reads_header_and_frames() {
        let mut r = reader(
            "{\"fps\": 30.0, \"width\": 640, \"height\": 480}\n\
             {\"left_hip\": [0.5, 0.5], \"nose\": [0.5, 0.1]}\n\
             \n\
             null\n",
        )
        .unwrap();
        assert_eq!(r.metadata().width, 640);

        let first = r.next_frame().unwrap().unwrap();
        assert_matches!(first, LandmarkFrame::Detected(ref lm) if lm.len() == 1);
        assert_matches!(r.next_frame().unwrap(), Some(LandmarkFrame::NoDetection));
        assert_matches!(r.next_frame().unwrap(), None);
    }

    #[test]
    fn reader_debug_names_the_file() {
        let r = reader("{\"fps\": 30.0, \"width\": 640, \"height\": 480}\n").unwrap();
        let debug = format!("{r:?}");
        assert!(debug.contains("clip.jsonl"), "{debug}");
        assert!(debug.contains("line_no"), "{debug}");
    }

    #[test]
    fn empty_file_has_no_header() {
        assert_matches!(reader(""), Err(PipelineError::MissingHeader(_)));
    }

    #[test]
    fn zero_frame_size_rejected() {
        assert_matches!(
            reader("{\"fps\": 30.0, \"width\": 0, \"height\": 480}\n"),
            Err(PipelineError::Parse { line: 1, .. })
        );
    }

    #[test]
    fn malformed_frame_reports_line() {
        let mut r = reader("{\"fps\": 30.0, \"width\": 10, \"height\": 10}\nnot json\n").unwrap();
        assert_matches!(r.next_frame(), Err(PipelineError::Parse { line: 2, .. }));
    }

    #[test]
    fn source_accepts_only_jsonl() {
        let source = JsonlLandmarkSource;
        assert!(source.accepts(Path::new("a/clip.jsonl")));
        assert!(source.accepts(Path::new("clip.JSONL")));
        assert!(!source.accepts(Path::new("clip.mp4")));
        assert!(!source.accepts(Path::new("notes")));
    }
}
