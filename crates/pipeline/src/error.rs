use std::path::PathBuf;

use formref_core::error::CoreError;
use formref_core::types::View;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: missing clip header", .0.display())]
    MissingHeader(PathBuf),

    #[error("No surviving clips for the {view} view")]
    NoSurvivingClips { view: View },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
