// ============================================================
// Layer 3 — Classifier Error Kinds
// ============================================================
// Every failure the classifier can report, as one closed enum.
//
//   ArtifactNotFound    — no checkpoint under the artifacts root
//   MalformedCheckpoint — checkpoint exists but holds neither a
//                         ready model nor a parameter mapping
//   ShapeMismatch       — network output is not a [1, classes]
//                         score matrix
//   LabelCountMismatch  — label set and network disagree on the
//                         number of classes
//   InvalidInput        — uploaded bytes are not a decodable image
//
// Partial parameter loads are not errors: they are logged by
// the ML layer and serving continues.
//
// The enum is Clone because a failed initialization is cached
// and handed back to every later caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("no checkpoint named '{file_name}' found under '{}'", root.display())]
    ArtifactNotFound { root: PathBuf, file_name: String },

    #[error("malformed checkpoint '{}': {reason}", path.display())]
    MalformedCheckpoint { path: PathBuf, reason: String },

    #[error("unexpected model output shape {shape:?}")]
    ShapeMismatch { shape: Vec<usize> },

    #[error("class count mismatch: model={model}, labels={labels}")]
    LabelCountMismatch { model: usize, labels: usize },

    #[error("invalid input image: {0}")]
    InvalidInput(String),
}

impl ClassifierError {
    /// Stable snake_case name of the error kind, used in API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArtifactNotFound { .. }    => "artifact_not_found",
            Self::MalformedCheckpoint { .. } => "malformed_checkpoint",
            Self::ShapeMismatch { .. }       => "shape_mismatch",
            Self::LabelCountMismatch { .. }  => "label_count_mismatch",
            Self::InvalidInput(_)            => "invalid_input",
        }
    }

    /// Shorthand for a malformed checkpoint at `path`.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedCheckpoint { path: path.into(), reason: reason.into() }
    }
}

/// Result alias used by every layer below the CLI.
pub type ClassifierResult<T> = Result<T, ClassifierError>;
