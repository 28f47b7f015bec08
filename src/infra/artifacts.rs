// ============================================================
// Layer 6 — Artifact Resolver
// ============================================================
// Finds the checkpoint to serve. Training runs drop their best
// checkpoint somewhere under the artifacts root, one directory
// per run:
//
//   artifacts/
//     2024-05-01_resnet50/best.mpk.gz
//     2024-05-03_resnet50/fold2/best.mpk.gz   ← newest mtime wins
//
// Every file named exactly `file_name`, at any depth, is a
// candidate. The newest modification time is authoritative;
// on equal times the first path in glob's (sorted) order wins.

use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::domain::traits::{Artifact, ArtifactSource};

/// Default checkpoint file name written by the training notebooks
pub const DEFAULT_CHECKPOINT_NAME: &str = "best.mpk.gz";

pub struct ArtifactResolver {
    root:      PathBuf,
    file_name: String,
}

impl ArtifactResolver {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self { root: root.into(), file_name: file_name.into() }
    }

    /// Every matching file under the root, in glob order.
    pub fn candidates(&self) -> Vec<Artifact> {
        // Escape the root so brackets or stars in directory names stay literal
        let pattern = format!(
            "{}/**/{}",
            Pattern::escape(&self.root.to_string_lossy()),
            Pattern::escape(&self.file_name),
        );

        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Invalid artifact pattern '{}': {}", pattern, e);
                return Vec::new();
            }
        };

        paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping unreadable artifact entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let modified = path.metadata().and_then(|m| m.modified());
                match modified {
                    Ok(modified) => Some(Artifact { path, modified }),
                    Err(e) => {
                        tracing::warn!("Cannot stat '{}': {}", path.display(), e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl ArtifactSource for ArtifactResolver {
    fn resolve(&self) -> ClassifierResult<Artifact> {
        let candidates = self.candidates();
        tracing::debug!("Found {} checkpoint candidates", candidates.len());

        // Strict comparison keeps the first of equally new candidates
        candidates
            .into_iter()
            .reduce(|best, next| if next.modified > best.modified { next } else { best })
            .ok_or_else(|| ClassifierError::ArtifactNotFound {
                root:      self.root.clone(),
                file_name: self.file_name.clone(),
            })
    }
}
