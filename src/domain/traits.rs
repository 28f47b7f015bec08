// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The inference service depends on these abstractions, not on
// the filesystem scanner directly, so tests and alternative
// deployments (e.g. a fixed path baked into a container) can
// plug in their own artifact source.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::domain::error::ClassifierResult;

// ─── Artifact ─────────────────────────────────────────────────────────────────
/// A discovered checkpoint file. Immutable once found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location of the checkpoint file
    pub path: PathBuf,

    /// Last modification time, used to pick the newest run
    pub modified: SystemTime,
}

// ─── ArtifactSource ───────────────────────────────────────────────────────────
/// Anything that can point at the checkpoint to serve.
///
/// Implementations:
///   - ArtifactResolver → newest matching file under a root
pub trait ArtifactSource: Send + Sync {
    /// Return the authoritative checkpoint, or ArtifactNotFound.
    fn resolve(&self) -> ClassifierResult<Artifact>;
}
