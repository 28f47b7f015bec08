// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Answers "what would the service load right now?" without
// building a network:
//   1. Resolve the newest checkpoint under the artifacts root
//   2. Load and interpret its payload
//   3. Summarise shape, source key and parameter count

use std::{path::PathBuf, time::SystemTime};

use serde::Serialize;

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::domain::traits::ArtifactSource;
use crate::infra::artifacts::ArtifactResolver;
use crate::infra::checkpoint::{Checkpoint, CheckpointManager};
use crate::infra::config::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub path:        PathBuf,
    /// Seconds since the Unix epoch
    pub modified:    u64,
    /// "ready_model" or "parameter_mapping"
    pub payload:     &'static str,
    pub source_key:  Option<&'static str>,
    pub num_classes: Option<usize>,
    pub tensors:     usize,
    pub values:      usize,
}

pub struct InspectUseCase {
    resolver:    ArtifactResolver,
    checkpoints: CheckpointManager,
}

impl InspectUseCase {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            resolver:    ArtifactResolver::new(&config.artifacts_root, config.checkpoint_name.clone()),
            checkpoints: CheckpointManager::new(),
        }
    }

    pub fn execute(&self) -> ClassifierResult<InspectReport> {
        let artifact = self.resolver.resolve()?;
        tracing::info!("Inspecting checkpoint: {}", artifact.path.display());

        let checkpoint = self.checkpoints.load(&artifact.path)?;
        let modified = artifact
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let (payload, source_key, num_classes, params) = match &checkpoint {
            Checkpoint::Ready(module) => (
                "ready_model",
                None,
                Some(module.architecture.num_classes),
                &module.weights,
            ),
            Checkpoint::Parameters { key, params } => ("parameter_mapping", Some(*key), None, params),
        };

        let shapes = params
            .shapes()
            .map_err(|e| ClassifierError::malformed(&artifact.path, format!("unreadable parameters: {e:#}")))?;

        Ok(InspectReport {
            path: artifact.path,
            modified,
            payload,
            source_key,
            num_classes,
            tensors: shapes.len(),
            values:  shapes.values().map(|shape| shape.iter().product::<usize>()).sum(),
        })
    }
}
