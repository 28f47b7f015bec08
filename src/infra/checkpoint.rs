// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Reads and writes checkpoint files and decides what is inside.
//
// On disk a checkpoint is a gzip-compressed MessagePack
// document (the same container Burn's CompactRecorder uses)
// holding a CheckpointPayload in one of two shapes:
//
//   Module  — a ready-to-use network: its architecture plus
//             the complete Burnpack record of its weights
//
//   Mapping — a training checkpoint: an outer map of named
//             entries, e.g.
//               epoch            → Integer(12)
//               best_acc         → Float(0.93)
//               model_state_dict → Parameters({...})
//
// interpret() turns a payload into an explicit Checkpoint
// variant. For mappings the parameter set is looked up under
// STATE_DICT_KEYS in priority order; the first key holding a
// Parameters entry wins. Anything else is malformed.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use burn::prelude::*;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::ml::model::{ResNet, ResNetConfig};
use crate::ml::params::{load_parameters, ParameterSet};

/// Keys searched for a nested parameter mapping, highest priority first
pub const STATE_DICT_KEYS: [&str; 3] = ["model_state_dict", "state_dict", "model"];

// ─── On-disk payload ──────────────────────────────────────────────────────────
/// Everything a checkpoint file can contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPayload {
    Module(ModelArtifact),
    Mapping { entries: BTreeMap<String, CheckpointEntry> },
}

/// One value in a training checkpoint's outer mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointEntry {
    Parameters(ParameterSet),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A self-describing network: architecture plus every weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub architecture: ResNetConfig,
    pub weights:      ParameterSet,
}

impl ModelArtifact {
    /// Rebuild the network. Every parameter must line up exactly,
    /// otherwise the artifact does not describe its own network.
    pub fn instantiate<B: Backend>(&self, path: &Path, device: &B::Device) -> ClassifierResult<ResNet<B>> {
        self.architecture
            .check()
            .map_err(|reason| ClassifierError::malformed(path, format!("invalid architecture: {reason}")))?;

        let model = self.architecture.init::<B>(device);
        let (model, report) = load_parameters::<B, _>(model, &self.weights, path)?;

        if !report.is_clean() {
            return Err(ClassifierError::malformed(
                path,
                format!(
                    "ready model does not match its architecture \
                     (missing={:?}, unexpected={:?}, mismatched={:?})",
                    report.missing, report.unexpected, report.mismatched,
                ),
            ));
        }
        Ok(model)
    }
}

// ─── Interpreted checkpoint ───────────────────────────────────────────────────
/// What the service should do with a loaded payload.
#[derive(Debug, Clone)]
pub enum Checkpoint {
    /// Adopt as is
    Ready(ModelArtifact),

    /// Build a network and load these parameters into it
    Parameters {
        /// The mapping key the parameters were found under
        key:    &'static str,
        params: ParameterSet,
    },
}

impl Checkpoint {
    /// Short description for logs and the inspect command
    pub fn describe(&self) -> String {
        match self {
            Self::Ready(artifact) => format!(
                "ready model ({} classes, {} tensors)",
                artifact.architecture.num_classes,
                tensor_count(&artifact.weights),
            ),
            Self::Parameters { key, params } => {
                format!("parameter mapping under '{}' ({} tensors)", key, tensor_count(params))
            }
        }
    }
}

fn tensor_count(params: &ParameterSet) -> String {
    params
        .shapes()
        .map(|shapes| shapes.len().to_string())
        .unwrap_or_else(|_| "unreadable".to_string())
}

/// Classify a payload as a ready model or a parameter mapping.
pub fn interpret(payload: CheckpointPayload, path: &Path) -> ClassifierResult<Checkpoint> {
    match payload {
        CheckpointPayload::Module(artifact) => Ok(Checkpoint::Ready(artifact)),
        CheckpointPayload::Mapping { mut entries } => {
            for key in STATE_DICT_KEYS {
                // A key holding the wrong kind of entry does not count
                if !matches!(entries.get(key), Some(CheckpointEntry::Parameters(_))) {
                    continue;
                }
                if let Some(CheckpointEntry::Parameters(params)) = entries.remove(key) {
                    return Ok(Checkpoint::Parameters { key, params });
                }
            }

            let found: Vec<&str> = entries.keys().map(String::as_str).collect();
            Err(ClassifierError::malformed(
                path,
                format!(
                    "mapping has no parameter set under any of {:?} (keys: {:?})",
                    STATE_DICT_KEYS, found,
                ),
            ))
        }
    }
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
/// Reads and writes checkpoint files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointManager;

impl CheckpointManager {
    pub fn new() -> Self {
        Self
    }

    /// Load the raw payload from a checkpoint file.
    /// A file that cannot be read or decoded is a malformed checkpoint.
    pub fn load_payload(&self, path: &Path) -> ClassifierResult<CheckpointPayload> {
        let file = File::open(path)
            .map_err(|e| ClassifierError::malformed(path, format!("cannot open: {e}")))?;

        let reader = GzDecoder::new(BufReader::new(file));
        rmp_serde::from_read(reader)
            .map_err(|e| ClassifierError::malformed(path, format!("cannot decode: {e}")))
    }

    /// Load and interpret in one step.
    pub fn load(&self, path: &Path) -> ClassifierResult<Checkpoint> {
        let payload = self.load_payload(path)?;
        interpret(payload, path)
    }

    /// Write a payload, creating parent directories as needed.
    pub fn save_payload(&self, path: &Path, payload: &CheckpointPayload) -> anyhow::Result<PathBuf> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Cannot create checkpoint '{}'", path.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        // Named encoding keeps struct fields as map keys, so entries stay self-describing
        rmp_serde::encode::write_named(&mut encoder, payload)
            .with_context(|| format!("Cannot encode checkpoint '{}'", path.display()))?;
        encoder.finish()?.flush()?;

        tracing::debug!("Saved checkpoint to '{}'", path.display());
        Ok(path.to_path_buf())
    }
}
