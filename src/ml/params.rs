// ============================================================
// Layer 5 — Named Parameters
// ============================================================
// Moves trained weights between a burn network and a Burnpack
// parameter set, keyed by the network's dotted module paths:
//
//   conv1.weight                      → [64, 3, 7, 7]
//   layer2.0.downsample.1.running_var → [512]
//   fc.bias                           → [num_classes]
//
// Loading is LENIENT. A parameter set written by a slightly
// different network (extra counters, renamed head, different
// class count) still loads: every name that lines up in both
// name and shape is copied, everything else is reported in a
// LoadReport and the freshly initialised value is kept.

use std::{collections::BTreeMap, fmt, path::Path};

use anyhow::Context;
use burn::{prelude::*, tensor::Bytes};
use burn_store::{
    ApplyError, ApplyResult, BurnpackStore, BurnpackWriter, ModuleSnapshot, ModuleStore, TensorSnapshot,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ClassifierError, ClassifierResult};

// ─── ParameterSet ─────────────────────────────────────────────────────────────
/// Named tensors in Burnpack form, embedded inside a checkpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
}

impl ParameterSet {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Export every parameter of `module` under its module path.
    pub fn from_module<B: Backend, M: Module<B>>(module: &M) -> anyhow::Result<Self> {
        Self::from_snapshots(ModuleSnapshot::<B>::collect(module, None, None, false))
    }

    /// Pack already-named tensors.
    pub fn from_snapshots(snapshots: Vec<TensorSnapshot>) -> anyhow::Result<Self> {
        let bytes = BurnpackWriter::new(snapshots)
            .to_bytes()
            .context("Failed to pack parameters")?;
        Ok(Self::from_bytes(bytes.to_vec()))
    }

    /// Tensor name → shape, ordered by name.
    pub fn shapes(&self) -> anyhow::Result<BTreeMap<String, Vec<usize>>> {
        let mut store = self.store();
        let snapshots = store.get_all_snapshots().context("Failed to read parameter index")?;
        Ok(snapshots
            .iter()
            .map(|(name, snapshot)| (name.clone(), snapshot.shape.clone()))
            .collect())
    }

    fn store(&self) -> BurnpackStore {
        BurnpackStore::from_bytes(Some(Bytes::from_bytes_vec(self.bytes.clone())))
    }
}

impl fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParameterSet({} bytes)", self.bytes.len())
    }
}

// ─── LoadReport ───────────────────────────────────────────────────────────────
/// What happened to each parameter during a lenient load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters copied from the checkpoint
    pub loaded: usize,

    /// Network parameters the checkpoint did not provide
    pub missing: Vec<String>,

    /// Checkpoint entries the network has no slot for
    pub unexpected: Vec<String>,

    /// Names present in both but with a different shape or dtype
    pub mismatched: Vec<String>,
}

impl LoadReport {
    /// True when every parameter lined up exactly
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.mismatched.is_empty()
    }

    /// Emit the partial-load warning if anything failed to align
    pub fn log(&self) {
        if self.is_clean() {
            tracing::info!("Loaded all {} parameters", self.loaded);
        } else {
            tracing::warn!(
                loaded     = self.loaded,
                missing    = ?self.missing,
                unexpected = ?self.unexpected,
                mismatched = ?self.mismatched,
                "Partial parameter load: some names did not align with the network"
            );
        }
    }
}

impl From<ApplyResult> for LoadReport {
    fn from(result: ApplyResult) -> Self {
        let mismatched = result
            .errors
            .iter()
            .map(|error| match error {
                ApplyError::ShapeMismatch { path, .. }
                | ApplyError::DTypeMismatch { path, .. }
                | ApplyError::AdapterError { path, .. }
                | ApplyError::LoadError { path, .. } => path.clone(),
            })
            .collect();

        Self {
            loaded:     result.applied.len(),
            missing:    result.missing.into_iter().map(|(path, _container)| path).collect(),
            unexpected: result.unused,
            mismatched,
        }
    }
}

// ─── Loading ──────────────────────────────────────────────────────────────────
/// Copy every aligned tensor of `params` into `module`.
///
/// Misaligned names never fail the load; they land in the report and
/// the module keeps its initial value. Only an unreadable parameter
/// set is an error, attributed to the checkpoint at `path`.
pub fn load_parameters<B: Backend, M: Module<B>>(
    mut module: M,
    params: &ParameterSet,
    path: &Path,
) -> ClassifierResult<(M, LoadReport)> {
    let mut store = params.store().allow_partial(true).validate(false);
    let result = ModuleSnapshot::<B>::load_from(&mut module, &mut store)
        .map_err(|e| ClassifierError::malformed(path, format!("unreadable parameters: {e}")))?;
    Ok((module, LoadReport::from(result)))
}
