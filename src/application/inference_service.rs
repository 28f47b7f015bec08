// ============================================================
// Layer 2 — Inference Service
// ============================================================
// Owns the classifier for the lifetime of the process and
// exposes the two operations the API serves: health and
// predict.
//
// The network is loaded lazily, at most once:
//
//   Step 1: Resolve the newest checkpoint        (Layer 6 - infra)
//   Step 2: Load the raw payload                 (Layer 6 - infra)
//   Step 3: Interpret it                         (Layer 6 - infra)
//   Step 4: Adopt the ready model, or build a
//           network and load parameters leniently (Layer 5 - ml)
//   Step 5: Place the network on the device      (Layer 5 - ml)
//   Step 6: Build the preprocessing transform    (Layer 4 - data)
//   Step 7: Check a zero image yields [1, classes]
//   Step 8: Label count vs. class count, checked on every
//           predict, so /health still reports the resolved count
//
// State machine:
//
//   Uninitialized → Initializing → Ready
//                              └─→ Failed   (terminal, no retry)
//
// The outcome lives in a OnceLock. Concurrent first callers
// block on the one running initialization instead of starting
// their own; the cached error makes Failed permanent until the
// process restarts. A panic while building or checking the
// network is caught and cached as a malformed checkpoint, so it
// cannot leave the service stuck in Initializing.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
};

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::ImageTransform;
use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::domain::labels::LabelSet;
use crate::domain::prediction::PredictionResult;
use crate::domain::traits::{Artifact, ArtifactSource};
use crate::infra::artifacts::ArtifactResolver;
use crate::infra::checkpoint::{Checkpoint, CheckpointManager};
use crate::infra::config::ServiceConfig;
use crate::ml::inferencer::Inferencer;
use crate::ml::model::ArchitectureConfig;
use crate::ml::params::load_parameters;

// ─── Public report types ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

/// Body of GET /health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status:      HealthStatus,
    pub device:      String,
    pub num_classes: Option<usize>,
    pub labels:      usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail:      Option<String>,
}

// ─── Ready state ──────────────────────────────────────────────────────────────
/// Everything built by a successful initialization.
struct ReadyModel<B: Backend> {
    // Forward passes are serialised; the network itself is never mutated
    inferencer:  Mutex<Inferencer<B>>,
    transform:   ImageTransform,
    num_classes: usize,
    artifact:    Artifact,
}

// ─── InferenceService ─────────────────────────────────────────────────────────
pub struct InferenceService<B: Backend> {
    labels:        LabelSet,
    image_size:    usize,
    architecture:  ArchitectureConfig,
    device:        B::Device,
    source:        Box<dyn ArtifactSource>,
    checkpoints:   CheckpointManager,
    ready:         OnceLock<ClassifierResult<Arc<ReadyModel<B>>>>,
    initializing:  AtomicBool,
    load_attempts: AtomicUsize,
}

impl<B: Backend> InferenceService<B> {
    /// A service that scans `config.artifacts_root` for checkpoints.
    pub fn new(config: &ServiceConfig, device: B::Device) -> Self {
        let resolver = ArtifactResolver::new(&config.artifacts_root, config.checkpoint_name.clone());
        Self::with_source(Box::new(resolver), config, device)
    }

    /// A service that takes its checkpoint from any artifact source.
    pub fn with_source(source: Box<dyn ArtifactSource>, config: &ServiceConfig, device: B::Device) -> Self {
        Self {
            labels:        config.labels.clone(),
            image_size:    config.image_size,
            architecture:  config.architecture.clone(),
            device,
            source,
            checkpoints:   CheckpointManager::new(),
            ready:         OnceLock::new(),
            initializing:  AtomicBool::new(false),
            load_attempts: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> ServiceState {
        match self.ready.get() {
            Some(Ok(_))  => ServiceState::Ready,
            Some(Err(_)) => ServiceState::Failed,
            None if self.initializing.load(Ordering::SeqCst) => ServiceState::Initializing,
            None => ServiceState::Uninitialized,
        }
    }

    /// How many initialization sequences have started (0 or 1).
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    /// Debug rendering of the compute device
    pub fn device_name(&self) -> String {
        format!("{:?}", self.device)
    }

    /// Initialize if needed and report readiness. Never fails:
    /// initialization errors are described in the report.
    pub fn health(&self) -> HealthReport {
        let device = self.device_name();
        let labels = self.labels.len();

        match self.ensure_ready() {
            Ok(ready) => HealthReport {
                status:      HealthStatus::Ok,
                device,
                num_classes: Some(ready.num_classes),
                labels,
                detail:      None,
            },
            Err(e) => HealthReport {
                status:      HealthStatus::Error,
                device,
                num_classes: None,
                labels,
                detail:      Some(e.to_string()),
            },
        }
    }

    /// Classify one uploaded image.
    pub fn predict(&self, image_bytes: &[u8]) -> ClassifierResult<PredictionResult> {
        let ready = self.ensure_ready()?;

        if self.labels.len() != ready.num_classes {
            return Err(ClassifierError::LabelCountMismatch {
                model:  ready.num_classes,
                labels: self.labels.len(),
            });
        }

        let input = ready.transform.preprocess::<B>(image_bytes, &self.device)?;

        let probs = {
            // A panicked forward pass leaves the network untouched
            let inferencer = ready.inferencer.lock().unwrap_or_else(PoisonError::into_inner);
            inferencer.probabilities(input)?
        };

        let result = PredictionResult::from_probabilities(&probs, &self.labels)
            .ok_or(ClassifierError::ShapeMismatch { shape: vec![1, probs.len()] })?;

        tracing::debug!(
            "Predicted {} ({:.4}) using '{}'",
            result.top1.class_name,
            result.top1.confidence,
            ready.artifact.path.display(),
        );
        Ok(result)
    }

    /// Run initialization exactly once; later callers get the cached outcome.
    fn ensure_ready(&self) -> ClassifierResult<Arc<ReadyModel<B>>> {
        self.ready
            .get_or_init(|| {
                let _initializing = InitializingFlag::raise(&self.initializing);
                let result = self.initialize().map(Arc::new);

                if let Err(e) = &result {
                    tracing::error!("Classifier initialization failed: {}", e);
                }
                result
            })
            .clone()
    }

    fn initialize(&self) -> ClassifierResult<ReadyModel<B>> {
        self.load_attempts.fetch_add(1, Ordering::SeqCst);

        // ── Step 1: Newest checkpoint ─────────────────────────────────────────
        let artifact = self.source.resolve()?;
        tracing::info!("Loading checkpoint from: {}", artifact.path.display());

        let path = artifact.path.clone();
        catch_panic(&path, || self.build_ready_model(artifact))
    }

    /// Steps 2-7 for one resolved checkpoint.
    fn build_ready_model(&self, artifact: Artifact) -> ClassifierResult<ReadyModel<B>> {
        if self.image_size == 0 {
            return Err(ClassifierError::malformed(&artifact.path, "input image size must be positive"));
        }

        // ── Steps 2-3: Load and interpret ─────────────────────────────────────
        let checkpoint = self.checkpoints.load(&artifact.path)?;
        tracing::info!("Checkpoint holds a {}", checkpoint.describe());

        // ── Step 4: Adopt or rebuild ──────────────────────────────────────────
        let (model, known_classes) = match checkpoint {
            Checkpoint::Ready(module) => {
                let model = module.instantiate::<B>(&artifact.path, &self.device)?;
                tracing::info!("Loaded full model object");
                (model, None)
            }
            Checkpoint::Parameters { params, .. } => {
                let num_classes = self.labels.len();
                let config = self.architecture.with_classes(num_classes);
                config.check().map_err(|reason| {
                    ClassifierError::malformed(&artifact.path, format!("cannot rebuild network: {reason}"))
                })?;

                let model = config.init::<B>(&self.device);
                let (model, report) = load_parameters::<B, _>(model, &params, &artifact.path)?;
                report.log();
                (model, Some(num_classes))
            }
        };

        // ── Steps 5-6: Device and transform ───────────────────────────────────
        let inferencer = Inferencer::new(model, self.device.clone());
        let transform  = ImageTransform::new(self.image_size);

        // ── Step 7: Output contract ───────────────────────────────────────────
        let width = inferencer.validate_output(self.image_size)?;
        let num_classes = match known_classes {
            Some(n) if n != width => {
                return Err(ClassifierError::ShapeMismatch { shape: vec![1, width] });
            }
            Some(n) => n,
            None    => width,
        };

        tracing::info!("Model ready on {:?}, num_classes={}", self.device, num_classes);
        Ok(ReadyModel {
            inferencer: Mutex::new(inferencer),
            transform,
            num_classes,
            artifact,
        })
    }
}

// ─── Initialization guards ────────────────────────────────────────────────────
/// Holds the Initializing flag up for as long as it lives, unwinding included.
struct InitializingFlag<'a>(&'a AtomicBool);

impl<'a> InitializingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Run `build`, turning a panic into a malformed-checkpoint error for `path`.
fn catch_panic<T>(path: &Path, build: impl FnOnce() -> ClassifierResult<T>) -> ClassifierResult<T> {
    panic::catch_unwind(AssertUnwindSafe(build)).unwrap_or_else(|payload| {
        Err(ClassifierError::malformed(
            path,
            format!("network could not be built: {}", panic_message(payload.as_ref())),
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::{CheckpointEntry, CheckpointPayload, ModelArtifact, STATE_DICT_KEYS};
    use crate::ml::params::ParameterSet;
    use crate::test_support::*;
    use std::path::Path;

    fn service(root: &Path) -> InferenceService<TestBackend> {
        InferenceService::new(&test_config(root), Default::default())
    }

    fn assert_well_formed(result: &PredictionResult, num_classes: usize) {
        assert_eq!(result.top3.len(), num_classes.min(3));
        assert_eq!(result.top1, result.top3[0]);
        assert!(result.top3.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
        assert!(result.top3.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_starts_uninitialized_and_lazy() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(12));

        let svc = service(dir.path());
        assert_eq!(svc.state(), ServiceState::Uninitialized);
        assert_eq!(svc.load_attempts(), 0);

        let health = svc.health();
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(svc.state(), ServiceState::Ready);
    }

    #[test]
    fn test_ready_model_checkpoint_serves() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(12));

        let svc    = service(dir.path());
        let health = svc.health();
        assert_eq!(health.num_classes, Some(12));
        assert_eq!(health.labels, 12);
        assert!(health.detail.is_none());

        assert_well_formed(&svc.predict(&png_bytes(40, 30)).unwrap(), 12);
    }

    #[test]
    fn test_every_wrapped_parameter_mapping_serves() {
        for key in STATE_DICT_KEYS {
            let dir = tempfile::tempdir().unwrap();
            write_checkpoint(dir.path(), "run1", &mapping_payload(key, exported_parameters(12)));

            let svc = service(dir.path());
            assert_eq!(svc.health().status, HealthStatus::Ok, "key {key}");
            assert_eq!(svc.state(), ServiceState::Ready);
            assert_well_formed(&svc.predict(&png_bytes(20, 20)).unwrap(), 12);
        }
    }

    #[test]
    fn test_unrecognised_mapping_fails_terminally() {
        let dir = tempfile::tempdir().unwrap();
        let payload = CheckpointPayload::Mapping {
            entries: [
                ("epoch".to_string(), CheckpointEntry::Integer(4)),
                ("weights".to_string(), CheckpointEntry::Parameters(exported_parameters(12))),
            ]
            .into_iter()
            .collect(),
        };
        write_checkpoint(dir.path(), "run1", &payload);

        let svc    = service(dir.path());
        let health = svc.health();
        assert_eq!(health.status, HealthStatus::Error);
        assert_eq!(health.num_classes, None);
        assert!(health.detail.unwrap().contains("malformed checkpoint"));
        assert_eq!(svc.state(), ServiceState::Failed);

        let err = svc.predict(&png_bytes(8, 8)).unwrap_err();
        assert_eq!(err.kind(), "malformed_checkpoint");

        // Failed is terminal: no second initialization
        svc.health();
        assert_eq!(svc.load_attempts(), 1);
    }

    #[test]
    fn test_missing_artifact_reported_by_health() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let health = svc.health();
        assert_eq!(health.status, HealthStatus::Error);
        assert_eq!(health.labels, 12);
        assert!(health.detail.unwrap().contains("no checkpoint"));
        assert_eq!(svc.predict(&png_bytes(8, 8)).unwrap_err().kind(), "artifact_not_found");
    }

    #[test]
    fn test_newest_checkpoint_wins() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_checkpoint(dir.path(), "old", &module_payload(5));
        let new = write_checkpoint(dir.path(), "new", &module_payload(12));
        set_age(&old, 3600);
        set_age(&new, 10);

        let svc = service(dir.path());
        assert_eq!(svc.health().num_classes, Some(12));
    }

    #[test]
    fn test_partial_parameter_load_still_serves() {
        let dir = tempfile::tempdir().unwrap();
        // Trained with a 7-way head: fc.* will not align, the rest will
        let mut snapshots = model_snapshots(7);
        snapshots.push(named_tensor("bn1.num_batches_tracked", vec![1], vec![100.0]));
        let params = ParameterSet::from_snapshots(snapshots).unwrap();
        write_checkpoint(dir.path(), "run1", &mapping_payload("state_dict", params));

        let svc = service(dir.path());
        let health = svc.health();
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.num_classes, Some(12));
        assert!(svc.predict(&png_bytes(16, 16)).is_ok());
    }

    #[test]
    fn test_label_count_mismatch_surfaces_at_predict() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(5));

        let svc    = service(dir.path());
        let health = svc.health();
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.num_classes, Some(5));
        assert_eq!(health.labels, 12);

        let err = svc.predict(&png_bytes(16, 16)).unwrap_err();
        assert_eq!(err, ClassifierError::LabelCountMismatch { model: 5, labels: 12 });
    }

    #[test]
    fn test_small_label_set_limits_top_k() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(2));

        let mut config = test_config(dir.path());
        config.labels = LabelSet::new(["Bengal", "Sphynx"]);
        let svc = InferenceService::<TestBackend>::new(&config, Default::default());

        assert_well_formed(&svc.predict(&png_bytes(16, 16)).unwrap(), 2);
    }

    #[test]
    fn test_invalid_image_does_not_break_service() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(12));
        let svc = service(dir.path());

        let err = svc.predict(b"GIF89a but not really").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(svc.state(), ServiceState::Ready);
        assert!(svc.predict(&png_bytes(16, 16)).is_ok());
    }

    #[test]
    fn test_identical_inputs_give_identical_outputs() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(12));
        let svc   = service(dir.path());
        let bytes = png_bytes(37, 23);

        let a = serde_json::to_vec(&svc.predict(&bytes).unwrap()).unwrap();
        let b = serde_json::to_vec(&svc.predict(&bytes).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_concurrent_cold_requests_initialize_once() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &mapping_payload("model_state_dict", exported_parameters(12)));
        let svc   = service(dir.path());
        let bytes = png_bytes(24, 24);

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..50).map(|_| s.spawn(|| svc.predict(&bytes))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.len(), 50);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(svc.load_attempts(), 1);
        assert_eq!(svc.state(), ServiceState::Ready);
    }

    #[test]
    fn test_unbuildable_ready_model_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let payload = CheckpointPayload::Module(ModelArtifact {
            architecture: tiny_architecture().with_classes(12).with_blocks([1, 0, 1, 1]),
            weights:      exported_parameters(12),
        });
        write_checkpoint(dir.path(), "run1", &payload);

        let svc = service(dir.path());
        assert_eq!(svc.health().status, HealthStatus::Error);
        assert_eq!(svc.health().status, HealthStatus::Error);

        assert_eq!(svc.state(), ServiceState::Failed);
        assert_eq!(svc.load_attempts(), 1);
        assert_eq!(svc.predict(&png_bytes(8, 8)).unwrap_err().kind(), "malformed_checkpoint");
    }

    #[test]
    fn test_unbuildable_rebuild_layout_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &mapping_payload("state_dict", exported_parameters(12)));

        let mut config = test_config(dir.path());
        config.architecture.base_width = 0;
        let svc = InferenceService::<TestBackend>::new(&config, Default::default());

        let detail = svc.health().detail.unwrap();
        assert!(detail.contains("cannot rebuild network"), "{detail}");
        svc.health();
        assert_eq!(svc.state(), ServiceState::Failed);
        assert_eq!(svc.load_attempts(), 1);
    }

    #[test]
    fn test_zero_image_size_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "run1", &module_payload(12));

        let mut config = test_config(dir.path());
        config.image_size = 0;
        let svc = InferenceService::<TestBackend>::new(&config, Default::default());

        assert_eq!(svc.predict(&png_bytes(8, 8)).unwrap_err().kind(), "malformed_checkpoint");
        assert_eq!(svc.state(), ServiceState::Failed);
    }

    #[test]
    fn test_panic_while_building_becomes_malformed() {
        let err = catch_panic::<()>(Path::new("run1/best.mpk.gz"), || panic!("conv weight has rank 0"))
            .unwrap_err();

        assert_eq!(err.kind(), "malformed_checkpoint");
        assert!(err.to_string().contains("run1/best.mpk.gz"));
        assert!(err.to_string().contains("conv weight has rank 0"));
        assert_eq!(catch_panic(Path::new("x"), || Ok(7)), Ok(7));
    }

    #[test]
    fn test_initializing_flag_drops_on_unwind() {
        let flag = AtomicBool::new(false);

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _raised = InitializingFlag::raise(&flag);
            assert!(flag.load(Ordering::SeqCst));
            panic!("initialization blew up");
        }));

        assert!(unwound.is_err());
        assert!(!flag.load(Ordering::SeqCst));
    }
}
