// Shared fixtures for unit tests: a tiny network, checkpoint
// writers and synthetic images.

use std::{
    fs::OpenOptions,
    io::Cursor,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use burn::{backend::NdArray, module::ParamId, tensor::TensorData};
use burn_store::{ModuleSnapshot, TensorSnapshot};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::infra::artifacts::DEFAULT_CHECKPOINT_NAME;
use crate::infra::checkpoint::{CheckpointEntry, CheckpointManager, CheckpointPayload, ModelArtifact};
use crate::infra::config::ServiceConfig;
use crate::ml::model::{ArchitectureConfig, ResNet};
use crate::ml::params::ParameterSet;

pub type TestBackend = NdArray<f32>;

/// Same family as ResNet-50, small enough to run in milliseconds.
pub fn tiny_architecture() -> ArchitectureConfig {
    ArchitectureConfig { blocks: [1, 1, 1, 1], base_width: 2 }
}

/// Service config pointed at `root`, serving the tiny network on 32x32 inputs.
pub fn test_config(root: &Path) -> ServiceConfig {
    ServiceConfig {
        artifacts_root: root.to_path_buf(),
        image_size:     32,
        architecture:   tiny_architecture(),
        ..ServiceConfig::default()
    }
}

/// Every tensor of a freshly initialised tiny network.
pub fn model_snapshots(num_classes: usize) -> Vec<TensorSnapshot> {
    let model: ResNet<TestBackend> = tiny_architecture().build(num_classes, &Default::default());
    ModuleSnapshot::<TestBackend>::collect(&model, None, None, false)
}

pub fn exported_parameters(num_classes: usize) -> ParameterSet {
    ParameterSet::from_snapshots(model_snapshots(num_classes)).unwrap()
}

/// A standalone f32 tensor stored under the dotted `name`.
pub fn named_tensor(name: &str, shape: Vec<usize>, values: Vec<f32>) -> TensorSnapshot {
    TensorSnapshot::from_data(
        TensorData::new(values, shape),
        name.split('.').map(str::to_string).collect(),
        Vec::new(),
        ParamId::new(),
    )
}

pub fn module_payload(num_classes: usize) -> CheckpointPayload {
    CheckpointPayload::Module(ModelArtifact {
        architecture: tiny_architecture().with_classes(num_classes),
        weights:      exported_parameters(num_classes),
    })
}

/// A training checkpoint with `params` stored under `key`.
pub fn mapping_payload(key: &str, params: ParameterSet) -> CheckpointPayload {
    CheckpointPayload::Mapping {
        entries: [
            ("epoch".to_string(), CheckpointEntry::Integer(9)),
            ("best_acc".to_string(), CheckpointEntry::Float(0.87)),
            (key.to_string(), CheckpointEntry::Parameters(params)),
        ]
        .into_iter()
        .collect(),
    }
}

/// Write `payload` to `<root>/<run>/best.mpk.gz`.
pub fn write_checkpoint(root: &Path, run: &str, payload: &CheckpointPayload) -> PathBuf {
    let path = root.join(run).join(DEFAULT_CHECKPOINT_NAME);
    CheckpointManager::new().save_payload(&path, payload).unwrap()
}

/// Backdate a file's modification time.
pub fn set_age(path: &Path, age_secs: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
}

/// PNG-encoded gradient image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
