// ============================================================
// Layer 6 — Service Configuration
// ============================================================
// Everything the service needs to find, rebuild and serve the
// classifier. Stored as JSON; any field left out of the file
// keeps its default, and CLI flags override the file.
//
// Example service.json:
//   {
//     "artifacts_root": "backend/notebooks/artifacts",
//     "port": 9000
//   }

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::DEFAULT_IMAGE_SIZE;
use crate::domain::labels::LabelSet;
use crate::infra::artifacts::DEFAULT_CHECKPOINT_NAME;
use crate::ml::model::ArchitectureConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory searched (recursively) for checkpoints
    pub artifacts_root:   PathBuf,

    /// Exact file name of a checkpoint
    pub checkpoint_name:  String,

    /// Square input resolution the network was trained at
    pub image_size:       usize,

    /// Block layout used when rebuilding from raw parameters
    pub architecture:     ArchitectureConfig,

    /// Class names in logit order
    pub labels:           LabelSet,

    pub host:             String,
    pub port:             u16,

    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifacts_root:   PathBuf::from("artifacts"),
            checkpoint_name:  DEFAULT_CHECKPOINT_NAME.to_string(),
            image_size:       DEFAULT_IMAGE_SIZE,
            architecture:     ArchitectureConfig::default(),
            labels:           LabelSet::cat_breeds(),
            host:             "127.0.0.1".to_string(),
            port:             8000,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse config '{}'", path.display()))
    }

    /// Reject settings the service could never serve with.
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            bail!("image_size must be positive");
        }
        if self.labels.is_empty() {
            bail!("label set is empty");
        }
        if let Err(reason) = self.architecture.check() {
            bail!("Invalid architecture: {reason}");
        }
        Ok(())
    }

    /// Load `path` if given, otherwise start from the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let cfg = Self::load(p)?;
                tracing::info!("Loaded configuration from '{}'", p.display());
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }
}
