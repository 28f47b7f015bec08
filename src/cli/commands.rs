// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `serve`, `predict` and
// `inspect`, and their flags.
//
// Every command starts from the same ServiceConfig: the JSON
// file given with --config (or the defaults), then any flag
// given on the command line wins.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::infra::config::ServiceConfig;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP classification service
    Serve(ServeArgs),

    /// Classify one local image and print the JSON result
    Predict(PredictArgs),

    /// Show which checkpoint would be served and what it holds
    Inspect(InspectArgs),
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON service configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory searched recursively for checkpoints
    #[arg(long)]
    pub artifacts_root: Option<PathBuf>,

    /// Checkpoint file name to look for
    #[arg(long)]
    pub checkpoint_name: Option<String>,

    /// Square input resolution the network expects
    #[arg(long)]
    pub image_size: Option<usize>,
}

impl ConfigArgs {
    /// Load the config file (or defaults) and apply overrides.
    pub fn resolve(&self) -> Result<ServiceConfig> {
        let mut config = ServiceConfig::load_or_default(self.config.as_deref())?;

        if let Some(root) = &self.artifacts_root {
            config.artifacts_root = root.clone();
        }
        if let Some(name) = &self.checkpoint_name {
            config.checkpoint_name = name.clone();
        }
        if let Some(size) = self.image_size {
            config.image_size = size;
        }
        config.validate()?;
        Ok(config)
    }
}

/// All arguments for the `serve` command
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long)]
    pub port: Option<u16>,

    /// Largest accepted upload, in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl ServeArgs {
    pub fn resolve(&self) -> Result<ServiceConfig> {
        let mut config = self.common.resolve()?;

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(limit) = self.max_upload_bytes {
            config.max_upload_bytes = limit;
        }
        Ok(config)
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// Image file to classify
    #[arg(long)]
    pub image: PathBuf,
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
}
