// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `serve`   — runs the HTTP API (see crate::api)
//   2. `predict` — classifies one local image
//   3. `inspect` — describes the checkpoint that would be served

pub mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InspectArgs, PredictArgs, ServeArgs};

use crate::application::inference_service::InferenceService;
use crate::ServeBackend;

#[derive(Parser, Debug)]
#[command(
    name = "breed-classifier",
    version,
    about = "Serve a trained ResNet cat-breed classifier over HTTP."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args)   => run_serve(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

/// Handles the `serve` subcommand.
/// The model is loaded on the first request, not here.
fn run_serve(args: ServeArgs) -> Result<()> {
    let config  = args.resolve()?;
    let service = Arc::new(InferenceService::<ServeBackend>::new(&config, Default::default()));

    tracing::info!(
        "Starting breed classifier (artifacts: '{}', {} labels)",
        config.artifacts_root.display(),
        config.labels.len(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Cannot start async runtime")?;
    runtime.block_on(crate::api::serve(service, &config))
}

/// Handles the `predict` subcommand.
fn run_predict(args: PredictArgs) -> Result<()> {
    let config = args.common.resolve()?;
    let bytes  = std::fs::read(&args.image)
        .with_context(|| format!("Cannot read image '{}'", args.image.display()))?;

    let service = InferenceService::<ServeBackend>::new(&config, Default::default());
    let result  = service
        .predict(&bytes)
        .with_context(|| format!("Prediction failed for '{}'", args.image.display()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Handles the `inspect` subcommand.
fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let config = args.common.resolve()?;
    let report = InspectUseCase::new(&config)
        .execute()
        .context("Cannot inspect checkpoint")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
