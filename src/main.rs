#![allow(dead_code, unused_imports)]
#![recursion_limit = "256"]

mod cli;
mod api;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

/// Backend the service runs inference on.
#[cfg(not(feature = "wgpu"))]
pub type ServeBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type ServeBackend = burn::backend::Wgpu;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("breed_classifier=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
