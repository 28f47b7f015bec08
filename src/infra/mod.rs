// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem and configuration concerns used by the other
// layers:
//
//   artifacts.rs  — Finds the newest checkpoint file under the
//                   artifacts root
//
//   checkpoint.rs — Reads/writes checkpoint files and classifies
//                   their payload (ready model vs. parameter
//                   mapping)
//
//   config.rs     — ServiceConfig: JSON file + defaults

/// Newest-checkpoint discovery
pub mod artifacts;

/// Checkpoint file format and payload interpretation
pub mod checkpoint;

/// Service configuration
pub mod config;
