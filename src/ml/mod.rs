// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn network code.
// The domain layer never imports from burn; the application
// layer only sees ResNet, Inferencer and ParameterSet.
//
//   model.rs      — ResNet bottleneck classifier, frozen batch
//                   norm, and the builder that sizes the head
//
//   params.rs     — Burnpack parameter sets (burn-store): lenient
//                   loading with a LoadReport, export from a network
//
//   inferencer.rs — Output-shape validation and softmax
//                   probabilities for one image

/// ResNet classifier architecture and builder
pub mod model;

/// Dotted-name parameter loading and export
pub mod params;

/// Forward pass and probability extraction
pub mod inferencer;
