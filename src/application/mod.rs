// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to serve the
// classifier.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No HTTP or printing here (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination
//
//   inference_service.rs — lazy one-time model load, health
//                          and predict
//
//   inspect_use_case.rs  — which checkpoint would be served,
//                          and what is inside it

// The serving workflow
pub mod inference_service;

// Offline checkpoint inspection
pub mod inspect_use_case;
