// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that define what the classifier talks about:
// labels, predictions, error kinds and the artifact source
// abstraction.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits

// Closed error enumeration shared by every layer
pub mod error;

// Ordered class label set
pub mod labels;

// Ranked prediction result and top-K ranking
pub mod prediction;

// Core abstractions (traits) that other layers implement
pub mod traits;
