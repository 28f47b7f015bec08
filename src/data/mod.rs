// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between uploaded bytes and a network-ready tensor:
//
//   upload bytes
//       │
//       ▼
//   decode_image      → RGB8 image (rejects non-images)
//       │
//       ▼
//   ImageTransform    → resize, scale, normalise
//       │
//       ▼
//   Tensor [1, 3, S, S]

/// Image decoding and the fixed preprocessing transform
pub mod preprocessor;
