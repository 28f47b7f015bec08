// ============================================================
// Layer 3 — Class Label Set
// ============================================================
// The ordered list of breed names the network was trained on.
// Position i in this list is the name of output logit i, so
// the order must match the training run exactly.
//
// The length is NOT trusted to match the network: the
// inference service compares it against the resolved class
// count and refuses to predict when they disagree.

use serde::{Deserialize, Serialize};

/// Labels used during training, in logit order.
pub const CAT_BREEDS: [&str; 12] = [
    "Abyssinian", "Bengal", "Birman", "Bombay", "British_Shorthair",
    "Egyptian_Mau", "Maine_Coon", "Persian", "Ragdoll",
    "Russian_Blue", "Siamese", "Sphynx",
];

/// An ordered, fixed sequence of class names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    /// The 12 cat breeds the deployed checkpoints were trained on
    pub fn cat_breeds() -> Self {
        Self::new(CAT_BREEDS)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the class at logit index `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::cat_breeds()
    }
}
