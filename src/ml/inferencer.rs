// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs the restored network on preprocessed images.
//
// Inference mode: the serving backend has no autodiff, so no
// gradients are ever recorded, and the network has no dropout
// and only frozen batch norm, so the same input always gives
// the same output.

use burn::{prelude::*, tensor::activation::softmax};

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::ml::model::ResNet;

pub struct Inferencer<B: Backend> {
    model:  ResNet<B>,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    /// Take ownership of a network and place it on `device`.
    pub fn new(model: ResNet<B>, device: B::Device) -> Self {
        let model = model.to_device(&device);
        Self { model, device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Push one all-zero image through the network and check that
    /// it yields a [1, classes] score matrix. Returns the class count.
    pub fn validate_output(&self, image_size: usize) -> ClassifierResult<usize> {
        let dummy  = Tensor::<B, 4>::zeros([1, 3, image_size, image_size], &self.device);
        let output = self.model.forward(dummy);
        let [batch, classes] = output.dims();

        if batch != 1 || classes == 0 {
            return Err(ClassifierError::ShapeMismatch { shape: vec![batch, classes] });
        }
        Ok(classes)
    }

    /// Softmax class probabilities for a single [1, 3, S, S] image.
    pub fn probabilities(&self, image: Tensor<B, 4>) -> ClassifierResult<Vec<f32>> {
        let logits = self.model.forward(image.to_device(&self.device));
        let [batch, classes] = logits.dims();
        if batch != 1 {
            return Err(ClassifierError::ShapeMismatch { shape: vec![batch, classes] });
        }

        let probs = softmax(logits, 1);
        probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|_| ClassifierError::ShapeMismatch { shape: vec![batch, classes] })
    }
}
