// ============================================================
// Layer 5 — ResNet Classifier Architecture
// ============================================================
// Bottleneck ResNet (the ResNet-50 family) with a linear head
// sized to the number of breeds.
//
//   image [B, 3, S, S]
//     → conv 7x7/2 → frozen BN → ReLU → max-pool 3x3/2
//     → layer1 … layer4  (bottleneck stages, expansion 4)
//     → adaptive average pool → flatten
//     → fc                    [B, num_classes]
//
// Batch normalisation is frozen: it applies the stored running
// statistics and never updates them.
//
// Module paths follow the torchvision convention
// (conv1.weight, layer3.2.bn2.running_var, fc.bias ...). The
// shortcut projection is a (conv, bn) tuple so it lands on
// downsample.0 and downsample.1.

use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};


/// Blocks per stage for ResNet-50
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Output channels of a bottleneck = EXPANSION × its width
const EXPANSION: usize = 4;

const BN_EPSILON: f64 = 1e-5;

// ─── Builder ──────────────────────────────────────────────────────────────────
/// The serving architecture minus its head size.
/// The default is ResNet-50; other layouts stay in the same family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    pub blocks:     [usize; 4],
    pub base_width: usize,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self { blocks: RESNET50_BLOCKS, base_width: 64 }
    }
}

impl ArchitectureConfig {
    /// Reject block layouts `ResNetConfig::init` cannot build.
    pub fn check(&self) -> Result<(), String> {
        if self.base_width == 0 {
            return Err("base_width must be positive".to_string());
        }
        if let Some(stage) = self.blocks.iter().position(|&depth| depth == 0) {
            return Err(format!("stage {} has no blocks (blocks = {:?})", stage + 1, self.blocks));
        }
        Ok(())
    }

    pub fn with_classes(&self, num_classes: usize) -> ResNetConfig {
        ResNetConfig::new(num_classes)
            .with_blocks(self.blocks)
            .with_base_width(self.base_width)
    }

    /// Build an untrained network with a `num_classes`-wide head.
    /// Weights are meaningless until parameters are loaded.
    pub fn build<B: Backend>(&self, num_classes: usize, device: &B::Device) -> ResNet<B> {
        self.with_classes(num_classes).init(device)
    }
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    pub num_classes: usize,
    #[config(default = "[3, 4, 6, 3]")]
    pub blocks:      [usize; 4],
    #[config(default = 64)]
    pub base_width:  usize,
}

impl ResNetConfig {
    /// Reject layouts `init` cannot build.
    pub fn check(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be positive".to_string());
        }
        ArchitectureConfig { blocks: self.blocks, base_width: self.base_width }.check()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let conv1 = conv(3, self.base_width, 7, 2, 3, device);
        let bn1   = FrozenBatchNorm::new(self.base_width, device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // Each stage doubles the width and (after the first) halves the resolution.
        let mut in_channels = self.base_width;
        let mut stage = |index: usize| {
            let width  = self.base_width << index;
            let stride = if index == 0 { 1 } else { 2 };
            let blocks = self.build_stage(in_channels, width, self.blocks[index], stride, device);
            in_channels = width * EXPANSION;
            blocks
        };
        let layer1 = stage(0);
        let layer2 = stage(1);
        let layer3 = stage(2);
        let layer4 = stage(3);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc      = LinearConfig::new(self.base_width * 8 * EXPANSION, self.num_classes).init(device);

        ResNet { conv1, bn1, maxpool, layer1, layer2, layer3, layer4, avgpool, fc }
    }

    fn build_stage<B: Backend>(
        &self,
        in_channels: usize,
        width:       usize,
        depth:       usize,
        stride:      usize,
        device:      &B::Device,
    ) -> Vec<Bottleneck<B>> {
        (0..depth)
            .map(|i| {
                if i == 0 {
                    Bottleneck::new(in_channels, width, stride, device)
                } else {
                    Bottleneck::new(width * EXPANSION, width, 1, device)
                }
            })
            .collect()
    }
}

fn conv<B: Backend>(
    in_channels:  usize,
    out_channels: usize,
    kernel:       usize,
    stride:       usize,
    padding:      usize,
    device:       &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .init(device)
}

// ─── FrozenBatchNorm ──────────────────────────────────────────────────────────
/// Batch norm with fixed statistics: y = (x - mean) / sqrt(var + eps) * w + b
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    pub weight:       Param<Tensor<B, 1>>,
    pub bias:         Param<Tensor<B, 1>>,
    pub running_mean: Param<Tensor<B, 1>>,
    pub running_var:  Param<Tensor<B, 1>>,
    pub epsilon:      f64,
}

impl<B: Backend> FrozenBatchNorm<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            weight:       Param::from_tensor(Tensor::ones([channels], device)),
            bias:         Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var:  Param::from_tensor(Tensor::ones([channels], device)),
            epsilon:      BN_EPSILON,
        }
    }

    /// x: [batch, channels, height, width]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();

        // Fold the statistics into one scale and one shift per channel.
        let scale = self.weight.val() / (self.running_var.val() + self.epsilon).sqrt();
        let shift = self.bias.val() - self.running_mean.val() * scale.clone();

        x * scale.reshape([1, channels, 1, 1]) + shift.reshape([1, channels, 1, 1])
    }
}

// ─── Bottleneck ───────────────────────────────────────────────────────────────
/// 1x1 reduce → 3x3 (carries the stride) → 1x1 expand, plus a shortcut.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    pub conv1:      Conv2d<B>,
    pub bn1:        FrozenBatchNorm<B>,
    pub conv2:      Conv2d<B>,
    pub bn2:        FrozenBatchNorm<B>,
    pub conv3:      Conv2d<B>,
    pub bn3:        FrozenBatchNorm<B>,
    pub downsample: Option<(Conv2d<B>, FrozenBatchNorm<B>)>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn new(in_channels: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let out_channels = width * EXPANSION;

        // The shortcut needs a projection whenever the shape changes.
        let downsample = (stride != 1 || in_channels != out_channels).then(|| {
            (
                conv(in_channels, out_channels, 1, stride, 0, device),
                FrozenBatchNorm::new(out_channels, device),
            )
        });

        Self {
            conv1: conv(in_channels, width, 1, 1, 0, device),
            bn1:   FrozenBatchNorm::new(width, device),
            conv2: conv(width, width, 3, stride, 1, device),
            bn2:   FrozenBatchNorm::new(width, device),
            conv3: conv(width, out_channels, 1, 1, 0, device),
            bn3:   FrozenBatchNorm::new(out_channels, device),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some((conv, bn)) => bn.forward(conv.forward(x.clone())),
            None             => x.clone(),
        };

        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = relu(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));
        relu(out + identity)
    }
}

// ─── ResNet ───────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub bn1:     FrozenBatchNorm<B>,
    pub maxpool: MaxPool2d,
    pub layer1:  Vec<Bottleneck<B>>,
    pub layer2:  Vec<Bottleneck<B>>,
    pub layer3:  Vec<Bottleneck<B>>,
    pub layer4:  Vec<Bottleneck<B>>,
    pub avgpool: AdaptiveAvgPool2d,
    pub fc:      Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// images: [batch, 3, height, width] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(images)));
        let x = self.maxpool.forward(x);

        let x = [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
            .into_iter()
            .flatten()
            .fold(x, |x, block| block.forward(x));

        let x = self.avgpool.forward(x); // [batch, channels, 1, 1]
        let [batch, channels, _, _] = x.dims();
        self.fc.forward(x.reshape([batch, channels]))
    }

    /// Width of the linear head
    pub fn num_classes(&self) -> usize {
        // burn stores linear weights as [d_input, d_output]
        self.fc.weight.val().dims()[1]
    }
}
