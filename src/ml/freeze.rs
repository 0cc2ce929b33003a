// ============================================================
// Layer 5 — Parameter Groups and Staged Unfreezing
// ============================================================
// The pretrained model is partitioned into five fixed groups,
// ordered from the bottom of the network to the top:
//
//   0  Encoder            the whole encoder stack
//   1  DecoderEmbeddings  shared token embedding (= tied LM head)
//   2  DecoderPositions   decoder learned positions
//   3  DecoderLayers      all decoder layers
//   4  DecoderLayerNorm   decoder embedding layer norm
//
// `freeze_to(model, n)` leaves the top `n` groups trainable and
// stops gradients for the rest. Frozen parameters receive no
// gradient, so the optimiser never touches them.
//
// `final_logits_bias` is a buffer in the source checkpoint and
// stays frozen whatever `n` is.

use burn::{
    module::{ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
};

use crate::ml::model::BartModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamGroup {
    Encoder,
    DecoderEmbeddings,
    DecoderPositions,
    DecoderLayers,
    DecoderLayerNorm,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 5] = [
        ParamGroup::Encoder,
        ParamGroup::DecoderEmbeddings,
        ParamGroup::DecoderPositions,
        ParamGroup::DecoderLayers,
        ParamGroup::DecoderLayerNorm,
    ];

    fn apply<B: Backend>(self, mut model: BartModel<B>, require_grad: bool) -> BartModel<B> {
        let mut mapper = RequireGrad { require_grad };
        match self {
            ParamGroup::Encoder => {
                model.encoder = model.encoder.map(&mut mapper);
            }
            ParamGroup::DecoderEmbeddings => {
                model.shared = model.shared.map(&mut mapper);
            }
            ParamGroup::DecoderPositions => {
                model.decoder.embed_positions = model.decoder.embed_positions.map(&mut mapper);
            }
            ParamGroup::DecoderLayers => {
                model.decoder.layers = model.decoder.layers.map(&mut mapper);
            }
            ParamGroup::DecoderLayerNorm => {
                model.decoder.layernorm_embedding = model.decoder.layernorm_embedding.map(&mut mapper);
            }
        }
        model
    }
}

/// Make the last `trainable` groups trainable and freeze the others.
pub fn freeze_to<B: Backend>(model: BartModel<B>, trainable: usize) -> BartModel<B> {
    let total = ParamGroup::ALL.len();
    let first_trainable = total.saturating_sub(trainable);

    let mut model = ParamGroup::ALL
        .iter()
        .enumerate()
        .fold(model, |m, (idx, group)| group.apply(m, idx >= first_trainable));

    model.final_logits_bias = model.final_logits_bias.map(|t| t.set_require_grad(false));
    model
}

/// Number of scalar parameters that will receive gradients.
pub fn trainable_params<B: Backend>(model: &BartModel<B>) -> usize {
    let mut counter = TrainableCounter { count: 0 };
    model.visit(&mut counter);
    counter.count
}

struct RequireGrad {
    require_grad: bool,
}

impl<B: Backend> ModuleMapper<B> for RequireGrad {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        tensor.set_require_grad(self.require_grad)
    }
}

struct TrainableCounter {
    count: usize,
}

impl<B: Backend> ModuleVisitor<B> for TrainableCounter {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        if tensor.is_require_grad() {
            self.count += tensor.shape().num_elements();
        }
    }
}
