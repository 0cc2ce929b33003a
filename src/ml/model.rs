use burn::{
    module::Param,
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::data::batcher::SummaryBatch;
use crate::ml::loss::SequenceLoss;

/// BART's learned position tables reserve the first two rows.
pub const POSITION_OFFSET: usize = 2;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct BartConfig {
    pub vocab_size:              usize,
    pub d_model:                 usize,
    pub encoder_layers:          usize,
    pub decoder_layers:          usize,
    pub encoder_attention_heads: usize,
    pub decoder_attention_heads: usize,
    pub encoder_ffn_dim:         usize,
    pub decoder_ffn_dim:         usize,
    pub max_position_embeddings: usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
    #[config(default = 0.0)]
    pub attention_dropout:       f64,
    #[config(default = false)]
    pub scale_embedding:         bool,
    #[config(default = 1)]
    pub pad_token_id:            usize,
}

impl BartConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BartModel<B> {
        let shared = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);

        let encoder = BartEncoder {
            embed_positions:     self.position_table(device),
            layers:              (0..self.encoder_layers).map(|_| self.encoder_layer(device)).collect(),
            layernorm_embedding: LayerNormConfig::new(self.d_model).init(device),
            dropout:             DropoutConfig::new(self.dropout).init(),
        };
        let decoder = BartDecoder {
            embed_positions:     self.position_table(device),
            layers:              (0..self.decoder_layers).map(|_| self.decoder_layer(device)).collect(),
            layernorm_embedding: LayerNormConfig::new(self.d_model).init(device),
            dropout:             DropoutConfig::new(self.dropout).init(),
        };

        let final_logits_bias = Param::from_tensor(Tensor::zeros([1, self.vocab_size], device));
        let embed_scale = if self.scale_embedding { (self.d_model as f64).sqrt() } else { 1.0 };

        BartModel { shared, encoder, decoder, final_logits_bias, embed_scale }
    }

    fn position_table<B: Backend>(&self, device: &B::Device) -> Embedding<B> {
        EmbeddingConfig::new(self.max_position_embeddings + POSITION_OFFSET, self.d_model).init(device)
    }

    fn attention<B: Backend>(&self, heads: usize, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.d_model, heads)
            .with_dropout(self.attention_dropout)
            .init(device)
    }

    fn encoder_layer<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            self_attn:            self.attention(self.encoder_attention_heads, device),
            self_attn_layer_norm: LayerNormConfig::new(self.d_model).init(device),
            fc1:                  LinearConfig::new(self.d_model, self.encoder_ffn_dim).init(device),
            fc2:                  LinearConfig::new(self.encoder_ffn_dim, self.d_model).init(device),
            final_layer_norm:     LayerNormConfig::new(self.d_model).init(device),
            dropout:              DropoutConfig::new(self.dropout).init(),
        }
    }

    fn decoder_layer<B: Backend>(&self, device: &B::Device) -> DecoderLayer<B> {
        DecoderLayer {
            self_attn:               self.attention(self.decoder_attention_heads, device),
            self_attn_layer_norm:    LayerNormConfig::new(self.d_model).init(device),
            encoder_attn:            self.attention(self.decoder_attention_heads, device),
            encoder_attn_layer_norm: LayerNormConfig::new(self.d_model).init(device),
            fc1:                     LinearConfig::new(self.d_model, self.decoder_ffn_dim).init(device),
            fc2:                     LinearConfig::new(self.decoder_ffn_dim, self.d_model).init(device),
            final_layer_norm:        LayerNormConfig::new(self.d_model).init(device),
            dropout:                 DropoutConfig::new(self.dropout).init(),
        }
    }
}

// Field names follow the Hugging Face state dict so pretrained
// weights load with a handful of key remaps (see infra::pretrained).

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub self_attn:            MultiHeadAttention<B>,
    pub self_attn_layer_norm: LayerNorm<B>,
    pub fc1:                  Linear<B>,
    pub fc2:                  Linear<B>,
    pub final_layer_norm:     LayerNorm<B>,
    pub dropout:              Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.self_attn_layer_norm.forward(x + self.dropout.forward(attn));

        let ffn = self.fc2.forward(gelu(self.fc1.forward(x.clone())));
        self.final_layer_norm.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub self_attn:               MultiHeadAttention<B>,
    pub self_attn_layer_norm:    LayerNorm<B>,
    pub encoder_attn:            MultiHeadAttention<B>,
    pub encoder_attn_layer_norm: LayerNorm<B>,
    pub fc1:                     Linear<B>,
    pub fc2:                     Linear<B>,
    pub final_layer_norm:        LayerNorm<B>,
    pub dropout:                 Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(
        &self,
        x:              Tensor<B, 3>,
        causal_mask:    Tensor<B, 3, Bool>,
        encoder_states: Tensor<B, 3>,
        encoder_pad:    Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let attn = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal_mask))
            .context;
        let x = self.self_attn_layer_norm.forward(x + self.dropout.forward(attn));

        let cross = self.encoder_attn
            .forward(MhaInput::new(x.clone(), encoder_states.clone(), encoder_states).mask_pad(encoder_pad))
            .context;
        let x = self.encoder_attn_layer_norm.forward(x + self.dropout.forward(cross));

        let ffn = self.fc2.forward(gelu(self.fc1.forward(x.clone())));
        self.final_layer_norm.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct BartEncoder<B: Backend> {
    pub embed_positions:     Embedding<B>,
    pub layers:              Vec<EncoderLayer<B>>,
    pub layernorm_embedding: LayerNorm<B>,
    pub dropout:             Dropout,
}

#[derive(Module, Debug)]
pub struct BartDecoder<B: Backend> {
    pub embed_positions:     Embedding<B>,
    pub layers:              Vec<DecoderLayer<B>>,
    pub layernorm_embedding: LayerNorm<B>,
    pub dropout:             Dropout,
}

#[derive(Module, Debug)]
pub struct BartModel<B: Backend> {
    /// Token embedding shared by encoder, decoder and the LM head
    pub shared:            Embedding<B>,
    pub encoder:           BartEncoder<B>,
    pub decoder:           BartDecoder<B>,
    /// Buffer in the original checkpoint; kept frozen here
    pub final_logits_bias: Param<Tensor<B, 2>>,
    pub embed_scale:       f64,
}

impl<B: Backend> BartModel<B> {
    /// Token + learned position embeddings, shape [batch, seq, d_model].
    fn embed(&self, positions: &Embedding<B>, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let device = ids.device();

        let tokens = self.shared.forward(ids).mul_scalar(self.embed_scale);
        let offsets = Tensor::<B, 1, Int>::arange(
            POSITION_OFFSET as i64..(seq_len + POSITION_OFFSET) as i64,
            &device,
        )
        .unsqueeze::<2>()
        .expand([batch_size, seq_len]);

        tokens + positions.forward(offsets)
    }

    /// input_ids, attention_mask: [batch, src] → encoder states [batch, src, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let pad_mask = attention_mask.equal_elem(0);
        let enc = &self.encoder;

        let x = self.embed(&enc.embed_positions, input_ids);
        let mut x = enc.dropout.forward(enc.layernorm_embedding.forward(x));
        for layer in &enc.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        x
    }

    /// decoder_input_ids: [batch, tgt] → vocabulary logits [batch, tgt, vocab]
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        encoder_states:    Tensor<B, 3>,
        attention_mask:    Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let device      = decoder_input_ids.device();
        let encoder_pad = attention_mask.equal_elem(0);
        let causal      = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);
        let dec         = &self.decoder;

        let x = self.embed(&dec.embed_positions, decoder_input_ids);
        let mut x = dec.dropout.forward(dec.layernorm_embedding.forward(x));
        for layer in &dec.layers {
            x = layer.forward(x, causal.clone(), encoder_states.clone(), encoder_pad.clone());
        }
        self.lm_head(x)
    }

    /// Project hidden states onto the (tied) vocabulary embedding.
    fn lm_head(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, d_model] = hidden.dims();
        let weight = self.shared.weight.val();
        let [vocab, _] = weight.dims();

        let logits = hidden
            .reshape([batch_size * seq_len, d_model])
            .matmul(weight.transpose());
        let bias = self.final_logits_bias.val().expand([batch_size * seq_len, vocab]);

        (logits + bias).reshape([batch_size, seq_len, vocab])
    }

    /// The wrapped conditional-generation forward: only the logits leave the model.
    pub fn forward(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let encoder_states = self.encode(input_ids, attention_mask.clone());
        self.decode(decoder_input_ids, encoder_states, attention_mask)
    }

    pub fn forward_loss(&self, batch: SummaryBatch<B>, loss: &SequenceLoss) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(batch.input_ids, batch.attention_mask, batch.decoder_input_ids);
        (loss.forward(logits.clone(), batch.labels), logits)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ints(values: &[i32], shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).reshape(shape)
    }

    fn floats(t: Tensor<TestBackend, 3>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec().unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: BartModel<TestBackend> = fixtures::tiny_config().init(&device);

        let logits = model.forward(
            ints(&[0, 4, 5, 2, 0, 6, 2, 1], [2, 4]),
            ints(&[1, 1, 1, 1, 1, 1, 1, 0], [2, 4]),
            ints(&[2, 0, 7, 2, 0, 8], [2, 3]),
        );
        assert_eq!(logits.dims(), [2, 3, 10]);
    }

    #[test]
    fn test_encoder_padding_is_ignored() {
        let device = Default::default();
        let model: BartModel<TestBackend> = fixtures::tiny_config().init(&device);
        let dec = || ints(&[2, 0, 7], [1, 3]);

        let short = model.forward(ints(&[0, 4, 2], [1, 3]), ints(&[1, 1, 1], [1, 3]), dec());
        let padded = model.forward(ints(&[0, 4, 2, 1, 1], [1, 5]), ints(&[1, 1, 1, 0, 0], [1, 5]), dec());

        for (a, b) in floats(short).iter().zip(floats(padded)) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_decoder_is_causal() {
        let device = Default::default();
        let model: BartModel<TestBackend> = fixtures::tiny_config().init(&device);
        let src  = || ints(&[0, 4, 5, 2], [1, 4]);
        let mask = || ints(&[1, 1, 1, 1], [1, 4]);

        let a = model.forward(src(), mask(), ints(&[2, 0, 7], [1, 3]));
        let b = model.forward(src(), mask(), ints(&[2, 0, 9], [1, 3]));

        // first two positions never see the last decoder token
        let a = floats(a.slice([0..1, 0..2, 0..10]));
        let b = floats(b.slice([0..1, 0..2, 0..10]));
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_scale_embedding() {
        let device = Default::default();
        let plain: BartModel<TestBackend> = fixtures::tiny_config().init(&device);
        let scaled: BartModel<TestBackend> = fixtures::tiny_config().with_scale_embedding(true).init(&device);
        assert_eq!(plain.embed_scale, 1.0);
        assert!((scaled.embed_scale - 8f64.sqrt()).abs() < 1e-12);
    }
}
