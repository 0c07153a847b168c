// ============================================================
// Layer 5 — Token Encoder (shared by all three players)
// ============================================================
// Every player owns one TokenEncoder with its own parameters:
//
//   token ids ──► Embedding ──► (× selection, classifiers only)
//                     │
//                     ▼
//               Linear(embedding_dim → d_model)
//                     + positional embedding
//                     + optional per-example conditioning
//                     │
//                     ▼
//               N × EncoderBlock (self-attention with padding mask,
//                                 GELU feed-forward, post-norm)
//                     │
//                     ▼
//               LayerNorm ──► [batch, seq_len, d_model]
//
// Padded keys are masked out of attention so scores and pooled
// representations never depend on what sits in padding slots.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:    usize,
    pub max_seq_len:   usize,
    pub embedding_dim: usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub num_layers:    usize,
    pub d_ff:          usize,
    #[config(default = 0.1)]
    pub dropout:       f64,
    /// Stop gradients at the embedding table
    #[config(default = false)]
    pub fixed_embeddings: bool,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device);
        let input_proj         = LinearConfig::new(self.embedding_dim, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TokenEncoder {
            token_embedding, input_proj, position_embedding, layers,
            final_norm, dropout,
            d_model: self.d_model,
            fixed_embeddings: self.fixed_embeddings,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask`: [batch, seq_len], true at padded positions.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(pad_mask);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TokenEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub input_proj:         Linear<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub d_model:            usize,
    pub fixed_embeddings:   bool,
}

impl<B: Backend> TokenEncoder<B> {
    /// token_ids: [batch, seq_len] → [batch, seq_len, embedding_dim]
    pub fn embed(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let emb = self.token_embedding.forward(token_ids);
        if self.fixed_embeddings { emb.detach() } else { emb }
    }

    /// embedded:     [batch, seq_len, embedding_dim]
    /// padding:      [batch, seq_len], 1.0 = real token
    /// conditioning: optional [batch, d_model] added at every position
    pub fn encode(
        &self,
        embedded:     Tensor<B, 3>,
        padding:      Tensor<B, 2>,
        conditioning: Option<Tensor<B, 2>>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len, _] = embedded.dims();
        let device = embedded.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.input_proj.forward(embedded) + pos_emb;
        if let Some(cond) = conditioning {
            x = x + cond.reshape([batch_size, 1, self.d_model]);
        }
        let mut x = self.dropout.forward(x);

        let pad_mask = padding_to_bool(padding);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        self.final_norm.forward(x)
    }
}

/// 1.0/0.0 padding tensor → Bool mask that is true at padded positions.
pub fn padding_to_bool<B: Backend>(padding: Tensor<B, 2>) -> Tensor<B, 2, Bool> {
    padding.lower_elem(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> EncoderConfig {
        EncoderConfig::new(20, 6, 8, 16, 2, 1, 32).with_dropout(0.0)
    }

    #[test]
    fn test_encode_shape() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let enc: TokenEncoder<TestBackend> = tiny().init(&device);
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 0, 0, 0, 4, 5, 6, 7, 8, 9], &device)
            .reshape([2, 6]);
        let pad = Tensor::<TestBackend, 1>::from_floats([1., 1., 1., 0., 0., 0., 1., 1., 1., 1., 1., 1.], &device)
            .reshape([2, 6]);
        let out = enc.encode(enc.embed(ids), pad, None);
        assert_eq!(out.dims(), [2, 6, 16]);
    }

    #[test]
    fn test_padding_content_does_not_leak_into_real_positions() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let enc: TokenEncoder<TestBackend> = tiny().init(&device);
        let pad = Tensor::<TestBackend, 1>::from_floats([1., 1., 1., 0., 0., 0.], &device).reshape([1, 6]);

        let a = Tensor::<TestBackend, 1, Int>::from_ints([3, 4, 5, 0, 0, 0], &device).reshape([1, 6]);
        let b = Tensor::<TestBackend, 1, Int>::from_ints([3, 4, 5, 9, 9, 9], &device).reshape([1, 6]);

        let real = |t: Tensor<TestBackend, 3>| -> Vec<f32> {
            t.slice([0..1, 0..3, 0..16]).into_data().to_vec().unwrap()
        };
        let out_a = real(enc.encode(enc.embed(a), pad.clone(), None));
        let out_b = real(enc.encode(enc.embed(b), pad, None));
        for (x, y) in out_a.iter().zip(&out_b) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
