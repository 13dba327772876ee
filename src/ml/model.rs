use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::infra::tokenizer_store::GptTokenizer;

// Saved as config.json next to the weights.
#[derive(Config, Debug)]
pub struct Gpt2Config {
    pub vocab_size:  usize,
    /// Context window; inputs longer than this cannot be embedded.
    pub n_positions: usize,
    #[config(default = 768)]
    pub n_embd: usize,
    #[config(default = 12)]
    pub n_layer: usize,
    #[config(default = 12)]
    pub n_head: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 1e-5)]
    pub layer_norm_epsilon: f64,
    #[config(default = 50256)]
    pub bos_token_id: u32,
    #[config(default = 50256)]
    pub eos_token_id: u32,
    #[config(default = 50256)]
    pub pad_token_id: u32,
}

impl Gpt2Config {
    /// GPT-2 small sized to a custom vocabulary and context length.
    pub fn from_tokenizer(tokenizer: &GptTokenizer, max_len: usize) -> Self {
        Self::new(tokenizer.vocab_size, max_len)
            .with_bos_token_id(tokenizer.bos_token_id)
            .with_eos_token_id(tokenizer.eos_token_id)
            .with_pad_token_id(tokenizer.pad_token_id)
    }

    /// Fresh, randomly initialised weights. Nothing pretrained is loaded.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Gpt2Model<B> {
        let wte = EmbeddingConfig::new(self.vocab_size, self.n_embd).init(device);
        let wpe = EmbeddingConfig::new(self.n_positions, self.n_embd).init(device);
        let blocks: Vec<Gpt2Block<B>> = (0..self.n_layer)
            .map(|_| self.build_block(device))
            .collect();
        let ln_f = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let lm_head = LinearConfig::new(self.n_embd, self.vocab_size)
            .with_bias(false)
            .init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        Gpt2Model {
            wte, wpe, blocks, ln_f, lm_head, dropout,
            n_positions:  self.n_positions,
            pad_token_id: self.pad_token_id,
        }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> Gpt2Block<B> {
        let ln_1 = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let attn = MultiHeadAttentionConfig::new(self.n_embd, self.n_head)
            .with_dropout(self.dropout)
            .init(device);
        let ln_2 = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let mlp_fc   = LinearConfig::new(self.n_embd, 4 * self.n_embd).init(device);
        let mlp_proj = LinearConfig::new(4 * self.n_embd, self.n_embd).init(device);
        let dropout  = DropoutConfig::new(self.dropout).init();
        Gpt2Block { ln_1, attn, ln_2, mlp_fc, mlp_proj, dropout }
    }
}

/// Pre-norm decoder block: x + attn(ln_1(x)), then x + mlp(ln_2(x)).
#[derive(Module, Debug)]
pub struct Gpt2Block<B: Backend> {
    pub ln_1:     LayerNorm<B>,
    pub attn:     MultiHeadAttention<B>,
    pub ln_2:     LayerNorm<B>,
    pub mlp_fc:   Linear<B>,
    pub mlp_proj: Linear<B>,
    pub dropout:  Dropout,
}

impl<B: Backend> Gpt2Block<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let attn_in  = MhaInput::self_attn(self.ln_1.forward(x.clone())).mask_attn(mask);
        let attn_out = self.attn.forward(attn_in).context;
        let x = x + self.dropout.forward(attn_out);

        let mlp_out = self.mlp_proj.forward(
            burn::tensor::activation::gelu(self.mlp_fc.forward(self.ln_2.forward(x.clone())))
        );
        x + self.dropout.forward(mlp_out)
    }
}

#[derive(Module, Debug)]
pub struct Gpt2Model<B: Backend> {
    pub wte:          Embedding<B>,
    pub wpe:          Embedding<B>,
    pub blocks:       Vec<Gpt2Block<B>>,
    pub ln_f:         LayerNorm<B>,
    pub lm_head:      Linear<B>,
    pub dropout:      Dropout,
    pub n_positions:  usize,
    pub pad_token_id: u32,
}

impl<B: Backend> Gpt2Model<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, seq_len, vocab_size]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb   = self.wte.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.wpe.forward(positions);

        // Each position may only attend to itself and earlier positions.
        let mask = generate_autoregressive_mask::<B>(batch_size, seq_len, &device);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for block in &self.blocks {
            x = block.forward(x, mask.clone());
        }
        self.lm_head.forward(self.ln_f.forward(x))
    }

    /// Mean next-token cross-entropy over the non-pad targets.
    ///
    /// Pad positions are excluded from both the sum and the count, so
    /// a padded batch has the same loss as the unpadded one. A batch
    /// made only of padding gives 0.
    pub fn forward_loss(
        &self,
        inputs:  Tensor<B, 2, Int>,
        targets: Tensor<B, 2, Int>,
    ) -> Tensor<B, 1> {
        let logits = self.forward(inputs);
        let [batch_size, seq_len, vocab_size] = logits.dims();
        let rows = batch_size * seq_len;

        let log_probs = log_softmax(logits.reshape([rows, vocab_size]), 1);
        let targets   = targets.reshape([rows, 1]);

        let target_log_probs: Tensor<B, 1> = log_probs.gather(1, targets.clone()).reshape([rows]);
        let keep: Tensor<B, 1> = targets
            .reshape([rows])
            .equal_elem(self.pad_token_id as i64)
            .bool_not()
            .float();

        let count = keep.clone().sum().clamp_min(1.0);
        (target_log_probs * keep).sum().neg() / count
    }
}
