//! Inference backends
//!
//! Every backend takes a prompt as token ids and hands back the prompt followed
//! by the generated continuation.

pub mod quantized;
pub mod remote;

pub use quantized::QuantizedEngine;
pub use remote::RemoteEngine;

use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::error::Result;

pub const DEFAULT_SEED: u64 = 299_792_458;

/// A causal language model behind a tokens-in, tokens-out contract.
pub trait InferenceEngine: Send + Sync {
    fn generate(&self, prompt: &[u32], params: &SamplingParams) -> Result<Vec<u32>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
    pub repetition_penalty: f32,
    pub max_new_tokens: usize,
    pub seed: u64,
}

impl SamplingParams {
    /// The fixed settings used for every chat reply.
    pub fn chat(max_new_tokens: usize) -> Self {
        Self {
            temperature: 0.1,
            top_p: 1.0,
            top_k: 50,
            repetition_penalty: 1.1,
            max_new_tokens,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::TopKThenTopP {
                k: self.top_k,
                p: self.top_p,
                temperature: self.temperature,
            }
        }
    }

    pub fn logits_processor(&self) -> LogitsProcessor {
        LogitsProcessor::from_sampling(self.seed, self.sampling())
    }
}
