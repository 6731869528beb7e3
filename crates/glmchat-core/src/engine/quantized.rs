use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::quantized_llama::ModelWeights;
use candle_transformers::utils::apply_repeat_penalty;

use super::{InferenceEngine, SamplingParams};
use crate::device::DeviceSpec;
use crate::error::{ChatError, Result};

/// A GGUF checkpoint evaluated in-process with candle.
pub struct QuantizedEngine {
    model: Mutex<ModelWeights>,
    device: Device,
    stop_tokens: Vec<u32>,
}

impl QuantizedEngine {
    pub fn load(path: &Path, device: DeviceSpec, stop_tokens: Vec<u32>) -> Result<Self> {
        if !path.exists() {
            return Err(ChatError::MissingModelFile(path.to_path_buf()));
        }

        tracing::info!("loading {} on {}", path.display(), device);
        let start = Instant::now();

        let mut file = File::open(path)?;
        let content = gguf_file::Content::read(&mut file).map_err(|e| e.with_path(path))?;
        let device = device.open()?;
        let model = ModelWeights::from_gguf(content, &mut file, &device)?;

        tracing::info!("model ready in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            model: Mutex::new(model),
            device,
            stop_tokens,
        })
    }

    /// Locate the single `.gguf` checkpoint in a model directory.
    pub fn find_checkpoint(model_dir: &Path) -> Result<PathBuf> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(model_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "gguf"))
            .collect();
        candidates.sort();

        if candidates.len() > 1 {
            tracing::warn!(
                "{} checkpoints in {}, using {}",
                candidates.len(),
                model_dir.display(),
                candidates[0].display()
            );
        }

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::MissingModelFile(model_dir.join("*.gguf")))
    }
}

impl InferenceEngine for QuantizedEngine {
    fn generate(&self, prompt: &[u32], params: &SamplingParams) -> Result<Vec<u32>> {
        if prompt.is_empty() {
            return Ok(Vec::new());
        }

        // A poisoned lock only means an earlier request panicked mid-forward;
        // the cache is reset at position 0 anyway.
        let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
        let mut processor = params.logits_processor();

        let mut tokens = prompt.to_vec();
        let mut index_pos = 0;

        for step in 0..params.max_new_tokens {
            let context = if step == 0 {
                &tokens[..]
            } else {
                &tokens[tokens.len() - 1..]
            };
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, index_pos)?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += context.len();

            let logits = if params.repetition_penalty == 1.0 {
                logits
            } else {
                apply_repeat_penalty(&logits, params.repetition_penalty, &tokens)?
            };

            let next = processor.sample(&logits)?;
            tokens.push(next);
            if self.stop_tokens.contains(&next) {
                break;
            }
        }

        tracing::debug!(
            "generated {} tokens from a {} token prompt",
            tokens.len() - prompt.len(),
            prompt.len()
        );
        Ok(tokens)
    }
}
