use std::collections::HashSet;
use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{ChatError, Result};

/// Token ids treated as end-of-generation regardless of the tokenizer.
pub const DEFAULT_STOP_TOKENS: [u32; 2] = [0, 2];

/// Role tokens that end an assistant turn in ChatGLM-style vocabularies.
const ROLE_STOP_TOKENS: [&str; 2] = ["<|user|>", "<|observation|>"];

/// Translates between text and token ids.
pub trait TextCodec: Send + Sync {
    /// Encode a fully rendered prompt. Special tokens are already in the text.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode ids back to text, keeping special tokens visible.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Ids that terminate generation.
    fn stop_tokens(&self) -> Vec<u32> {
        DEFAULT_STOP_TOKENS.to_vec()
    }

    /// Whether `id` is a special token rather than an ordinary vocabulary piece.
    fn is_special(&self, _id: u32) -> bool {
        false
    }
}

/// [`TextCodec`] backed by a Hugging Face `tokenizer.json`.
pub struct HfCodec {
    tokenizer: Tokenizer,
    stop_tokens: Vec<u32>,
    special_ids: HashSet<u32>,
}

impl HfCodec {
    pub fn from_file(path: &Path, eos_token: &str) -> Result<Self> {
        if !path.exists() {
            return Err(ChatError::MissingModelFile(path.to_path_buf()));
        }
        let tokenizer = Tokenizer::from_file(path)?;
        Ok(Self::new(tokenizer, eos_token))
    }

    pub fn new(tokenizer: Tokenizer, eos_token: &str) -> Self {
        let mut stop_tokens = DEFAULT_STOP_TOKENS.to_vec();
        let named = std::iter::once(eos_token)
            .chain(ROLE_STOP_TOKENS)
            .filter(|t| !t.is_empty());
        for token in named {
            if let Some(id) = tokenizer.token_to_id(token) {
                if !stop_tokens.contains(&id) {
                    stop_tokens.push(id);
                }
            }
        }
        tracing::debug!("stop tokens: {:?}", stop_tokens);

        let special_ids = tokenizer
            .get_added_tokens_decoder()
            .into_iter()
            .filter(|(_, token)| token.special)
            .map(|(id, _)| id)
            .collect();

        Self {
            tokenizer,
            stop_tokens,
            special_ids,
        }
    }
}

impl TextCodec for HfCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.tokenizer.encode(text, false)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        Ok(self.tokenizer.decode(tokens, false)?)
    }

    fn stop_tokens(&self) -> Vec<u32> {
        self.stop_tokens.clone()
    }

    fn is_special(&self, id: u32) -> bool {
        self.special_ids.contains(&id)
    }
}
