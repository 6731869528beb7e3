//! The chat session: everything needed to answer a turn, built once at
//! startup and shared read-only by the front-ends.

use std::sync::Arc;

use crate::config::ChatSettings;
use crate::decode::ReplyExtractor;
use crate::engine::{InferenceEngine, QuantizedEngine, RemoteEngine, SamplingParams};
use crate::error::{ChatError, Result};
use crate::escape::escape_text;
use crate::prompt::render_messages;
use crate::state::History;
use crate::template::ChatTemplate;
use crate::tokenizer::{HfCodec, TextCodec};

pub struct ChatSession {
    codec: Arc<dyn TextCodec>,
    engine: Arc<dyn InferenceEngine>,
    template: ChatTemplate,
    extractor: ReplyExtractor,
    params: SamplingParams,
}

impl ChatSession {
    pub fn new(
        codec: Arc<dyn TextCodec>,
        engine: Arc<dyn InferenceEngine>,
        template: ChatTemplate,
        params: SamplingParams,
    ) -> Self {
        let extractor = ReplyExtractor::default().with_stop_markers(stop_markers(codec.as_ref()));
        Self {
            codec,
            engine,
            template,
            extractor,
            params,
        }
    }

    pub fn with_extractor(mut self, extractor: ReplyExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Load the tokenizer, chat template and engine from the model directory.
    pub fn load(settings: &ChatSettings) -> Result<Self> {
        let dir = &settings.model_path;
        if !dir.is_dir() {
            return Err(ChatError::MissingModelFile(dir.clone()));
        }

        let template = ChatTemplate::from_tokenizer_config(&dir.join("tokenizer_config.json"))?;
        let codec = HfCodec::from_file(&dir.join("tokenizer.json"), template.eos_token())?;

        let engine: Arc<dyn InferenceEngine> = match &settings.endpoint {
            Some(url) => {
                tracing::info!("using inference runtime at {}", url);
                Arc::new(RemoteEngine::new(url))
            }
            None => {
                let checkpoint = QuantizedEngine::find_checkpoint(dir)?;
                Arc::new(QuantizedEngine::load(
                    &checkpoint,
                    settings.device,
                    codec.stop_tokens(),
                )?)
            }
        };

        let codec: Arc<dyn TextCodec> = Arc::new(codec);
        let extractor = ReplyExtractor::new(settings.assistant_marker.as_str())
            .with_stop_markers(stop_markers(codec.as_ref()));
        let params = SamplingParams::chat(settings.max_sequence_length).with_seed(settings.seed);

        Ok(Self::new(codec, engine, template, params).with_extractor(extractor))
    }

    /// Render and encode the whole history as model input.
    pub fn build_input(&self, history: &History) -> Result<Vec<u32>> {
        let messages = render_messages(history);
        let prompt = self.template.render(&messages, true)?;
        self.codec.encode(&prompt)
    }

    /// Answer one user submission.
    ///
    /// Blank input is ignored and returns `None`. On failure the pending turn
    /// is removed and the error is returned unchanged; there is no retry.
    pub fn send(&self, history: &mut History, input: &str) -> Result<Option<String>> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        history.push_user(escape_text(input));

        match self.reply_to(history) {
            Ok(reply) => {
                history.complete_last(reply.as_str())?;
                Ok(Some(reply))
            }
            Err(err) => {
                history.discard_pending();
                Err(err)
            }
        }
    }

    pub fn clear(&self, history: &mut History) {
        history.clear();
    }

    fn reply_to(&self, history: &History) -> Result<String> {
        let input = self.build_input(history)?;
        tracing::debug!("prompt is {} tokens", input.len());

        let output = self.engine.generate(&input, &self.params)?;
        tracing::info!("generated {} tokens", output.len().saturating_sub(input.len()));

        let decoded = self.codec.decode(&output)?;
        Ok(self.extractor.extract(&decoded))
    }
}

/// Text of the special stop tokens. Ordinary pieces such as `!` never end a reply.
fn stop_markers(codec: &dyn TextCodec) -> Vec<String> {
    codec
        .stop_tokens()
        .into_iter()
        .filter(|&id| codec.is_special(id))
        .filter_map(|id| codec.decode(&[id]).ok())
        .collect()
}
