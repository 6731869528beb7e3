use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{InferenceEngine, SamplingParams};
use crate::error::{ChatError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a [u32],
    n_predict: usize,
    temperature: f64,
    top_k: usize,
    top_p: f64,
    repeat_penalty: f32,
    seed: u64,
    return_tokens: bool,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    tokens: Option<Vec<u32>>,
}

/// Talks to a llama.cpp-style server that accepts token prompts on
/// `/completion`.
#[derive(Clone)]
pub struct RemoteEngine {
    base_url: String,
}

impl RemoteEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn completion_url(&self) -> String {
        format!("{}/completion", self.base_url)
    }

    fn request<'a>(prompt: &'a [u32], params: &SamplingParams) -> CompletionRequest<'a> {
        CompletionRequest {
            prompt,
            n_predict: params.max_new_tokens,
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
            repeat_penalty: params.repetition_penalty,
            seed: params.seed,
            return_tokens: true,
            stream: false,
        }
    }
}

impl InferenceEngine for RemoteEngine {
    fn generate(&self, prompt: &[u32], params: &SamplingParams) -> Result<Vec<u32>> {
        // The blocking client owns a runtime, so it lives only as long as the
        // call that runs on the generation worker.
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let response = client
            .post(self.completion_url())
            .json(&Self::request(prompt, params))
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(ChatError::Runtime(format!(
                "completion request failed with status {}: {}",
                status, text
            )));
        }

        let completion: CompletionResponse = response.json()?;
        let generated = completion.tokens.ok_or_else(|| {
            ChatError::Runtime("server did not return token ids".to_string())
        })?;

        tracing::debug!("runtime returned {} tokens", generated.len());

        let mut tokens = prompt.to_vec();
        tokens.extend(generated);
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_url_trims_slash() {
        let engine = RemoteEngine::new("http://localhost:8080/");
        assert_eq!(engine.completion_url(), "http://localhost:8080/completion");
    }

    #[test]
    fn test_request_carries_sampling_params() {
        let params = SamplingParams::chat(64).with_seed(7);
        let body = serde_json::to_value(RemoteEngine::request(&[1, 2, 3], &params)).unwrap();

        assert_eq!(body["prompt"], serde_json::json!([1, 2, 3]));
        assert_eq!(body["n_predict"], 64);
        assert_eq!(body["top_k"], 50);
        assert_eq!(body["seed"], 7);
        assert_eq!(body["return_tokens"], true);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_response_without_tokens() {
        let response: CompletionResponse =
            serde_json::from_str(r#"{"content":"hi","stop":true}"#).unwrap();
        assert!(response.tokens.is_none());
    }
}
