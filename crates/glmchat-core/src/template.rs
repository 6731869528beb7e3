use std::path::Path;

use minijinja::{context, Environment, Error, ErrorKind};
use minijinja_contrib::pycompat::unknown_method_callback;
use serde_json::Value;

use crate::error::Result;
use crate::state::ChatMessage;

/// ChatGLM3-style prompt format, used when the model ships no template.
pub const DEFAULT_CHAT_TEMPLATE: &str = "[gMASK]sop\
{% for message in messages %}<|{{ message.role }}|>\n {{ message.content }}{% endfor %}\
{% if add_generation_prompt %}<|assistant|>{% endif %}";

/// A model's chat template together with the special tokens it references.
#[derive(Debug, Clone)]
pub struct ChatTemplate {
    source: String,
    bos_token: String,
    eos_token: String,
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_TEMPLATE)
    }
}

impl ChatTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bos_token: String::new(),
            eos_token: String::new(),
        }
    }

    pub fn with_special_tokens(mut self, bos: impl Into<String>, eos: impl Into<String>) -> Self {
        self.bos_token = bos.into();
        self.eos_token = eos.into();
        self
    }

    /// Read `tokenizer_config.json`, falling back to the built-in template.
    pub fn from_tokenizer_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "{} not found, using built-in chat template",
                path.display()
            );
            return Ok(Self::default());
        }

        let config: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Self::from_config_value(&config))
    }

    pub fn from_config_value(config: &Value) -> Self {
        let template = match config.get("chat_template") {
            Some(Value::String(source)) => Some(source.clone()),
            // Newer configs carry a list of named templates
            Some(Value::Array(named)) => named
                .iter()
                .find(|t| t.get("name").and_then(Value::as_str) == Some("default"))
                .or_else(|| named.first())
                .and_then(|t| t.get("template"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        let template = match template {
            Some(source) => Self::new(source),
            None => {
                tracing::info!("tokenizer config has no chat_template, using built-in");
                Self::default()
            }
        };

        template.with_special_tokens(
            special_token(config, "bos_token"),
            special_token(config, "eos_token"),
        )
    }

    pub fn eos_token(&self) -> &str {
        &self.eos_token
    }

    /// Render the messages into a single prompt string.
    pub fn render(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_unknown_method_callback(unknown_method_callback);
        env.add_function("raise_exception", |msg: String| -> std::result::Result<String, Error> {
            Err(Error::new(ErrorKind::InvalidOperation, msg))
        });
        env.add_template("chat", &self.source)?;

        let tmpl = env.get_template("chat")?;
        let rendered = tmpl.render(context!(
            messages => messages,
            add_generation_prompt => add_generation_prompt,
            bos_token => self.bos_token,
            eos_token => self.eos_token,
        ))?;
        Ok(rendered)
    }
}

/// Special tokens are either plain strings or serialized `AddedToken`s.
fn special_token(config: &Value, key: &str) -> String {
    match config.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
