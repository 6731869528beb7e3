pub mod config;
pub mod decode;
pub mod device;
pub mod engine;
pub mod error;
pub mod escape;
pub mod prompt;
pub mod session;
pub mod state;
pub mod template;
pub mod tokenizer;
pub mod tray;

// Re-export main types for convenience
pub use config::{ChatSettings, Config, ModelArgs};
pub use decode::ReplyExtractor;
pub use device::DeviceSpec;
pub use engine::{InferenceEngine, QuantizedEngine, RemoteEngine, SamplingParams};
pub use error::{ChatError, Result};
pub use escape::{escape_text, unescape_text};
pub use prompt::render_messages;
pub use session::ChatSession;
pub use state::{ChatMessage, ChatRole, History, Turn};
pub use template::ChatTemplate;
pub use tokenizer::{HfCodec, TextCodec};
pub use tray::{install_tray, TrayAction, TrayBackend, TrayConfig, TrayMenu, WindowControl};
