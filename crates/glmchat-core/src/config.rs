use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::decode::DEFAULT_ASSISTANT_MARKER;
use crate::device::DeviceSpec;
use crate::engine::DEFAULT_SEED;
use crate::error::{ChatError, Result};

pub const DEFAULT_MODEL_PATH: &str = "Source/chat-model";
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 256;

/// Persistent settings, stored as JSON in the user's config directory.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub model_path: Option<PathBuf>,
    pub device: Option<String>,
    pub max_sequence_length: Option<usize>,
    pub endpoint: Option<String>,
    pub assistant_marker: Option<String>,
    pub seed: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChatError::Config("could not determine config directory".into()))?;

        Ok(config_dir.join("glmchat").join("config.json"))
    }
}

impl From<&ChatSettings> for Config {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            model_path: Some(settings.model_path.clone()),
            device: Some(settings.device.to_string()),
            max_sequence_length: Some(settings.max_sequence_length),
            endpoint: settings.endpoint.clone(),
            assistant_marker: Some(settings.assistant_marker.clone()),
            seed: Some(settings.seed),
        }
    }
}

/// Model flags shared by every front-end.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Model directory holding tokenizer.json and a .gguf checkpoint
    #[arg(short = 'm', long = "model_path")]
    pub model_path: Option<PathBuf>,

    /// Maximum number of new tokens per reply
    #[arg(short = 'l', long = "max_sequence_length")]
    pub max_sequence_length: Option<usize>,

    /// Device for inference: CPU, CUDA[:N] or METAL[:N]
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Use a llama.cpp-compatible server instead of loading the checkpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the resolved settings back to the config file
    #[arg(long)]
    pub save_config: bool,
}

/// Fully resolved settings for building a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model_path: PathBuf,
    pub max_sequence_length: usize,
    pub device: DeviceSpec,
    pub endpoint: Option<String>,
    pub assistant_marker: String,
    pub seed: u64,
}

impl ModelArgs {
    /// The file named by `--config`, or the default location.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::get_config_path(),
        }
    }

    /// Load the config file and resolve the final settings, writing them
    /// back when `--save-config` is given.
    pub fn settings(&self) -> Result<ChatSettings> {
        let path = self.config_path()?;
        let settings = self.resolve(&Config::load_from(&path)?)?;

        if self.save_config {
            Config::from(&settings).save_to(&path)?;
            tracing::info!("saved settings to {}", path.display());
        }
        Ok(settings)
    }

    /// Command line wins over the config file, which wins over defaults.
    pub fn resolve(&self, config: &Config) -> Result<ChatSettings> {
        let device = match self.device.as_ref().or(config.device.as_ref()) {
            Some(name) => name.parse()?,
            None => DeviceSpec::Cpu,
        };

        Ok(ChatSettings {
            model_path: self
                .model_path
                .clone()
                .or_else(|| config.model_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            max_sequence_length: self
                .max_sequence_length
                .or(config.max_sequence_length)
                .unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH),
            device,
            endpoint: self.endpoint.clone().or_else(|| config.endpoint.clone()),
            assistant_marker: config
                .assistant_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_ASSISTANT_MARKER.to_string()),
            seed: config.seed.unwrap_or(DEFAULT_SEED),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags_or_file() {
        let settings = ModelArgs::default().resolve(&Config::new()).unwrap();
        assert_eq!(settings.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(settings.max_sequence_length, 256);
        assert_eq!(settings.device, DeviceSpec::Cpu);
        assert_eq!(settings.endpoint, None);
        assert_eq!(settings.assistant_marker, "<|assistant|>");
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            model_path: Some("from-config".into()),
            device: Some("cuda".into()),
            max_sequence_length: Some(128),
            ..Config::default()
        };
        let args = ModelArgs {
            device: Some("CPU".into()),
            max_sequence_length: Some(512),
            ..ModelArgs::default()
        };

        let settings = args.resolve(&config).unwrap();
        assert_eq!(settings.model_path, PathBuf::from("from-config"));
        assert_eq!(settings.device, DeviceSpec::Cpu);
        assert_eq!(settings.max_sequence_length, 512);
    }

    #[test]
    fn test_invalid_device_is_rejected() {
        let args = ModelArgs {
            device: Some("TPU".into()),
            ..ModelArgs::default()
        };
        assert!(matches!(
            args.resolve(&Config::new()),
            Err(ChatError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glmchat").join("config.json");
        let config = Config {
            endpoint: Some("http://127.0.0.1:8080".into()),
            seed: Some(42),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ChatError::Json(_))));
    }

    #[test]
    fn test_save_config_flag_writes_resolved_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = ModelArgs {
            device: Some("cuda:1".into()),
            config: Some(path.clone()),
            save_config: true,
            ..ModelArgs::default()
        };

        let settings = args.settings().unwrap();
        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.device.as_deref(), Some("CUDA:1"));
        assert_eq!(saved.max_sequence_length, Some(256));

        // The saved file reproduces the same settings without flags
        let plain = ModelArgs {
            config: Some(path),
            ..ModelArgs::default()
        };
        assert_eq!(plain.settings().unwrap(), settings);
    }

    #[test]
    fn test_settings_without_flag_leave_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = ModelArgs {
            config: Some(path.clone()),
            ..ModelArgs::default()
        };
        args.settings().unwrap();
        assert!(!path.exists());
    }
}
