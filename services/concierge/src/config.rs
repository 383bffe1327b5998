//! Application Configuration Module
//!
//! Loads the service settings from the environment (and a `.env` file when
//! present) into a single struct shared by every call.

use concierge_core::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use secrecy::SecretString;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_VOICE_MODEL: &str = "aura-2-odysseus-en";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub deepgram_api_key: SecretString,
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub llm_model: String,
    pub voice_model: String,
    pub echo_back: bool,
    pub prompts_dir: PathBuf,
    pub max_tool_rounds: usize,
    pub tts_max_reconnects: u32,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `BIND_ADDRESS`: Address to serve on. Defaults to "0.0.0.0:8000".
    /// *   `DEEPGRAM_API_KEY`: Key for Deepgram recognition and synthesis. Required.
    /// *   `OPENAI_API_KEY`: Key for the chat-completion endpoint. Required.
    /// *   `OPENAI_BASE_URL`: (Optional) Chat-completion base URL.
    /// *   `LLM_MODEL`: (Optional) Chat model. Defaults to "gpt-4o-mini".
    /// *   `VOICE_MODEL`: (Optional) Deepgram voice. Defaults to "aura-2-odysseus-en".
    /// *   `ECHO_BACK`: (Optional) Echo caller audio back for debugging. Defaults to false.
    /// *   `PROMPTS_DIR`: (Optional) Directory holding `system.md` and `greeting.md`.
    /// *   `MAX_TOOL_ROUNDS`: (Optional) Tool rounds per turn. Defaults to 5.
    /// *   `TTS_MAX_RECONNECTS`: (Optional) Synthesis reconnect attempts. Defaults to 3.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address = parse_var(&var, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;

        let deepgram_api_key = required(&var, "DEEPGRAM_API_KEY")?;
        let openai_api_key = required(&var, "OPENAI_API_KEY")?;

        let openai_base_url = var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let llm_model = var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let voice_model = var("VOICE_MODEL").unwrap_or_else(|| DEFAULT_VOICE_MODEL.to_string());
        let prompts_dir = PathBuf::from(
            var("PROMPTS_DIR").unwrap_or_else(|| DEFAULT_PROMPTS_DIR.to_string()),
        );

        let echo_back = match var("ECHO_BACK") {
            None => false,
            Some(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::InvalidValue("ECHO_BACK".to_string(), value)),
            },
        };

        let max_tool_rounds = parse_var(&var, "MAX_TOOL_ROUNDS", "5")?;
        let tts_max_reconnects = parse_var(&var, "TTS_MAX_RECONNECTS", "3")?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            deepgram_api_key,
            openai_api_key,
            openai_base_url,
            llm_model,
            voice_model,
            echo_back,
            prompts_dir,
            max_tool_rounds,
            tts_max_reconnects,
            log_level,
        })
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<SecretString, ConfigError> {
    var(name)
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = var(name).unwrap_or_else(|| default.to_string());
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
