use crate::client::consts::{
    BASE_URL, DEEPGRAM_API_KEY, DEFAULT_ENCODING, DEFAULT_LISTEN_MODEL, DEFAULT_SAMPLE_RATE,
    DEFAULT_SPEAK_MODEL,
};
use secrecy::SecretString;

/// Connection settings shared by the listen and speak sockets.
#[derive(Clone)]
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
    encoding: String,
    sample_rate: u32,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.config.encoding = encoding.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Config {
    fn with_model_default(model: &str) -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            // Missing keys surface as a handshake failure, not a panic.
            api_key: std::env::var(DEEPGRAM_API_KEY)
                .unwrap_or_else(|_| "".to_string())
                .into(),
            model: model.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Defaults for streaming recognition of telephony audio.
    pub fn listen() -> Self {
        Self::with_model_default(DEFAULT_LISTEN_MODEL)
    }

    /// Defaults for streaming synthesis of telephony audio.
    pub fn speak() -> Self {
        Self::with_model_default(DEFAULT_SPEAK_MODEL)
    }

    pub fn listen_builder() -> ConfigBuilder {
        ConfigBuilder::new(Self::listen())
    }

    pub fn speak_builder() -> ConfigBuilder {
        ConfigBuilder::new(Self::speak())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
