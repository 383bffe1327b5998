use std::time::Duration;

pub const DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";

pub const BASE_URL: &str = "wss://api.deepgram.com/v1";
pub const DEFAULT_LISTEN_MODEL: &str = "nova-2";
pub const DEFAULT_SPEAK_MODEL: &str = "aura-2-odysseus-en";
pub const DEFAULT_ENCODING: &str = "mulaw";
pub const DEFAULT_SAMPLE_RATE: u32 = 8000;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// µ-law encodes digital silence as 0xFF.
pub const SILENCE_BYTE: u8 = 0xFF;
/// 20 ms of 8 kHz µ-law.
pub const SILENCE_FRAME_LEN: usize = 160;
/// Idle time after which the listen sender pushes a silence frame.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

pub const CHANNEL_CAPACITY: usize = 1024;
pub const UNIT_CHANNEL_CAPACITY: usize = 256;
