//! Streaming clients for Deepgram's listen and speak websockets.

mod client;

pub use concierge_types::deepgram as types;
pub use client::config::{Config, ConfigBuilder};
pub use client::consts::{SILENCE_BYTE, SILENCE_FRAME_LEN};
pub use client::listen::{ListenClient, connect_listen};
pub use client::speak::{SpeakClient, SpeakOutput, connect_speak};
