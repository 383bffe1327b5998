pub mod agent;
pub mod booking;
pub mod controller;
pub mod conversation;
pub mod delivery;
pub mod error;
pub mod frames;
pub mod generic_types;
pub mod llm;
pub mod monitor;
pub mod playback;
pub mod prompt;
pub mod realtime_api;
pub mod segmenter;
pub mod sequence;
pub mod session_state;

#[cfg(test)]
mod test_support;

pub use agent::{DialogueTurnEngine, TurnConfig, TurnReport, TurnSummary};
pub use controller::{CallConfig, CallEnd, CallSessionController};
pub use error::{CallError, TurnError};
pub use generic_types::{ChannelEvent, RecognitionEvent};
pub use llm::{ChatClient, ChatModel};
pub use realtime_api::{CallChannel, Recognizer, Synthesizer};
pub use sequence::{SequenceId, SequenceState};
