use crate::generic_types::RecognitionEvent;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A streaming speech-recognition backend.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Open the stream. Events arrive on the returned receiver in the order
    /// the backend produced them.
    async fn connect(&self) -> Result<mpsc::Receiver<RecognitionEvent>>;

    /// Forward raw inbound caller audio.
    async fn send_audio(&self, audio: Vec<u8>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// A streaming speech-synthesis backend.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Synthesize one speakable unit. The receiver yields encoded audio
    /// chunks and closes once the backend has flushed the unit, or once a
    /// clear cut it short. A unit the backend lost mid-stream ends with an
    /// `Err` instead.
    async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<Result<Vec<u8>>>>;

    /// Drop audio the backend has buffered but not yet returned.
    async fn clear(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<()>;
}

/// The outbound side of a phone call.
#[async_trait]
pub trait CallChannel: Send + Sync {
    async fn send_frame(&self, frame: Vec<u8>) -> Result<()>;

    /// Ask the channel to echo `name` back once everything sent so far has played.
    async fn send_mark(&self, name: &str) -> Result<()>;

    /// Discard audio queued on the channel.
    async fn clear(&self) -> Result<()>;

    /// Tell the far end the call is over.
    async fn stop(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
