use crate::error::TurnError;
use crate::realtime_api::CallChannel;
use crate::sequence::SequenceId;
use crate::session_state::{InterruptSummary, SharedCallState};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Forwards a sequence's audio to the channel.
///
/// Each frame send and each barge-in holds `gate`, so a frame that passed its
/// validity check is always queued on the channel before the `clear` that
/// follows an interrupt, never after it.
pub struct Delivery {
    state: SharedCallState,
    channel: Arc<dyn CallChannel>,
    gate: Mutex<()>,
}

impl Delivery {
    pub fn new(state: SharedCallState, channel: Arc<dyn CallChannel>) -> Self {
        Self {
            state,
            channel,
            gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &SharedCallState {
        &self.state
    }

    /// Align `audio` into frames and send the complete ones.
    pub async fn push(&self, id: SequenceId, audio: &[u8]) -> Result<usize, TurnError> {
        let frames = self
            .state
            .push_audio(id, audio)
            .ok_or(TurnError::Interrupted)?;
        let count = frames.len();
        for frame in frames {
            self.send(id, frame).await?;
        }
        Ok(count)
    }

    /// Send the trailing partial frame, if any. Returns the frames sent.
    pub async fn flush(&self, id: SequenceId) -> Result<usize, TurnError> {
        if !self.state.is_valid(id) {
            return Err(TurnError::Interrupted);
        }
        match self.state.flush_audio(id) {
            Some(frame) => self.send(id, frame).await.map(|()| 1),
            None => Ok(0),
        }
    }

    async fn send(&self, id: SequenceId, frame: Vec<u8>) -> Result<(), TurnError> {
        let _gate = self.gate.lock().await;
        if !self.state.is_valid(id) {
            return Err(TurnError::Interrupted);
        }
        self.channel
            .send_frame(frame)
            .await
            .map_err(TurnError::Channel)
    }

    /// Register and send the end-of-turn marker for `id`.
    pub async fn mark(&self, id: SequenceId) -> Result<String, TurnError> {
        let _gate = self.gate.lock().await;
        let name = self
            .state
            .register_marker(id)
            .ok_or(TurnError::Interrupted)?;
        self.channel
            .send_mark(&name)
            .await
            .map_err(TurnError::Channel)?;
        tracing::info!(sequence = id, marker = %name, "end-of-turn marker sent");
        Ok(name)
    }

    /// Invalidate everything in flight and clear the channel's queue.
    pub async fn interrupt(&self) -> InterruptSummary {
        let _gate = self.gate.lock().await;
        let summary = self.state.interrupt();
        if let Err(e) = self.channel.clear().await {
            tracing::warn!("failed to clear channel audio: {:#}", e);
        }
        summary
    }

    /// Send inbound audio straight back to the caller.
    pub async fn echo(&self, audio: Vec<u8>) {
        if let Err(e) = self.channel.send_frame(audio).await {
            tracing::debug!("echo frame dropped: {:#}", e);
        }
    }
}
