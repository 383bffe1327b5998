use crate::agent::{DialogueTurnEngine, TurnConfig, TurnReport};
use crate::booking::BookingDesk;
use crate::conversation::Conversation;
use crate::delivery::Delivery;
use crate::error::CallError;
use crate::frames::DEFAULT_FRAME_SIZE;
use crate::generic_types::{ChannelEvent, RecognitionEvent};
use crate::llm::ChatModel;
use crate::monitor::{SpeechStatus, SynthesisMonitor};
use crate::prompt::{DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT};
use crate::realtime_api::{CallChannel, Recognizer, Synthesizer};
use crate::session_state::{CallState, SharedCallState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// µ-law silence, sent to recognition when the media stream starts.
const SILENCE_BYTE: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub frame_size: usize,
    pub greeting: String,
    pub system_prompt: String,
    /// Send inbound caller audio straight back (debugging aid).
    pub echo_back: bool,
    /// How long to let queued audio play after the call is judged complete.
    pub drain_grace: Duration,
    pub monitor_interval: Duration,
    pub reconnect_backoff: Duration,
    pub max_reconnects: u32,
    pub turn: TurnConfig,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            greeting: DEFAULT_GREETING.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            echo_back: false,
            drain_grace: Duration::from_millis(500),
            monitor_interval: Duration::from_secs(1),
            reconnect_backoff: Duration::from_millis(500),
            max_reconnects: 3,
            turn: TurnConfig::default(),
        }
    }
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEnd {
    /// The caller declined further help after a booking.
    Completed,
    /// The channel sent an explicit stop.
    Stopped,
    /// The channel's event stream closed.
    Disconnected,
}

/// Owns one phone call from connection to teardown.
pub struct CallSessionController {
    config: CallConfig,
    state: SharedCallState,
    recognizer: Arc<dyn Recognizer>,
    synthesizer: Arc<dyn Synthesizer>,
    channel: Arc<dyn CallChannel>,
    model: Arc<dyn ChatModel>,
    desk: BookingDesk,
}

impl CallSessionController {
    pub fn new(
        config: CallConfig,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        channel: Arc<dyn CallChannel>,
        model: Arc<dyn ChatModel>,
        desk: BookingDesk,
    ) -> Self {
        Self {
            state: CallState::shared(config.frame_size),
            config,
            recognizer,
            synthesizer,
            channel,
            model,
            desk,
        }
    }

    pub fn state(&self) -> SharedCallState {
        self.state.clone()
    }

    /// Drive the call until it completes, stops, or the channel goes away.
    ///
    /// Only a failure to open the synthesis or recognition connection is
    /// returned as an error; everything after that is handled per turn.
    pub async fn run(self, mut events: mpsc::Receiver<ChannelEvent>) -> Result<CallEnd, CallError> {
        if let Err(e) = self.synthesizer.connect().await {
            tracing::error!("synthesis connection failed, ending call: {:#}", e);
            self.close_channel().await;
            return Err(CallError::Synthesis(e));
        }
        let mut recognition = match self.recognizer.connect().await {
            Ok(recognition) => recognition,
            Err(e) => {
                tracing::error!("recognition connection failed, ending call: {:#}", e);
                if let Err(e) = self.synthesizer.close().await {
                    tracing::debug!("synthesis close: {:#}", e);
                }
                self.close_channel().await;
                return Err(CallError::Recognition(e));
            }
        };

        let delivery = Arc::new(Delivery::new(self.state.clone(), self.channel.clone()));
        let speech = Arc::new(SpeechStatus::default());
        let engine = DialogueTurnEngine::new(
            self.model.clone(),
            self.synthesizer.clone(),
            delivery.clone(),
            self.desk.clone(),
            Arc::new(Mutex::new(Conversation::new(&self.config.system_prompt))),
            speech.clone(),
            self.config.turn.clone(),
        );
        let monitor = SynthesisMonitor::new(
            self.synthesizer.clone(),
            speech,
            self.config.monitor_interval,
            self.config.reconnect_backoff,
            self.config.max_reconnects,
        )
        .spawn();

        let mut turns: JoinSet<TurnReport> = JoinSet::new();
        let mut greeted = false;
        let mut recognition_open = true;

        let end = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Started { stream_sid, call_sid }) => {
                        tracing::info!(%stream_sid, ?call_sid, "media stream started");
                        self.forward_audio(vec![SILENCE_BYTE; self.config.frame_size]).await;
                        if !greeted {
                            greeted = true;
                            let id = self.state.start_sequence();
                            let engine = engine.clone();
                            let greeting = self.config.greeting.clone();
                            turns.spawn(async move { engine.run_greeting(id, &greeting).await });
                        }
                    }
                    Some(ChannelEvent::Audio(audio)) => {
                        if self.config.echo_back {
                            delivery.echo(audio.clone()).await;
                        }
                        self.forward_audio(audio).await;
                    }
                    Some(ChannelEvent::Mark(name)) => match self.state.acknowledge_marker(&name) {
                        Some(id) => tracing::info!(sequence = id, marker = %name, "playback confirmed"),
                        None => tracing::debug!(marker = %name, "ignoring unknown marker"),
                    },
                    Some(ChannelEvent::Dtmf(digit)) => {
                        tracing::debug!(%digit, "dtmf received");
                    }
                    Some(ChannelEvent::Stopped) => {
                        tracing::info!("media stream stopped");
                        break CallEnd::Stopped;
                    }
                    None => {
                        tracing::info!("call channel disconnected");
                        break CallEnd::Disconnected;
                    }
                },
                event = recognition.recv(), if recognition_open => match event {
                    Some(RecognitionEvent::SpeechStarted) => {
                        self.handle_speech_started(&delivery).await;
                    }
                    Some(RecognitionEvent::Transcript { text, is_final: true }) => {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            tracing::info!(transcript = %text, "final transcript");
                            let id = self.state.start_sequence();
                            let engine = engine.clone();
                            turns.spawn(async move { engine.run(&text, id).await });
                        }
                    }
                    Some(RecognitionEvent::Transcript { text, is_final: false }) => {
                        tracing::debug!(transcript = %text, "interim transcript");
                    }
                    Some(RecognitionEvent::UtteranceEnd) => {
                        tracing::debug!("utterance end");
                    }
                    Some(RecognitionEvent::Closed) | None => {
                        tracing::warn!("recognition stream ended, caller can no longer be heard");
                        recognition_open = false;
                    }
                },
                Some(joined) = turns.join_next(), if !turns.is_empty() => match joined {
                    Ok(report) if report.conversation_complete => {
                        tracing::info!(sequence = report.sequence, "conversation complete, closing call");
                        break CallEnd::Completed;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!("turn task failed: {}", e),
                },
            }
        };

        monitor.abort();
        self.teardown(end, turns).await;
        Ok(end)
    }

    async fn forward_audio(&self, audio: Vec<u8>) {
        if let Err(e) = self.recognizer.send_audio(audio).await {
            tracing::debug!("failed to forward audio to recognition: {:#}", e);
        }
    }

    async fn handle_speech_started(&self, delivery: &Delivery) {
        if !self.state.is_agent_speaking() {
            tracing::debug!("speech started while agent silent");
            return;
        }
        let summary = delivery.interrupt().await;
        if let Err(e) = self.synthesizer.clear().await {
            tracing::warn!("failed to clear synthesis audio: {:#}", e);
        }
        tracing::info!(
            sequences = ?summary.sequences,
            discarded_bytes = summary.discarded_bytes,
            dropped_markers = summary.dropped_markers,
            "barge-in handled"
        );
    }

    async fn teardown(&self, end: CallEnd, mut turns: JoinSet<TurnReport>) {
        tracing::info!(?end, "tearing down call");
        let summary = self.state.interrupt();
        if summary.dropped_markers > 0 {
            tracing::info!(
                markers = summary.dropped_markers,
                "dropping unacknowledged markers"
            );
        }
        turns.shutdown().await;

        if end == CallEnd::Completed {
            if let Err(e) = self.channel.stop().await {
                tracing::warn!("failed to send stop: {:#}", e);
            }
            tokio::time::sleep(self.config.drain_grace).await;
        }

        if let Err(e) = self.recognizer.close().await {
            tracing::warn!("failed to close recognition: {:#}", e);
        }
        if let Err(e) = self.synthesizer.close().await {
            tracing::warn!("failed to close synthesis: {:#}", e);
        }
        self.close_channel().await;
        tracing::info!("call closed");
    }

    async fn close_channel(&self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("channel close: {:#}", e);
        }
    }
}
