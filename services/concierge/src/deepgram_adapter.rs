use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_core::generic_types::RecognitionEvent;
use concierge_core::realtime_api::{Recognizer, Synthesizer};
use deepgram::types::ListenMessage;
use deepgram::{ListenClient, SpeakClient, connect_listen, connect_speak};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

const EVENT_CAPACITY: usize = 256;

/// Streaming recognition over Deepgram's listen socket.
pub struct DeepgramRecognizer {
    config: deepgram::Config,
    client: tokio::sync::Mutex<Option<ListenClient>>,
}

impl DeepgramRecognizer {
    pub fn new(config: deepgram::Config) -> Self {
        Self {
            config,
            client: tokio::sync::Mutex::new(None),
        }
    }
}

/// Map a listen message to a recognition event. Empty transcripts carry nothing.
fn recognition_event(message: ListenMessage) -> Option<RecognitionEvent> {
    match message {
        ListenMessage::Results(results) => {
            let text = results.transcript().trim();
            if text.is_empty() {
                return None;
            }
            Some(RecognitionEvent::Transcript {
                text: text.to_string(),
                is_final: results.is_final,
            })
        }
        ListenMessage::SpeechStarted(_) => Some(RecognitionEvent::SpeechStarted),
        ListenMessage::UtteranceEnd(_) => Some(RecognitionEvent::UtteranceEnd),
        ListenMessage::Metadata(metadata) => {
            tracing::debug!(request_id = ?metadata.request_id, "listen metadata");
            None
        }
        ListenMessage::Unknown => None,
    }
}

#[async_trait]
impl Recognizer for DeepgramRecognizer {
    async fn connect(&self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        let mut client = connect_listen(&self.config).await?;
        let mut messages = client
            .take_events()
            .context("listen events were already taken")?;
        if let Some(previous) = self.client.lock().await.replace(client) {
            previous.close().await;
        }

        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if let Some(event) = recognition_event(message) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            let _ = tx.send(RecognitionEvent::Closed).await;
        });
        Ok(rx)
    }

    async fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        match self.client.lock().await.as_ref() {
            Some(client) => client.send_audio(audio).await,
            None => anyhow::bail!("recognition is not connected"),
        }
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            client.close().await;
        }
        Ok(())
    }
}

/// Streaming synthesis over Deepgram's speak socket.
///
/// `connect` replaces the socket, which is how the synthesis monitor
/// reconnects a dropped session.
pub struct DeepgramSynthesizer {
    config: deepgram::Config,
    client: Mutex<Option<SpeakClient>>,
}

impl DeepgramSynthesizer {
    pub fn new(config: deepgram::Config) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    fn current(&self) -> Result<SpeakClient> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .context("synthesis is not connected")
    }
}

#[async_trait]
impl Synthesizer for DeepgramSynthesizer {
    async fn connect(&self) -> Result<()> {
        let client = connect_speak(&self.config).await?;
        let previous = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(client);
        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                tracing::debug!("previous speak socket close: {:#}", e);
            }
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<Result<Vec<u8>>>> {
        self.current()?.synthesize(text).await
    }

    async fn clear(&self) -> Result<()> {
        self.current()?.clear().await
    }

    fn is_connected(&self) -> bool {
        self.current().is_ok_and(|client| client.is_connected())
    }

    async fn close(&self) -> Result<()> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match client {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<RecognitionEvent> {
        recognition_event(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn final_results_become_transcripts() {
        let event = parse(
            r#"{"type":"Results","is_final":true,
                "channel":{"alternatives":[{"transcript":" two nights please ","confidence":0.9}]}}"#,
        );
        assert_eq!(
            event,
            Some(RecognitionEvent::Transcript {
                text: "two nights please".into(),
                is_final: true,
            })
        );
    }

    #[test]
    fn empty_results_are_dropped() {
        assert_eq!(
            parse(r#"{"type":"Results","is_final":true,"channel":{"alternatives":[{"transcript":""}]}}"#),
            None
        );
        assert_eq!(
            parse(r#"{"type":"Results","is_final":false,"channel":{"alternatives":[]}}"#),
            None
        );
    }

    #[test]
    fn voice_activity_events_pass_through() {
        assert_eq!(
            parse(r#"{"type":"SpeechStarted","timestamp":0.4}"#),
            Some(RecognitionEvent::SpeechStarted)
        );
        assert_eq!(
            parse(r#"{"type":"UtteranceEnd","last_word_end":2.1}"#),
            Some(RecognitionEvent::UtteranceEnd)
        );
        assert_eq!(parse(r#"{"type":"Metadata","request_id":"abc"}"#), None);
    }

    #[test]
    fn unconnected_synthesizer_reports_disconnected() {
        let synthesizer = DeepgramSynthesizer::new(deepgram::Config::speak());
        assert!(!synthesizer.is_connected());
    }
}
