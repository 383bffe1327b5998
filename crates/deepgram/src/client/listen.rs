use crate::client::config::Config;
use crate::client::consts::{
    CHANNEL_CAPACITY, KEEPALIVE_INTERVAL, SILENCE_BYTE, SILENCE_FRAME_LEN,
};
use crate::client::utils;
use anyhow::{Context, Result};
use concierge_types::deepgram::{ListenControl, ListenMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

enum ListenInput {
    Audio(Vec<u8>),
    Close,
}

/// A streaming recognition session.
///
/// Audio pushed with [`ListenClient::send_audio`] is forwarded by a sender task
/// which keeps the socket alive with µ-law silence whenever the caller goes quiet.
/// Decoded server messages are available once through [`ListenClient::take_events`].
pub struct ListenClient {
    audio_tx: mpsc::Sender<ListenInput>,
    events: Option<mpsc::Receiver<ListenMessage>>,
    sender: JoinHandle<()>,
    receiver: JoinHandle<()>,
}

pub async fn connect_listen(config: &Config) -> Result<ListenClient> {
    let request = utils::build_request(utils::listen_url(config), config)?;
    let (ws_stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .context("Failed to connect to Deepgram listen socket")?;
    tracing::info!("connected to Deepgram listen ({})", config.model());

    let (mut write, mut read) = ws_stream.split();
    let (audio_tx, mut audio_rx) = mpsc::channel::<ListenInput>(CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel::<ListenMessage>(CHANNEL_CAPACITY);

    let sender = tokio::spawn(async move {
        loop {
            let input = match tokio::time::timeout(KEEPALIVE_INTERVAL, audio_rx.recv()).await {
                Ok(Some(input)) => input,
                Ok(None) => ListenInput::Close,
                Err(_) => ListenInput::Audio(vec![SILENCE_BYTE; SILENCE_FRAME_LEN]),
            };
            match input {
                ListenInput::Audio(audio) => {
                    if let Err(e) = write.send(Message::Binary(audio)).await {
                        tracing::error!("listen sender closed: {}", e);
                        break;
                    }
                }
                ListenInput::Close => {
                    match serde_json::to_string(&ListenControl::CloseStream) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::debug!("failed to send CloseStream: {}", e);
                            }
                        }
                        Err(e) => tracing::error!("failed to serialize CloseStream: {}", e),
                    }
                    if let Err(e) = write.close().await {
                        tracing::debug!("listen socket close: {}", e);
                    }
                    break;
                }
            }
        }
    });

    let receiver = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            let message = match message {
                Err(e) => {
                    tracing::error!("failed to read listen message: {}", e);
                    break;
                }
                Ok(message) => message,
            };
            match message {
                Message::Text(text) => match serde_json::from_str::<ListenMessage>(&text) {
                    Ok(event) => {
                        if events_tx.send(event).await.is_err() {
                            tracing::debug!("listen event receiver dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("failed to deserialize listen message: {}, text=> {:?}", e, text);
                    }
                },
                Message::Close(reason) => {
                    tracing::info!("listen connection closed: {:?}", reason);
                    break;
                }
                Message::Binary(bin) => {
                    tracing::warn!("unexpected binary listen message ({} bytes)", bin.len());
                }
                _ => {}
            }
        }
    });

    Ok(ListenClient {
        audio_tx,
        events: Some(events_rx),
        sender,
        receiver,
    })
}

impl ListenClient {
    /// Queue raw caller audio for recognition.
    pub async fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.audio_tx
            .send(ListenInput::Audio(audio))
            .await
            .map_err(|_| anyhow::anyhow!("listen sender has stopped"))
    }

    /// The decoded message stream. Can only be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ListenMessage>> {
        self.events.take()
    }

    /// Ask Deepgram to finish the stream and wait for both socket tasks.
    pub async fn close(self) {
        if self.audio_tx.send(ListenInput::Close).await.is_err() {
            tracing::debug!("listen sender already stopped");
        }
        if let Err(e) = self.sender.await {
            tracing::warn!("listen sender task failed: {}", e);
        }
        await_or_abort(self.receiver, KEEPALIVE_INTERVAL).await;
        tracing::info!("Deepgram listen closed");
    }
}

/// Wait up to `grace` for a socket task, then abort it so it cannot outlive the client.
async fn await_or_abort(mut task: JoinHandle<()>, grace: Duration) {
    if tokio::time::timeout(grace, &mut task).await.is_err() {
        tracing::warn!("listen receiver did not finish in time, aborting it");
        task.abort();
    }
}
