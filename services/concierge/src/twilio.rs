//! Twilio Media Streams adapter.
//!
//! The reader half turns inbound JSON frames into [`ChannelEvent`]s; the
//! writer half is driven by [`TwilioChannel`], which implements the core's
//! [`CallChannel`] once the stream id is known.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use concierge_core::generic_types::ChannelEvent;
use concierge_core::realtime_api::CallChannel;
use concierge_types::twilio::{InboundMessage, OutboundMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

const CHANNEL_BUFFER_SIZE: usize = 1024;
const LOGGED_FRAME_PREFIX: usize = 50;

/// What the writer task puts on the socket.
#[derive(Debug, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// The outbound half of a media stream.
pub struct TwilioChannel {
    stream_sid: Mutex<Option<String>>,
    outbound: mpsc::Sender<Outbound>,
}

impl TwilioChannel {
    pub fn new(outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            stream_sid: Mutex::new(None),
            outbound,
        }
    }

    /// Address every later message to `stream_sid`.
    pub fn bind(&self, stream_sid: &str) {
        *self.stream_sid.lock().unwrap_or_else(PoisonError::into_inner) = Some(stream_sid.to_string());
    }

    pub fn stream_sid(&self) -> Option<String> {
        self.stream_sid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn send(&self, build: impl FnOnce(&str) -> OutboundMessage) -> Result<()> {
        let stream_sid = self
            .stream_sid()
            .context("media stream has not started")?;
        let text = serde_json::to_string(&build(&stream_sid))?;
        self.outbound
            .send(Outbound::Text(text))
            .await
            .map_err(|_| anyhow::anyhow!("media stream writer has stopped"))
    }
}

#[async_trait]
impl CallChannel for TwilioChannel {
    async fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        let payload = STANDARD.encode(frame);
        self.send(|sid| OutboundMessage::media(sid, payload)).await
    }

    async fn send_mark(&self, name: &str) -> Result<()> {
        self.send(|sid| OutboundMessage::mark(sid, name)).await
    }

    async fn clear(&self) -> Result<()> {
        self.send(OutboundMessage::clear).await
    }

    async fn stop(&self) -> Result<()> {
        self.send(OutboundMessage::stop).await
    }

    async fn close(&self) -> Result<()> {
        self.outbound
            .send(Outbound::Close)
            .await
            .map_err(|_| anyhow::anyhow!("media stream writer has stopped"))
    }
}

/// Decode one inbound text frame. Returns `None` for frames that carry
/// nothing the call needs.
pub fn parse_frame(text: &str) -> Option<ChannelEvent> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => channel_event(message),
        Err(e) => {
            let prefix: String = text.chars().take(LOGGED_FRAME_PREFIX).collect();
            tracing::warn!("ignoring unparsable media stream frame ({}): {}", e, prefix);
            None
        }
    }
}

fn channel_event(message: InboundMessage) -> Option<ChannelEvent> {
    match message {
        InboundMessage::Connected { protocol, .. } => {
            tracing::debug!(?protocol, "media stream connected");
            None
        }
        InboundMessage::Start { start } => Some(ChannelEvent::Started {
            stream_sid: start.stream_sid,
            call_sid: start.call_sid,
        }),
        InboundMessage::Media { media } => {
            if !media.is_inbound() || media.payload.is_empty() {
                return None;
            }
            match STANDARD.decode(&media.payload) {
                Ok(audio) => Some(ChannelEvent::Audio(audio)),
                Err(e) => {
                    tracing::warn!("ignoring media with invalid base64 payload: {}", e);
                    None
                }
            }
        }
        InboundMessage::Mark { mark } => Some(ChannelEvent::Mark(mark.name)),
        InboundMessage::Stop { .. } => Some(ChannelEvent::Stopped),
        InboundMessage::Dtmf { dtmf } => Some(ChannelEvent::Dtmf(dtmf.digit)),
    }
}

/// Split `socket` into reader and writer tasks.
///
/// The returned receiver closes when the socket does.
pub fn attach(socket: WebSocket) -> (Arc<TwilioChannel>, mpsc::Receiver<ChannelEvent>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(CHANNEL_BUFFER_SIZE);
    let (events_tx, events_rx) = mpsc::channel::<ChannelEvent>(CHANNEL_BUFFER_SIZE);
    let channel = Arc::new(TwilioChannel::new(outbound_tx));

    tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            let result = match outbound {
                Outbound::Text(text) => sender.send(Message::Text(text.into())).await,
                Outbound::Close => {
                    tracing::info!("closing media stream socket");
                    if let Err(e) = sender.send(Message::Close(None)).await {
                        tracing::debug!("media stream close: {}", e);
                    }
                    break;
                }
            };
            if let Err(e) = result {
                tracing::error!("failed to write to media stream: {}", e);
                break;
            }
        }
    });

    let reader_channel = channel.clone();
    tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "media stream socket closed");
                    break;
                }
                Ok(Message::Binary(bin)) => {
                    tracing::warn!("ignoring binary media stream frame ({} bytes)", bin.len());
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("media stream read failed: {}", e);
                    break;
                }
            };
            let Some(event) = parse_frame(text.as_str()) else {
                continue;
            };
            if let ChannelEvent::Started { stream_sid, .. } = &event {
                reader_channel.bind(stream_sid);
            }
            if events_tx.send(event).await.is_err() {
                break;
            }
        }
    });

    (channel, events_rx)
}
