use crate::client::config::Config;
use crate::client::consts::{CHANNEL_CAPACITY, UNIT_CHANNEL_CAPACITY};
use crate::client::utils;
use anyhow::{Context, Result};
use concierge_types::deepgram::{SpeakCommand, SpeakEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// What the speak socket produces, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakOutput {
    Audio(Vec<u8>),
    Flushed(u64),
    Cleared(u64),
}

/// Counts flushes and clears so a unit's audio stream ends at its own `Flushed`,
/// not at one left over from an earlier, abandoned unit.
#[derive(Debug, Default)]
struct Ledger {
    flushes_sent: u64,
    flushes_seen: u64,
    cleared_floor: u64,
}

/// A streaming synthesis session. Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct SpeakClient {
    commands: mpsc::Sender<SpeakCommand>,
    output: Arc<tokio::sync::Mutex<mpsc::Receiver<SpeakOutput>>>,
    connected: Arc<AtomicBool>,
    ledger: Arc<Mutex<Ledger>>,
}

pub async fn connect_speak(config: &Config) -> Result<SpeakClient> {
    let request = utils::build_request(utils::speak_url(config), config)?;
    let (ws_stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .context("Failed to connect to Deepgram speak socket")?;
    tracing::info!("connected to Deepgram speak ({})", config.model());

    let (mut write, mut read) = ws_stream.split();
    let (commands_tx, mut commands_rx) = mpsc::channel::<SpeakCommand>(CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::channel::<SpeakOutput>(CHANNEL_CAPACITY);
    let connected = Arc::new(AtomicBool::new(true));

    let writer_connected = connected.clone();
    tokio::spawn(async move {
        while let Some(command) = commands_rx.recv().await {
            let closing = command == SpeakCommand::Close;
            match serde_json::to_string(&command) {
                Ok(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("failed to send speak command: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to serialize speak command: {}", e);
                }
            }
            if closing {
                if let Err(e) = write.close().await {
                    tracing::debug!("speak socket close: {}", e);
                }
                break;
            }
        }
        writer_connected.store(false, Ordering::SeqCst);
    });

    let reader_connected = connected.clone();
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            let message = match message {
                Err(e) => {
                    tracing::error!("failed to read speak message: {}", e);
                    break;
                }
                Ok(message) => message,
            };
            let output = match message {
                Message::Binary(audio) => Some(SpeakOutput::Audio(audio)),
                Message::Text(text) => match serde_json::from_str::<SpeakEvent>(&text) {
                    Ok(SpeakEvent::Flushed { sequence_id }) => Some(SpeakOutput::Flushed(sequence_id)),
                    Ok(SpeakEvent::Cleared { sequence_id }) => Some(SpeakOutput::Cleared(sequence_id)),
                    Ok(SpeakEvent::Warning { description, code }) => {
                        tracing::warn!("speak warning {:?}: {}", code, description);
                        None
                    }
                    Ok(SpeakEvent::Metadata { request_id }) => {
                        tracing::debug!("speak metadata request_id={:?}", request_id);
                        None
                    }
                    Ok(SpeakEvent::Unknown) => None,
                    Err(e) => {
                        tracing::warn!("failed to deserialize speak message: {}, text=> {:?}", e, text);
                        None
                    }
                },
                Message::Close(reason) => {
                    tracing::info!("speak connection closed: {:?}", reason);
                    break;
                }
                _ => None,
            };
            if let Some(output) = output {
                if output_tx.send(output).await.is_err() {
                    break;
                }
            }
        }
        reader_connected.store(false, Ordering::SeqCst);
    });

    Ok(SpeakClient {
        commands: commands_tx,
        output: Arc::new(tokio::sync::Mutex::new(output_rx)),
        connected,
        ledger: Arc::new(Mutex::new(Ledger::default())),
    })
}

impl SpeakClient {
    async fn send_command(&self, command: SpeakCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("speak socket is closed"))
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.commands.is_closed()
    }

    /// Synthesize one text unit.
    ///
    /// Sends `Speak` followed by `Flush` and returns the unit's audio. The stream
    /// ends at the matching `Flushed`, or at a `Cleared` issued after the unit
    /// started. Units are serialized: a second call waits until the previous
    /// unit's stream has been fully drained from the socket, even if its receiver
    /// was dropped early. If the socket goes away first, the stream ends with
    /// an `Err` so a truncated unit is never mistaken for a finished one.
    pub async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<Result<Vec<u8>>>> {
        let mut output = self.output.clone().lock_owned().await;

        self.send_command(SpeakCommand::Speak {
            text: text.to_string(),
        })
        .await?;
        self.send_command(SpeakCommand::Flush).await?;
        let target = {
            let mut ledger = self.ledger();
            ledger.flushes_sent += 1;
            ledger.flushes_sent
        };

        let (tx, rx) = mpsc::channel(UNIT_CHANNEL_CAPACITY);
        let ledger = self.ledger.clone();
        tokio::spawn(async move {
            loop {
                let Some(out) = output.recv().await else {
                    tracing::warn!(flush = target, "speak socket closed before the unit was flushed");
                    let _ = tx
                        .send(Err(anyhow::anyhow!("speak socket closed mid-unit")))
                        .await;
                    return;
                };
                let done = {
                    let mut ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
                    match out {
                        SpeakOutput::Audio(audio) => {
                            drop(ledger);
                            // A dropped receiver means the unit was abandoned; keep draining.
                            let _ = tx.send(Ok(audio)).await;
                            false
                        }
                        SpeakOutput::Flushed(_) => {
                            ledger.flushes_seen += 1;
                            ledger.flushes_seen >= target
                        }
                        SpeakOutput::Cleared(_) => {
                            ledger.flushes_seen = ledger.flushes_seen.max(ledger.cleared_floor);
                            ledger.flushes_seen >= target
                        }
                    }
                };
                if done {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Drop any audio Deepgram has buffered but not yet sent.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut ledger = self.ledger();
            ledger.cleared_floor = ledger.flushes_sent;
        }
        self.send_command(SpeakCommand::Clear).await
    }

    pub async fn close(&self) -> Result<()> {
        self.send_command(SpeakCommand::Close).await
    }
}
