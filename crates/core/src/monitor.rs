use crate::realtime_api::Synthesizer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Whether the session can still produce speech.
#[derive(Debug)]
pub struct SpeechStatus {
    enabled: AtomicBool,
}

impl Default for SpeechStatus {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl SpeechStatus {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }
}

/// Watches the synthesis connection and reconnects it when it drops.
///
/// After `max_reconnects` consecutive failed attempts the session is marked
/// speech-disabled and the monitor stops.
pub struct SynthesisMonitor {
    synthesizer: Arc<dyn Synthesizer>,
    status: Arc<SpeechStatus>,
    interval: Duration,
    backoff: Duration,
    max_reconnects: u32,
}

impl SynthesisMonitor {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        status: Arc<SpeechStatus>,
        interval: Duration,
        backoff: Duration,
        max_reconnects: u32,
    ) -> Self {
        Self {
            synthesizer,
            status,
            interval,
            backoff,
            max_reconnects,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.synthesizer.is_connected() {
                continue;
            }
            tracing::warn!("synthesis connection lost, reconnecting");
            if !self.reconnect().await {
                tracing::error!(
                    attempts = self.max_reconnects,
                    "synthesis reconnect failed, continuing without speech"
                );
                self.status.disable();
                return;
            }
        }
    }

    async fn reconnect(&self) -> bool {
        for attempt in 1..=self.max_reconnects {
            tokio::time::sleep(self.backoff * attempt).await;
            match self.synthesizer.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, "synthesis connection restored");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, "synthesis reconnect failed: {:#}", e);
                }
            }
        }
        false
    }
}
