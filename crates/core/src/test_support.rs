//! Recording fakes for the collaborator traits.

use crate::generic_types::RecognitionEvent;
use crate::realtime_api::{CallChannel, Recognizer, Synthesizer};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// A model stream that yields `chunks` and ends.
pub fn text_stream(chunks: &[&str]) -> mpsc::Receiver<Result<String>> {
    let (tx, rx) = mpsc::channel(chunks.len().max(1));
    for chunk in chunks {
        tx.try_send(Ok(chunk.to_string())).unwrap();
    }
    rx
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Frame(Vec<u8>),
    Mark(String),
    Clear,
    Stop,
    Close,
}

#[derive(Default)]
pub struct FakeChannel {
    sent: Mutex<Vec<Sent>>,
}

impl FakeChannel {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn marks(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Mark(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl CallChannel for FakeChannel {
    async fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        self.record(Sent::Frame(frame));
        Ok(())
    }

    async fn send_mark(&self, name: &str) -> Result<()> {
        self.record(Sent::Mark(name.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.record(Sent::Clear);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(Sent::Stop);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(Sent::Close);
        Ok(())
    }
}

pub struct FakeSynthesizer {
    connected: AtomicBool,
    fail_connects: AtomicBool,
    connect_calls: AtomicUsize,
    clears: AtomicUsize,
    closed: AtomicBool,
    audio: Mutex<Vec<Vec<u8>>>,
    drop_mid_unit: AtomicBool,
    spoken: Mutex<Vec<String>>,
}

impl Default for FakeSynthesizer {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            fail_connects: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            audio: Mutex::new(Vec::new()),
            drop_mid_unit: AtomicBool::new(false),
            spoken: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSynthesizer {
    /// Chunks returned for every synthesized unit.
    pub fn set_audio(&self, chunks: Vec<Vec<u8>>) {
        *self.audio.lock().unwrap() = chunks;
    }

    /// End every unit's stream with an error after its chunks.
    pub fn drop_mid_unit(&self, drop: bool) {
        self.drop_mid_unit.store(drop, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connects.load(Ordering::SeqCst) {
            anyhow::bail!("synthesis unavailable");
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn synthesize(&self, text: &str) -> Result<mpsc::Receiver<Result<Vec<u8>>>> {
        self.spoken.lock().unwrap().push(text.to_string());
        let chunks = self.audio.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            tx.try_send(Ok(chunk)).unwrap();
        }
        if self.drop_mid_unit.load(Ordering::SeqCst) {
            tx.try_send(Err(anyhow::anyhow!("synthesis socket dropped"))).unwrap();
        }
        Ok(rx)
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeRecognizer {
    events: Mutex<Option<mpsc::Receiver<RecognitionEvent>>>,
    audio: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl FakeRecognizer {
    /// The fake and the sender that drives its event stream.
    pub fn new() -> (Self, mpsc::Sender<RecognitionEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let recognizer = Self {
            events: Mutex::new(Some(rx)),
            audio: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };
        (recognizer, tx)
    }

    pub fn audio(&self) -> Vec<Vec<u8>> {
        self.audio.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn connect(&self) -> Result<mpsc::Receiver<RecognitionEvent>> {
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("recognizer already connected"))
    }

    async fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.audio.lock().unwrap().push(audio);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
