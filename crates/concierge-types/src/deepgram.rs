//! Deepgram streaming recognition (`/v1/listen`) and synthesis (`/v1/speak`) messages.

/// Text messages received on a listen socket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ListenMessage {
    Results(ListenResults),
    SpeechStarted(SpeechStarted),
    UtteranceEnd(UtteranceEnd),
    Metadata(ListenMetadata),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListenResults {
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub speech_final: bool,
    pub channel: ResultsChannel,
}

impl ListenResults {
    /// Transcript of the top alternative, or an empty string.
    pub fn transcript(&self) -> &str {
        self.channel
            .alternatives
            .first()
            .map(|alternative| alternative.transcript.as_str())
            .unwrap_or("")
    }

    pub fn confidence(&self) -> Option<f64> {
        self.channel
            .alternatives
            .first()
            .map(|alternative| alternative.confidence)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResultsChannel {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpeechStarted {
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UtteranceEnd {
    #[serde(default)]
    pub last_word_end: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListenMetadata {
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Control messages sent on a listen socket alongside binary audio.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ListenControl {
    KeepAlive,
    Finalize,
    CloseStream,
}

/// Commands sent on a speak socket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SpeakCommand {
    Speak { text: String },
    Flush,
    Clear,
    Close,
}

/// Text messages received on a speak socket. Audio arrives as binary frames.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SpeakEvent {
    Flushed {
        #[serde(default)]
        sequence_id: u64,
    },
    Cleared {
        #[serde(default)]
        sequence_id: u64,
    },
    Metadata {
        #[serde(default)]
        request_id: Option<String>,
    },
    Warning {
        #[serde(default)]
        description: String,
        #[serde(default)]
        code: Option<String>,
    },
    #[serde(other)]
    Unknown,
}
