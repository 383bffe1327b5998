/// Events a recognition backend emits back to the call controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The caller started talking.
    SpeechStarted,
    Transcript { text: String, is_final: bool },
    UtteranceEnd,
    Closed,
}

/// Events coming from the telephony side of the call.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Started {
        stream_sid: String,
        call_sid: Option<String>,
    },
    /// Decoded inbound caller audio.
    Audio(Vec<u8>),
    /// A marker echoed back after the audio before it finished playing.
    Mark(String),
    Dtmf(String),
    Stopped,
}
