//! Twilio Media Streams messages.
//!
//! Inbound messages arrive as JSON text frames tagged by `event`; outbound
//! messages use the same envelope and are always addressed by `streamSid`.

/// Messages Twilio sends over the media stream websocket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    Start {
        start: StartMetadata,
    },
    Media {
        media: InboundMedia,
    },
    Mark {
        mark: MarkPayload,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    Dtmf {
        dtmf: DtmfPayload,
    },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InboundMedia {
    #[serde(default = "default_track")]
    pub track: String,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Base64 encoded µ-law audio.
    #[serde(default)]
    pub payload: String,
}

fn default_track() -> String {
    "inbound".to_string()
}

impl InboundMedia {
    pub fn is_inbound(&self) -> bool {
        self.track == "inbound"
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

/// Messages sent back to Twilio for the call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
    Stop {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl OutboundMessage {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: &str) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload {
                name: name.to_string(),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }

    pub fn stop(stream_sid: &str) -> Self {
        Self::Stop {
            stream_sid: stream_sid.to_string(),
        }
    }
}
