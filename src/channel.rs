//! Channel-specific reply shaping
//!
//! Voice assistants get a structured payload with an explicit
//! expect-user-response flag; every other channel gets plain text.

use serde::{Deserialize, Serialize};

/// Request source the recognition platform reports for the voice assistant
pub const VOICE_ASSISTANT_SOURCE: &str = "google";

/// Delivery surface of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    VoiceAssistant,
    GenericText,
}

impl Channel {
    /// Map the platform's request source (`"google"` for the voice assistant)
    pub fn from_source(source: Option<&str>) -> Self {
        match source {
            Some(source) if source.eq_ignore_ascii_case(VOICE_ASSISTANT_SOURCE) => {
                Channel::VoiceAssistant
            }
            _ => Channel::GenericText,
        }
    }
}

/// Reply in the shape the turn's channel expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Text { text: String },
    Voice(VoicePayload),
}

impl ReplyPayload {
    /// The message text, whatever the shape
    pub fn text(&self) -> &str {
        match self {
            ReplyPayload::Text { text } => text,
            ReplyPayload::Voice(payload) => payload.text(),
        }
    }

    /// Explicit turn-closing signal; `None` for channels that have none
    pub fn expects_user_response(&self) -> Option<bool> {
        match self {
            ReplyPayload::Text { .. } => None,
            ReplyPayload::Voice(payload) => Some(payload.expect_user_response),
        }
    }
}

/// Voice-assistant conversation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePayload {
    pub expect_user_response: bool,
    pub rich_response: RichResponse,
}

impl VoicePayload {
    pub fn text(&self) -> &str {
        self.rich_response
            .items
            .first()
            .map_or("", |item| item.simple_response.display_text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichResponse {
    pub items: Vec<RichItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichItem {
    pub simple_response: SimpleResponse,
}

/// Spoken and displayed text of one response bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleResponse {
    pub text_to_speech: String,
    pub display_text: String,
}

/// Shape `message` for `channel`.
///
/// `expect_more_input` only has a structural effect on the voice channel;
/// plain text has no turn-closing signal.
pub fn shape(message: String, channel: Channel, expect_more_input: bool) -> ReplyPayload {
    match channel {
        Channel::VoiceAssistant => ReplyPayload::Voice(VoicePayload {
            expect_user_response: expect_more_input,
            rich_response: RichResponse {
                items: vec![RichItem {
                    simple_response: SimpleResponse {
                        text_to_speech: message.clone(),
                        display_text: message,
                    },
                }],
            },
        }),
        Channel::GenericText => ReplyPayload::Text { text: message },
    }
}
