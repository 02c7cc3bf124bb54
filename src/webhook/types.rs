//! Webhook request and response types
//!
//! Subset of the recognition platform's v2 webhook format that the
//! fulfillment core needs.

use crate::channel::{ReplyPayload, VoicePayload};
use crate::context::{ContextParameters, SessionContext};
use serde::{Deserialize, Serialize};

/// Inbound fulfillment request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub response_id: Option<String>,
    /// `projects/<project>/agent/sessions/<session>`
    pub session: String,
    pub query_result: QueryResult,
    #[serde(default)]
    pub original_detect_intent_request: Option<OriginalRequest>,
}

impl WebhookRequest {
    /// Request source reported by the platform (e.g. `google`)
    pub fn source(&self) -> Option<&str> {
        self.original_detect_intent_request
            .as_ref()
            .and_then(|original| original.source.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    pub language_code: String,
    pub intent: IntentRef,
    #[serde(default)]
    pub output_contexts: Vec<WireContext>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRef {
    #[serde(default)]
    pub name: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginalRequest {
    #[serde(default)]
    pub source: Option<String>,
}

/// Context as it appears on the wire, with its full resource name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireContext {
    pub name: String,
    #[serde(default)]
    pub lifespan_count: u32,
    #[serde(default, skip_serializing_if = "ContextParameters::is_empty")]
    pub parameters: ContextParameters,
}

impl WireContext {
    /// Convert to a session context keyed by the short name
    pub fn into_session_context(self) -> SessionContext {
        let short = short_context_name(&self.name).to_string();
        SessionContext::new(short, self.lifespan_count, self.parameters)
    }

    /// Wire form of `context`, scoped under `session`
    pub fn from_session_context(session: &str, context: SessionContext) -> Self {
        Self {
            name: format!("{session}/contexts/{}", context.name),
            lifespan_count: context.lifespan,
            parameters: context.parameters,
        }
    }
}

/// Last path segment of a context resource name
pub fn short_context_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Outbound fulfillment response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PlatformPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_contexts: Vec<WireContext>,
}

impl WebhookResponse {
    pub fn from_reply(reply: ReplyPayload) -> Self {
        match reply {
            ReplyPayload::Text { text } => Self {
                fulfillment_messages: vec![FulfillmentMessage {
                    text: TextMessage {
                        text: vec![text.clone()],
                    },
                }],
                fulfillment_text: text,
                ..Self::default()
            },
            ReplyPayload::Voice(voice) => Self {
                fulfillment_text: voice.text().to_string(),
                payload: Some(PlatformPayload { google: voice }),
                ..Self::default()
            },
        }
    }

    pub fn with_contexts(mut self, contexts: Vec<WireContext>) -> Self {
        self.output_contexts = contexts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentMessage {
    pub text: TextMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub text: Vec<String>,
}

/// Platform-specific payloads, keyed by platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPayload {
    pub google: VoicePayload,
}

/// Health probe response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{shape, Channel};
    use serde_json::json;

    #[test]
    fn test_short_context_name() {
        assert_eq!(
            short_context_name("projects/p/agent/sessions/s/contexts/helpercontext"),
            "helpercontext"
        );
        assert_eq!(short_context_name("helpercontext"), "helpercontext");
    }

    #[test]
    fn test_text_reply_wire_shape() {
        let response =
            WebhookResponse::from_reply(shape("Hi".to_string(), Channel::GenericText, true));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "fulfillmentText": "Hi",
                "fulfillmentMessages": [{ "text": { "text": ["Hi"] } }]
            })
        );
    }

    #[test]
    fn test_voice_reply_wire_shape() {
        let response =
            WebhookResponse::from_reply(shape("Bye".to_string(), Channel::VoiceAssistant, false));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["fulfillmentText"], json!("Bye"));
        assert_eq!(value["payload"]["google"]["expectUserResponse"], json!(false));
        assert!(value.get("fulfillmentMessages").is_none());
    }

    #[test]
    fn test_request_parses_platform_shape() {
        let request: WebhookRequest = serde_json::from_value(json!({
            "responseId": "r-1",
            "session": "projects/p/agent/sessions/abc",
            "queryResult": {
                "queryText": "blorp",
                "languageCode": "en-us",
                "intent": {
                    "name": "projects/p/agent/intents/1",
                    "displayName": "Default Fallback Intent"
                },
                "outputContexts": [{
                    "name": "projects/p/agent/sessions/abc/contexts/helpercontext",
                    "lifespanCount": 3,
                    "parameters": { "fallbackCount": 1.0 }
                }]
            },
            "originalDetectIntentRequest": { "source": "google", "payload": {} }
        }))
        .unwrap();

        assert_eq!(request.source(), Some("google"));
        let context = request.query_result.output_contexts[0]
            .clone()
            .into_session_context();
        assert_eq!(context.name, "helpercontext");
        assert_eq!(context.lifespan, 3);
    }
}
