//! Request assembly for the two chat envelopes.
//!
//! [`assemble`] picks the classic chat-completions shape or the alternate
//! responses shape from [`ModelCapabilities::uses_alternate_api`]. The two
//! shapes disagree on sampling fields: the classic one drops `temperature`
//! and `top_p` entirely for models that reject them, the alternate one
//! always sends both.

use super::capabilities::ModelCapabilities;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::{Message, Turn};
use serde::Serialize;

/// Classic chat-completions request body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompletionsRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub stream: bool,
}

/// Alternate (responses) request body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<Message>,
    pub max_output_tokens: u32,
    pub reasoning: Reasoning,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Reasoning {
    pub effort: String,
}

/// Either request shape, serialized without a wrapper.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestBody {
    Completions(CompletionsRequest),
    Responses(ResponsesRequest),
}

impl RequestBody {
    /// The outgoing message list, whichever shape this is.
    pub fn messages(&self) -> &[Message] {
        match self {
            RequestBody::Completions(req) => &req.messages,
            RequestBody::Responses(req) => &req.input,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_body(self)
    }
}

/// Serialize an outgoing JSON body.
pub fn encode_body<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(ClientError::Encode)
}

/// Messages sent for `turns`, skipping the anchor when the model rejects a
/// leading system message, plus the attachment message if any.
pub fn outgoing_messages(
    turns: &[Turn],
    caps: &ModelCapabilities,
    attachment: Option<Message>,
) -> Vec<Message> {
    let skip = usize::from(caps.omit_first_system_message);
    turns
        .iter()
        .skip(skip)
        .map(|turn| turn.message.clone())
        .chain(attachment)
        .collect()
}

/// Build the request body for the current conversation.
pub fn assemble(
    turns: &[Turn],
    config: &ClientConfig,
    caps: &ModelCapabilities,
    attachment: Option<Message>,
    stream: bool,
) -> RequestBody {
    let messages = outgoing_messages(turns, caps, attachment);

    if caps.uses_alternate_api {
        return RequestBody::Responses(ResponsesRequest {
            model: config.model.clone(),
            input: messages,
            max_output_tokens: config.max_tokens,
            reasoning: Reasoning {
                effort: config.effort.clone(),
            },
            stream,
            temperature: config.temperature,
            top_p: config.top_p,
        });
    }

    let (temperature, top_p) = if caps.supports_temperature {
        (Some(config.temperature), Some(config.top_p))
    } else {
        (None, None)
    };

    RequestBody::Completions(CompletionsRequest {
        messages,
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature,
        top_p,
        frequency_penalty: config.frequency_penalty,
        presence_penalty: config.presence_penalty,
        seed: config.seed,
        stream,
    })
}
