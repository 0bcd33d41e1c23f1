//! Batch (non-streaming) response decoding.
//!
//! Both envelopes share the same preconditions: an absent payload is
//! [`ClientError::EmptyResponse`], malformed JSON is
//! [`ClientError::Decode`]. After that each envelope has its own semantic
//! failure, and all of them still carry the provider's token count.

use super::capabilities::ModelCapabilities;
use crate::error::{ClientError, Result};
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use serde_json::Value;

const MESSAGE_TYPE: &str = "message";
const OUTPUT_TEXT_TYPE: &str = "output_text";

/// Text and usage extracted from one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub total_tokens: u32,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Choice content as it arrives on the wire.
///
/// Providers send a string, an array of parts, or occasionally something
/// else entirely (`null`, a number). Only `Text` is usable as a reply.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "Value")]
pub enum ResponseContent {
    Text(String),
    MediaList(Vec<Value>),
    Unrepresentable(Value),
}

impl From<Value> for ResponseContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ResponseContent::Text(text),
            Value::Array(parts) => ResponseContent::MediaList(parts),
            other => ResponseContent::Unrepresentable(other),
        }
    }
}

impl Default for ResponseContent {
    fn default() -> Self {
        ResponseContent::Unrepresentable(Value::Null)
    }
}

// ── Classic envelope ───────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionsResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Usage,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: ResponseContent,
}

// ── Alternate envelope ─────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<OutputItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Usage,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputItem {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<OutputContent>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputContent {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

impl ResponsesResponse {
    /// First `output_text` part of the first `message` entry that has one.
    pub fn output_text(&self) -> Option<&str> {
        self.output
            .iter()
            .filter(|item| item.kind == MESSAGE_TYPE)
            .flat_map(|item| item.content.iter())
            .find(|part| part.kind == OUTPUT_TEXT_TYPE)
            .map(|part| part.text.as_str())
    }
}

// ── Model list ─────────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct ModelList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<ModelEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
}

// ── Decoding ───────────────────────────────────────────────────────

/// Parse an envelope, treating an empty payload as absent.
pub fn decode_envelope<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    if raw.is_empty() {
        return Err(ClientError::EmptyResponse);
    }
    Ok(serde_json::from_slice(raw)?)
}

/// Decode a classic chat-completions response.
pub fn decode_completions(raw: &[u8]) -> Result<Reply> {
    let response: CompletionsResponse = decode_envelope(raw)?;
    let total_tokens = response.usage.total_tokens;

    let Some(choice) = response.choices.into_iter().next() else {
        return Err(ClientError::NoResponses { total_tokens });
    };

    match choice.message.content {
        ResponseContent::Text(text) => Ok(Reply { text, total_tokens }),
        ResponseContent::MediaList(_) | ResponseContent::Unrepresentable(_) => {
            Err(ClientError::NotText { total_tokens })
        }
    }
}

/// Decode an alternate (responses) response.
pub fn decode_responses(raw: &[u8]) -> Result<Reply> {
    let response: ResponsesResponse = decode_envelope(raw)?;
    let total_tokens = response.usage.total_tokens;

    match response.output_text() {
        Some(text) => Ok(Reply {
            text: text.to_string(),
            total_tokens,
        }),
        None => Err(ClientError::NoOutputText { total_tokens }),
    }
}

/// Decode with the envelope matching the model's capabilities.
pub fn decode(raw: &[u8], caps: &ModelCapabilities) -> Result<Reply> {
    if caps.uses_alternate_api {
        decode_responses(raw)
    } else {
        decode_completions(raw)
    }
}

/// Decode a model listing.
pub fn decode_models(raw: &[u8]) -> Result<ModelList> {
    decode_envelope(raw)
}
