//! External context enrichment through a single provider (Apify).
//!
//! An enrichment call runs an Apify actor synchronously and returns its
//! dataset items. The first item is flattened into sorted
//! `Title Case Key: value` lines under an `[MCP: <function>]` header, which
//! the client stores as a `function` turn.

use crate::api::Headers;
use crate::api::request::encode_body;
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const APIFY_PROVIDER: &str = "apify";
const APIFY_URL: &str = "https://api.apify.com/v2/acts/";
const APIFY_PATH: &str = "/run-sync-get-dataset-items";
const PROXY_CONFIG_KEY: &str = "proxyConfiguration";

/// One enrichment invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnrichmentRequest {
    pub provider: String,
    /// Actor identifier, e.g. `apify~website-content-crawler`.
    pub function: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl EnrichmentRequest {
    pub fn new(provider: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            function: function.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A ready-to-send provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub endpoint: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Validate the request and build the provider call.
pub fn prepare(request: &EnrichmentRequest, apify_api_key: &str) -> Result<PreparedCall> {
    let provider = request.provider.to_lowercase();
    if provider != APIFY_PROVIDER {
        return Err(ClientError::UnsupportedProvider);
    }
    if apify_api_key.is_empty() {
        return Err(ClientError::MissingApiKey(provider));
    }

    let mut params = request.params.clone();
    params.insert(
        PROXY_CONFIG_KEY.to_string(),
        serde_json::json!({ "useApifyProxy": true }),
    );

    let headers = Headers::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Authorization".to_string(), format!("Bearer {apify_api_key}")),
    ]);

    Ok(PreparedCall {
        endpoint: format!("{APIFY_URL}{}{APIFY_PATH}", request.function),
        headers,
        body: encode_body(&params)?,
    })
}

/// Name recorded on the function turn.
pub fn function_turn_name(function: &str) -> String {
    function.replace('~', "-")
}

/// Render a provider response for the conversation.
pub fn format_response(raw: &[u8], function: &str) -> String {
    let header = format!("[MCP: {function}]");
    let Ok(value) = serde_json::from_slice::<Value>(raw) else {
        return format!("{header} (failed to decode response)");
    };

    let object = match &value {
        Value::Array(items) => match items.first() {
            None => return format!("{header} (no data returned)"),
            Some(Value::Object(obj)) => obj,
            Some(_) => return format!("{header} (unexpected response format)"),
        },
        Value::Object(obj) => obj,
        _ => return format!("{header} (unexpected response format)"),
    };

    let mut lines: Vec<String> = object
        .iter()
        .map(|(key, value)| format!("{}: {}", title_case(&key.replace('_', " ")), render_value(value)))
        .collect();
    lines.sort();
    format!("{header}\n{}", lines.join("\n"))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
