//! Client configuration.
//!
//! [`ClientConfig`] is an immutable value handed to [`Client::new`](crate::Client::new).
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```ignore
//! let config = ClientConfig::default()
//!     .with_model("o1-mini")
//!     .with_context_window(16_384)
//!     .with_role("You are a terse reviewer.");
//! ```
//!
//! Loading from disk is a thin [`serde`] pass (see [`ClientConfig::from_json`]);
//! anything beyond that belongs to the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default persona written into the anchor turn.
pub const DEFAULT_ROLE: &str = "You are a helpful assistant.";

/// Configuration consumed by the client, the request assembler and the
/// HTTP transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Provider name, used for the `<NAME>_API_KEY` environment variable.
    pub name: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// Context window size in tokens. 80% of it is usable by history.
    pub context_window: usize,
    /// Persona text for the anchor system turn.
    pub role: String,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub seed: Option<i64>,
    /// Reasoning effort sent with alternate-shape requests.
    pub effort: String,
    pub thread: String,
    /// Start a fresh thread for every interactive session.
    pub auto_create_new_thread: bool,
    /// Disable reading and writing the history store.
    pub omit_history: bool,
    pub url: String,
    pub completions_path: String,
    pub responses_path: String,
    pub models_path: String,
    pub speech_path: String,
    pub image_generations_path: String,
    pub image_edits_path: String,
    pub transcriptions_path: String,
    pub auth_header: String,
    pub auth_token_prefix: String,
    pub user_agent: String,
    /// Extra headers attached to every request. Never override the
    /// standard auth, user-agent or content-type headers.
    pub custom_headers: BTreeMap<String, String>,
    /// Voice for speech synthesis.
    pub voice: String,
    pub apify_api_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            context_window: 8192,
            role: DEFAULT_ROLE.to_string(),
            temperature: 1.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            seed: None,
            effort: "low".to_string(),
            thread: "default".to_string(),
            auto_create_new_thread: true,
            omit_history: false,
            url: "https://api.openai.com".to_string(),
            completions_path: "/v1/chat/completions".to_string(),
            responses_path: "/v1/responses".to_string(),
            models_path: "/v1/models".to_string(),
            speech_path: "/v1/audio/speech".to_string(),
            image_generations_path: "/v1/images/generations".to_string(),
            image_edits_path: "/v1/images/edits".to_string(),
            transcriptions_path: "/v1/audio/transcriptions".to_string(),
            auth_header: "Authorization".to_string(),
            auth_token_prefix: "Bearer ".to_string(),
            user_agent: concat!("colloquy/", env!("CARGO_PKG_VERSION")).to_string(),
            custom_headers: BTreeMap::new(),
            voice: "nova".to_string(),
            apify_api_key: String::new(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = thread.into();
        self
    }

    pub fn with_omit_history(mut self, omit: bool) -> Self {
        self.omit_history = omit;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_effort(mut self, effort: impl Into<String>) -> Self {
        self.effort = effort.into();
        self
    }

    pub fn with_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_apify_api_key(mut self, key: impl Into<String>) -> Self {
        self.apify_api_key = key.into();
        self
    }

    /// Name of the environment variable holding the API key, e.g. `OPENAI_API_KEY`.
    pub fn api_key_env_var(&self) -> String {
        format!("{}_API_KEY", self.name.to_uppercase())
    }

    /// Full URL for an API path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_openai() {
        let config = ClientConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.auth_header, "Authorization");
        assert_eq!(config.auth_token_prefix, "Bearer ");
        assert!(!config.omit_history);
        assert!(config.seed.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ClientConfig::from_json(r#"{"model": "o1-mini", "context_window": 1000}"#).unwrap();
        assert_eq!(config.model, "o1-mini");
        assert_eq!(config.context_window, 1000);
        assert_eq!(config.completions_path, "/v1/chat/completions");
    }

    #[test]
    fn builders_override_fields() {
        let config = ClientConfig::default()
            .with_model("gpt-5-mini")
            .with_role("persona")
            .with_seed(7)
            .with_custom_header("X-Team", "core");
        assert_eq!(config.model, "gpt-5-mini");
        assert_eq!(config.role, "persona");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.custom_headers["X-Team"], "core");
    }

    #[test]
    fn endpoint_joins_url_and_path() {
        let config = ClientConfig::default().with_url("http://localhost:8080");
        assert_eq!(
            config.endpoint("/v1/models"),
            "http://localhost:8080/v1/models"
        );
    }

    #[test]
    fn api_key_env_var_uses_uppercase_name() {
        assert_eq!(ClientConfig::default().api_key_env_var(), "OPENAI_API_KEY");
    }
}
