//! Conversation state and protocol reconciliation for OpenAI-style chat APIs.
//!
//! `colloquy` sits between a caller (CLI, chat frontend, script) and an
//! HTTP transport. It owns three things that have to agree byte-for-byte
//! with the provider:
//!
//! - a token-budgeted conversation history, see
//!   [`ConversationWindow`](context::ConversationWindow). Turn 0 is the
//!   persona "anchor" and is never evicted.
//! - a model capability table, see
//!   [`capabilities_for`](api::capabilities_for), which decides between the
//!   classic chat-completions envelope and the alternate responses envelope.
//! - a streaming decoder, see [`StreamDecoder`](api::StreamDecoder), which
//!   flattens two different Server-Sent-Event grammars into one text result.
//!
//! The [`Client`] ties these together with two collaborators supplied by the
//! caller: a [`Transport`](api::Transport) (HTTP) and a
//! [`HistoryStore`](history::HistoryStore) (persistence).
//!
//! # Getting started
//!
//! ```ignore
//! use colloquy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let config = ClientConfig::default()
//!         .with_model("gpt-4o")
//!         .with_api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default());
//!
//!     let transport = HttpTransport::new(&config)?;
//!     let store = FileHistoryStore::new(".colloquy/history")?;
//!
//!     let mut client = Client::new(transport, store, config, false);
//!     let (answer, tokens) = client.query("What is a monad?", None).await?;
//!     println!("{answer}\n({tokens} tokens)");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | capability table, request assembly, batch and stream decoding, transport |
//! | [`context`] | cost estimates and the truncating conversation window |
//! | [`history`] | the persistence collaborator and history rendering |
//! | [`events`] | injected observer for request/response tracing |
//! | [`enrichment`] | the single external enrichment provider (Apify) |

pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod history;
pub mod ids;
pub mod logging;
pub mod prelude;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use client::{Clock, Client, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, HistoryError, TransportError};

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Function => write!(f, "function"),
        }
    }
}

/// Message content: plain text or a list of media parts.
///
/// Serialized untagged, so the wire form is either a JSON string or a JSON
/// array of typed parts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Media(Vec<MediaContent>),
}

impl Content {
    /// The text, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Media(_) => None,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

/// One media part of a user message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaContent {
    /// An image, either a remote URL or a `data:` URI.
    ImageUrl { image_url: ImageUrl },
    /// Base64-encoded audio with its container label (`"wav"`, `"mp3"`, ...).
    InputAudio { input_audio: InputAudio },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InputAudio {
    pub data: String,
    pub format: String,
}

/// A message as sent to the API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Content,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            name: None,
            content: Content::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            name: None,
            content: Content::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            name: None,
            content: Content::Text(content.into()),
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            name: Some(name.into()),
            content: Content::Text(content.into()),
        }
    }

    /// A user message carrying media parts instead of text.
    pub fn user_media(parts: Vec<MediaContent>) -> Self {
        Self {
            role: Role::User,
            name: None,
            content: Content::Media(parts),
        }
    }
}

/// One stored conversation turn: a message plus when it was recorded.
///
/// The message fields are flattened, so a persisted turn reads
/// `{"role": ..., "content": ..., "timestamp": ...}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn new(message: Message, timestamp: DateTime<Utc>) -> Self {
        Self {
            message,
            timestamp: Some(timestamp),
        }
    }

    /// A turn without a timestamp.
    pub fn untimed(message: Message) -> Self {
        Self {
            message,
            timestamp: None,
        }
    }

    pub fn role(&self) -> Role {
        self.message.role
    }

    /// The text content, if any. Media turns return `None`.
    pub fn text(&self) -> Option<&str> {
        self.message.content.as_text()
    }
}
