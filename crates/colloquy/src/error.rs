//! Error types.
//!
//! The taxonomy mirrors where a failure originates: the transport
//! collaborator ([`TransportError`], propagated verbatim), the persistence
//! collaborator ([`HistoryError`]), or this crate's own decoding and
//! validation ([`ClientError`]).
//!
//! Stream parse failures are deliberately absent: the stream decoder turns
//! them into an `Error: <message>` line in the decoded output instead of an
//! `Err` (see [`api::streaming`](crate::api::streaming)).

use thiserror::Error;

/// Failure reported by a [`Transport`](crate::api::Transport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// Any other transport failure, carried as an opaque message.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Status code of an HTTP error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure reported by a [`HistoryStore`](crate::history::HistoryStore).
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure resolving an out-of-band attachment.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("empty response")]
    EmptyResponse,

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// Classic envelope with an empty `choices` list.
    #[error("no responses returned")]
    NoResponses { total_tokens: u32 },

    /// Classic envelope whose first choice content is not plain text.
    #[error("response cannot be converted to a string")]
    NotText { total_tokens: u32 },

    /// Alternate envelope without any `output_text` part.
    #[error("no response returned")]
    NoOutputText { total_tokens: u32 },

    #[error("history tracking needs to be enabled to use this feature")]
    HistoryDisabled,

    #[error("unsupported MCP provider")]
    UnsupportedProvider,

    #[error("the {0} api key is not configured")]
    MissingApiKey(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    /// Token usage carried by envelope-level semantic errors.
    ///
    /// The envelope was well formed, so the provider's usage count is still
    /// meaningful even though no usable text came back.
    pub fn total_tokens(&self) -> Option<u32> {
        match self {
            ClientError::NoResponses { total_tokens }
            | ClientError::NotText { total_tokens }
            | ClientError::NoOutputText { total_tokens } => Some(*total_tokens),
            _ => None,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ClientError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
