//! Convenience re-exports for common `colloquy` types.
//!
//! ```ignore
//! use colloquy::prelude::*;
//! ```
//!
//! Covers what a typical frontend needs: the [`Client`] with its config and
//! errors, the HTTP transport, history stores, attachments and event
//! handlers. Grammar internals and request envelopes stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    Client, ClientConfig, ClientError, Clock, Content, HistoryError, MediaContent, Message, Role,
    SystemClock, TransportError, Turn,
};

// ── Wire ────────────────────────────────────────────────────────────
pub use crate::api::{
    Attachment, Dialect, FileReader, Headers, HttpTransport, ModelCapabilities, RetryConfig,
    StdFileReader, StreamDecoder, Transport, TransportFuture, capabilities_for,
};

// ── Conversation state ──────────────────────────────────────────────
pub use crate::context::{ContextUsage, ConversationWindow, TruncationReport};
pub use crate::history::{FileHistoryStore, HistoryManager, HistoryStore, MemoryHistoryStore};

// ── Events ──────────────────────────────────────────────────────────
pub use crate::enrichment::EnrichmentRequest;
pub use crate::events::{
    ClientEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
