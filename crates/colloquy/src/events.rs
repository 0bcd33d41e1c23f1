//! Request/response tracing as an injected observer.
//!
//! The [`Client`](crate::Client) reports what it sends and receives through
//! [`ClientEvent`]s. Nothing is printed unless the caller installs a
//! handler:
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | The default; tests |
//! | [`LoggingHandler`] | `tracing` output, requests rendered as cURL commands |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Several handlers in order |

use crate::api::Headers;
use crate::context::TruncationReport;
use crate::error::HistoryError;
use tracing::{debug, warn};

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ClientEvent<'a> {
    /// About to call the transport. `body` is `None` for GET requests.
    /// `headers` is `None` when the transport's standard headers apply.
    Request {
        method: &'a str,
        endpoint: &'a str,
        body: Option<&'a [u8]>,
        headers: Option<&'a Headers>,
    },
    /// Raw bytes returned by the transport.
    Response { endpoint: &'a str, raw: &'a [u8] },
    /// The window evicted turns after an append.
    Truncated(&'a TruncationReport),
    /// A best-effort history write failed and was ignored.
    HistoryWriteFailed { error: &'a HistoryError },
    /// Binary output (audio, image) was written to disk.
    BinaryWritten {
        label: &'a str,
        bytes: usize,
        path: &'a str,
    },
}

pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ClientEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&ClientEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&ClientEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&ClientEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ClientEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &ClientEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

// ── Logging ────────────────────────────────────────────────────────

/// Logs events via `tracing`, rendering requests as cURL commands.
pub struct LoggingHandler {
    api_key_env_var: String,
}

impl LoggingHandler {
    /// `api_key_env_var` is referenced in rendered commands instead of the
    /// real key, e.g. `OPENAI_API_KEY`.
    pub fn new(api_key_env_var: impl Into<String>) -> Self {
        Self {
            api_key_env_var: api_key_env_var.into(),
        }
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::new("OPENAI_API_KEY")
    }
}

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ClientEvent<'_>) {
        match event {
            ClientEvent::Request {
                method,
                endpoint,
                body,
                headers,
            } => {
                let curl = curl_command(method, endpoint, *body, *headers, &self.api_key_env_var);
                debug!("\nGenerated cURL command:\n\n{curl}");
            }
            ClientEvent::Response { raw, .. } => {
                debug!("\nResponse\n\n{}\n", String::from_utf8_lossy(raw));
            }
            ClientEvent::Truncated(report) => {
                debug!(
                    "history truncated: {} evicted, {} remaining (~{} tokens, budget {})",
                    report.evicted, report.remaining, report.estimated_tokens, report.budget
                );
            }
            ClientEvent::HistoryWriteFailed { error } => {
                warn!("failed to write history: {error}");
            }
            ClientEvent::BinaryWritten { label, bytes, path } => {
                debug!("\nResponse\n\n[{label}] {bytes} bytes written to {path}\n");
            }
        }
    }
}

/// Render an equivalent cURL command.
///
/// Without explicit headers the standard auth and content-type headers are
/// shown, with the key referenced through `api_key_env_var` rather than
/// printed.
pub fn curl_command(
    method: &str,
    endpoint: &str,
    body: Option<&[u8]>,
    headers: Option<&Headers>,
    api_key_env_var: &str,
) -> String {
    let mut lines = vec![format!(
        "curl --location --insecure --request {method} '{endpoint}' \\"
    )];

    match headers.filter(|h| !h.is_empty()) {
        Some(headers) => {
            for (name, value) in headers {
                lines.push(format!("  --header '{name}: {value}' \\"));
            }
        }
        None => {
            lines.push(format!(
                "  --header \"Authorization: Bearer ${{{api_key_env_var}}}\" \\"
            ));
            lines.push("  --header 'Content-Type: application/json' \\".to_string());
        }
    }

    if let Some(body) = body {
        let escaped = String::from_utf8_lossy(body).replace('\'', "'\"'\"'");
        lines.push(format!("  --data-raw '{escaped}'"));
    }

    lines.join("\n")
}
