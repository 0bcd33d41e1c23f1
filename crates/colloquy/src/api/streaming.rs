//! Server-Sent Events decoding for streamed replies.
//!
//! Two wire grammars are in use, and the caller picks one with a
//! [`Dialect`] based on which endpoint it called:
//!
//! - **Legacy** (chat completions): `data: <chunk>` lines whose
//!   `choices[0].delta.content` carries text, terminated by `data: [DONE]`.
//! - **Event-tagged** (responses): `event: <name>` / `data: <json>` pairs.
//!   `response.output_text.delta` carries text in `delta`;
//!   `response.completed` terminates.
//!
//! Either way the [`StreamDecoder`] produces exactly one output string: the
//! accumulated text plus a newline, or a single `Error: <message>` line if
//! any meaningful payload fails to parse. Nothing is emitted before the
//! stream terminates.

use serde::Deserialize;
use std::io::{BufRead, Write};
use tracing::{debug, trace};

const DONE_SENTINEL: &str = "[DONE]";
const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";
const RESPONSE_COMPLETED: &str = "response.completed";

/// Which stream grammar to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Legacy,
    EventTagged,
}

impl Dialect {
    /// Dialect spoken by the endpoint a model is routed to.
    pub fn for_alternate_api(uses_alternate_api: bool) -> Self {
        if uses_alternate_api {
            Dialect::EventTagged
        } else {
            Dialect::Legacy
        }
    }

    fn grammar(self) -> Box<dyn Grammar> {
        match self {
            Dialect::Legacy => Box::new(LegacyGrammar),
            Dialect::EventTagged => Box::new(EventTaggedGrammar::default()),
        }
    }
}

/// What a grammar made of one line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineAction {
    /// Nothing to record.
    Skip,
    /// Append text to the reply.
    Append(String),
    /// The stream is complete.
    Finish,
}

/// One stream grammar. Receives lines with the trailing newline removed.
pub trait Grammar: Send {
    /// Interpret one line. `Err` carries the parser message and aborts the
    /// stream.
    fn feed(&mut self, line: &str) -> Result<LineAction, String>;
}

fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

// ── Legacy grammar ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct LegacyChunk {
    #[serde(default)]
    choices: Option<Vec<LegacyChoice>>,
}

#[derive(Deserialize)]
struct LegacyChoice {
    #[serde(default)]
    delta: Option<LegacyDelta>,
}

#[derive(Deserialize)]
struct LegacyDelta {
    #[serde(default)]
    content: Option<String>,
}

/// `data: <chunk>` lines terminated by `data: [DONE]`.
#[derive(Debug, Default)]
pub struct LegacyGrammar;

impl Grammar for LegacyGrammar {
    fn feed(&mut self, line: &str) -> Result<LineAction, String> {
        let Some(data) = data_payload(line) else {
            return Ok(LineAction::Skip);
        };
        if data == DONE_SENTINEL {
            return Ok(LineAction::Finish);
        }

        let chunk: LegacyChunk = serde_json::from_str(data).map_err(|e| e.to_string())?;
        let content = chunk
            .choices
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content);

        Ok(match content {
            Some(text) => LineAction::Append(text),
            None => LineAction::Skip,
        })
    }
}

// ── Event-tagged grammar ───────────────────────────────────────────

#[derive(Deserialize)]
struct TextDelta {
    #[serde(default)]
    delta: Option<String>,
}

/// `event: <name>` / `data: <json>` pairs.
#[derive(Debug, Default)]
pub struct EventTaggedGrammar {
    event: Option<String>,
}

impl Grammar for EventTaggedGrammar {
    fn feed(&mut self, line: &str) -> Result<LineAction, String> {
        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
            return Ok(LineAction::Skip);
        }
        let Some(data) = data_payload(line) else {
            return Ok(LineAction::Skip);
        };

        match self.event.take().as_deref() {
            Some(OUTPUT_TEXT_DELTA) => {
                let delta: TextDelta = serde_json::from_str(data).map_err(|e| e.to_string())?;
                Ok(delta.delta.map_or(LineAction::Skip, LineAction::Append))
            }
            Some(RESPONSE_COMPLETED) => {
                serde_json::from_str::<serde_json::Value>(data).map_err(|e| e.to_string())?;
                Ok(LineAction::Finish)
            }
            _ => Ok(LineAction::Skip),
        }
    }
}

// ── Decoder ────────────────────────────────────────────────────────

/// Accumulates one streamed reply.
///
/// Feed raw chunks with [`feed_bytes`](Self::feed_bytes) or whole lines with
/// [`feed_line`](Self::feed_line), then call [`finish`](Self::finish) for the
/// single terminal output. Input after termination is ignored.
pub struct StreamDecoder {
    grammar: Box<dyn Grammar>,
    text: String,
    pending: Vec<u8>,
    output: Option<String>,
}

impl StreamDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_grammar(dialect.grammar())
    }

    pub fn with_grammar(grammar: Box<dyn Grammar>) -> Self {
        Self {
            grammar,
            text: String::new(),
            pending: Vec::new(),
            output: None,
        }
    }

    /// Whether the stream has terminated (completed or failed).
    pub fn is_done(&self) -> bool {
        self.output.is_some()
    }

    /// Feed a raw chunk of the response body. Lines may span chunks.
    pub fn feed_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        while !self.is_done() {
            let Some(newline_pos) = self.pending.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            self.feed_line(&String::from_utf8_lossy(&line));
        }
    }

    /// Feed one line, with or without its line terminator.
    pub fn feed_line(&mut self, line: &str) {
        if self.is_done() {
            return;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with(':') {
            return;
        }

        trace!(line, "stream line");
        match self.grammar.feed(line) {
            Ok(LineAction::Skip) => {}
            Ok(LineAction::Append(delta)) => self.text.push_str(&delta),
            Ok(LineAction::Finish) => self.complete(),
            Err(message) => {
                debug!(%message, "stream payload failed to parse");
                self.text.clear();
                self.output = Some(format!("Error: {message}\n"));
            }
        }
    }

    /// Terminate the stream and return the output. A stream that ends
    /// without its terminator is flushed as if it had one.
    pub fn finish(mut self) -> String {
        if !self.is_done() && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.feed_line(&String::from_utf8_lossy(&rest));
        }
        if !self.is_done() {
            self.complete();
        }
        self.output.unwrap_or_default()
    }

    fn complete(&mut self) {
        let mut out = std::mem::take(&mut self.text);
        out.push('\n');
        self.output = Some(out);
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("text_len", &self.text.len())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Decode a whole stream from `reader` and write the result to `writer`
/// in one call.
pub fn decode<R: BufRead, W: Write>(reader: R, mut writer: W, dialect: Dialect) -> std::io::Result<()> {
    let mut decoder = StreamDecoder::new(dialect);
    for line in reader.lines() {
        decoder.feed_line(&line?);
        if decoder.is_done() {
            break;
        }
    }
    writer.write_all(decoder.finish().as_bytes())?;
    writer.flush()
}

/// Decode an in-memory stream.
pub fn decode_str(input: &str, dialect: Dialect) -> String {
    let mut decoder = StreamDecoder::new(dialect);
    decoder.feed_bytes(input.as_bytes());
    decoder.finish()
}
