//! The client: one conversation thread over a transport and a history store.
//!
//! Every chat call follows the same cycle: initialize the window (from the
//! store unless history is disabled), append the user turn and truncate,
//! assemble a body for the model's capabilities, send it, decode the
//! reply, append the assistant turn and persist.
//!
//! Persistence after assistant turns is best effort: a failed write is
//! reported to the event handler and otherwise ignored. The one exception
//! is [`Client::inject_enrichment`], whose write error is returned.

use crate::api::attachment::{
    Attachment, FileReader, StdFileReader, attachment_message, detect_mime,
};
use crate::api::capabilities::{ModelCapabilities, capabilities_for};
use crate::api::multipart::MultipartForm;
use crate::api::request::{assemble, encode_body};
use crate::api::response::{self, decode_envelope};
use crate::api::streaming::Dialect;
use crate::api::transport::{Headers, Transport};
use crate::config::ClientConfig;
use crate::context::{ConversationWindow, ContextUsage};
use crate::enrichment::{self, EnrichmentRequest};
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventHandler, NoopHandler};
use crate::history::{HistoryStore, INTERACTIVE_THREAD_PREFIX, generate_thread_slug};
use crate::{Message, Turn};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

const CONTEXT_CHUNK_WORDS: usize = 100;
const GPT_PREFIX: &str = "gpt";
const O1_PREFIX: &str = "o1";
const TRANSCRIBE_LABEL: &str = "[transcribe]";

/// Source of turn timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: String,
}

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

pub struct Client<T, S> {
    config: ClientConfig,
    transport: T,
    store: S,
    window: ConversationWindow,
    clock: Box<dyn Clock>,
    reader: Box<dyn FileReader>,
    events: Box<dyn EventHandler>,
}

impl<T: Transport, S: HistoryStore> Client<T, S> {
    /// Create a client. In interactive mode with `auto_create_new_thread`
    /// the store is pointed at a fresh `int_` thread, otherwise at
    /// `config.thread`.
    pub fn new(transport: T, mut store: S, config: ClientConfig, interactive: bool) -> Self {
        if interactive && config.auto_create_new_thread {
            store.set_thread(&generate_thread_slug(INTERACTIVE_THREAD_PREFIX));
        } else {
            store.set_thread(&config.thread);
        }
        debug!("using history thread {}", store.thread());

        Self {
            window: ConversationWindow::new(config.context_window),
            config,
            transport,
            store,
            clock: Box::new(SystemClock),
            reader: Box::new(StdFileReader),
            events: Box::new(NoopHandler),
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.config.context_window = window;
        self.window = self.window.with_context_window(window);
        self
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_file_reader(mut self, reader: impl FileReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.events = Box::new(handler);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current turns, anchor first. Empty until the first call.
    pub fn history(&self) -> &[Turn] {
        self.window.turns()
    }

    pub fn usage(&self) -> ContextUsage {
        self.window.usage()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        capabilities_for(&self.config.model)
    }

    // ── Chat ───────────────────────────────────────────────────────

    /// Send `input` and wait for the whole reply. Returns the reply text and
    /// the provider's total token count.
    pub async fn query(
        &mut self,
        input: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(String, u32)> {
        let caps = self.capabilities();
        let (endpoint, body) = self.prepare_chat(input, attachment, &caps, false)?;

        let raw = self.transport.post(&endpoint, body, None).await?;
        self.emit_response(&endpoint, &raw);

        let reply = response::decode(&raw, &caps)?;
        self.append(Message::assistant(reply.text.clone()));
        self.persist_best_effort();

        Ok((reply.text, reply.total_tokens))
    }

    /// Send `input` as a streaming request and write the flattened reply to
    /// `sink` in one write. Returns the reply without its final newline.
    ///
    /// A stream that failed to parse is written (and recorded) as its
    /// `Error: ...` line.
    pub async fn stream<W: Write>(
        &mut self,
        input: &str,
        attachment: Option<&Attachment>,
        sink: &mut W,
    ) -> Result<String> {
        let caps = self.capabilities();
        let (endpoint, body) = self.prepare_chat(input, attachment, &caps, true)?;

        let dialect = Dialect::for_alternate_api(caps.uses_alternate_api);
        let out = self.transport.post(&endpoint, body, Some(dialect)).await?;
        sink.write_all(&out)
            .and_then(|()| sink.flush())
            .map_err(|e| ClientError::io("failed to write stream output", e))?;

        let mut text = String::from_utf8_lossy(&out).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }
        self.append(Message::assistant(text.clone()));
        self.persist_best_effort();

        Ok(text)
    }

    /// Seed the conversation with `context`, split into user turns of at
    /// most 100 words. Neither truncated nor persisted.
    pub fn provide_context(&mut self, context: &str) {
        self.init_history();
        let words: Vec<&str> = context.split_whitespace().collect();
        for chunk in words.chunks(CONTEXT_CHUNK_WORDS) {
            let turn = Turn::new(Message::user(chunk.join(" ")), self.clock.now());
            self.window.push_untruncated(turn);
        }
    }

    /// Chat-capable model ids, sorted, with the configured model marked.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let endpoint = self.config.endpoint(&self.config.models_path);
        self.emit_request("GET", &endpoint, None, None);

        let raw = self.transport.get(&endpoint).await?;
        self.emit_response(&endpoint, &raw);

        let mut models = response::decode_models(&raw)?.data;
        models.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(models
            .into_iter()
            .filter(|m| m.id.starts_with(GPT_PREFIX) || m.id.starts_with(O1_PREFIX))
            .map(|m| {
                if m.id == self.config.model {
                    format!("* {} (current)", m.id)
                } else {
                    format!("- {}", m.id)
                }
            })
            .collect())
    }

    // ── Enrichment ─────────────────────────────────────────────────

    /// Run an enrichment provider and record its result as a function turn.
    /// Requires history; the history write error, if any, is returned.
    pub async fn inject_enrichment(&mut self, request: &EnrichmentRequest) -> Result<()> {
        if self.config.omit_history {
            return Err(ClientError::HistoryDisabled);
        }

        let call = enrichment::prepare(request, &self.config.apify_api_key)?;
        self.emit_request("POST", &call.endpoint, Some(&call.body), Some(&call.headers));

        let raw = self
            .transport
            .post_with_headers(&call.endpoint, call.body.clone(), call.headers.clone())
            .await?;
        self.emit_response(&call.endpoint, &raw);

        let formatted = enrichment::format_response(&raw, &request.function);
        self.init_history();
        self.append(Message::function(
            enrichment::function_turn_name(&request.function),
            formatted,
        ));

        self.store.write(self.window.turns())?;
        Ok(())
    }

    // ── Media ──────────────────────────────────────────────────────

    /// Synthesize `input` to speech. The audio format is the output file's
    /// extension.
    pub async fn synthesize_speech(&self, input: &str, output_path: &str) -> Result<()> {
        let format = Path::new(output_path)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        let request = SpeechRequest {
            model: &self.config.model,
            voice: &self.config.voice,
            input,
            response_format: &format,
        };
        let endpoint = self.config.endpoint(&self.config.speech_path);
        let audio = self.post_json(&endpoint, &request).await?;
        self.write_output("binary", &audio, output_path)
    }

    /// Generate an image from `prompt` and write it to `output_path`.
    pub async fn generate_image(&self, prompt: &str, output_path: &str) -> Result<()> {
        let request = ImageRequest {
            model: &self.config.model,
            prompt,
        };
        let endpoint = self.config.endpoint(&self.config.image_generations_path);
        let raw = self.post_json(&endpoint, &request).await?;
        let image = decode_image(&raw)?;
        self.write_output("image", &image, output_path)
    }

    /// Edit the image at `input_path` according to `prompt`.
    pub async fn edit_image(&self, prompt: &str, input_path: &str, output_path: &str) -> Result<()> {
        let path = Path::new(input_path);
        let header = self
            .reader
            .read_header(path)
            .map_err(|e| ClientError::io(format!("failed to open input image {input_path}"), e))?;
        let mime = detect_mime(&header);
        if !mime.starts_with("image/") {
            return Err(ClientError::Invalid(format!("unsupported MIME type: {mime}")));
        }
        let data = self
            .reader
            .read_file(path)
            .map_err(|e| ClientError::io(format!("failed to read input image {input_path}"), e))?;

        let form = MultipartForm::new()
            .file("image", &file_name(input_path), mime, &data)
            .text("prompt", prompt)
            .text("model", &self.config.model);
        let endpoint = self.config.endpoint(&self.config.image_edits_path);
        let raw = self.post_form(&endpoint, form).await?;

        let image = decode_image(&raw)?;
        self.write_output("image", &image, output_path)
    }

    /// Transcribe an audio file. The exchange is recorded as a user turn
    /// naming the file and an assistant turn with the transcript.
    pub async fn transcribe(&mut self, audio_path: &str) -> Result<String> {
        self.init_history();

        let data = self
            .reader
            .read_file(Path::new(audio_path))
            .map_err(|e| ClientError::io(format!("failed to open audio file {audio_path}"), e))?;
        let name = file_name(audio_path);

        let form = MultipartForm::new()
            .text("model", &self.config.model)
            .file("file", &name, "application/octet-stream", &data);
        let endpoint = self.config.endpoint(&self.config.transcriptions_path);
        let raw = self.post_form(&endpoint, form).await?;
        self.emit_response(&endpoint, &raw);

        let transcription: Transcription = serde_json::from_slice(&raw)?;

        self.append(Message::user(format!("{TRANSCRIBE_LABEL} {name}")));
        self.append(Message::assistant(transcription.text.clone()));
        self.persist_best_effort();

        Ok(transcription.text)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn init_history(&mut self) {
        let now = self.clock.now();
        let omit = self.config.omit_history;
        let store = &self.store;
        self.window.ensure_initialized(
            || {
                if omit {
                    return Vec::new();
                }
                store.read().unwrap_or_else(|e| {
                    warn!("failed to read history, starting fresh: {e}");
                    Vec::new()
                })
            },
            &self.config.role,
            now,
        );
    }

    fn append(&mut self, message: Message) {
        let turn = Turn::new(message, self.clock.now());
        if let Some(report) = self.window.append(turn) {
            self.events.on_event(&ClientEvent::Truncated(&report));
        }
    }

    fn persist_best_effort(&mut self) {
        if self.config.omit_history {
            return;
        }
        if let Err(error) = self.store.write(self.window.turns()) {
            warn!("failed to write history: {error}");
            self.events.on_event(&ClientEvent::HistoryWriteFailed { error: &error });
        }
    }

    /// Append the user turn and build the chat request.
    fn prepare_chat(
        &mut self,
        input: &str,
        attachment: Option<&Attachment>,
        caps: &ModelCapabilities,
        stream: bool,
    ) -> Result<(String, Vec<u8>)> {
        self.init_history();
        self.append(Message::user(input));

        let extra = attachment
            .map(|a| attachment_message(a, self.reader.as_ref()))
            .transpose()?;
        let body = assemble(self.window.turns(), &self.config, caps, extra, stream).to_bytes()?;

        let path = if caps.uses_alternate_api {
            &self.config.responses_path
        } else {
            &self.config.completions_path
        };
        let endpoint = self.config.endpoint(path);
        self.emit_request("POST", &endpoint, Some(&body), None);
        Ok((endpoint, body))
    }

    async fn post_json<B: Serialize>(&self, endpoint: &str, request: &B) -> Result<Vec<u8>> {
        let body = encode_body(request)?;
        self.emit_request("POST", endpoint, Some(&body), None);
        Ok(self.transport.post(endpoint, body, None).await?)
    }

    async fn post_form(&self, endpoint: &str, form: MultipartForm) -> Result<Vec<u8>> {
        let (content_type, body) = form.finish();
        let shown = Headers::from([("Content-Type".to_string(), content_type.clone())]);
        self.emit_request("POST", endpoint, Some(&body), Some(&shown));

        let headers = Headers::from([
            ("Content-Type".to_string(), content_type),
            (
                self.config.auth_header.clone(),
                format!("{}{}", self.config.auth_token_prefix, self.config.api_key),
            ),
        ]);
        Ok(self.transport.post_with_headers(endpoint, body, headers).await?)
    }

    fn write_output(&self, label: &str, bytes: &[u8], path: &str) -> Result<()> {
        std::fs::write(path, bytes)
            .map_err(|e| ClientError::io(format!("failed to write {label} to {path}"), e))?;
        self.events.on_event(&ClientEvent::BinaryWritten {
            label,
            bytes: bytes.len(),
            path,
        });
        Ok(())
    }

    fn emit_request(&self, method: &str, endpoint: &str, body: Option<&[u8]>, headers: Option<&Headers>) {
        self.events.on_event(&ClientEvent::Request {
            method,
            endpoint,
            body,
            headers,
        });
    }

    fn emit_response(&self, endpoint: &str, raw: &[u8]) {
        self.events.on_event(&ClientEvent::Response { endpoint, raw });
    }
}

fn decode_image(raw: &[u8]) -> Result<Vec<u8>> {
    let response: ImageResponse = decode_envelope(raw)?;
    let first = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::Invalid("no image data returned".to_string()))?;
    STANDARD
        .decode(first.b64_json)
        .map_err(|e| ClientError::Invalid(format!("failed to decode base64 image: {e}")))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
