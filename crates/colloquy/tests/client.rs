//! End-to-end tests of the client against an in-process transport.
//!
//! The fake transport records every call and answers from a queue, so each
//! test can inspect the exact body that would have gone on the wire.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use colloquy::api::{Attachment, Dialect, FileReader, Headers, Transport, TransportFuture};
use colloquy::events::{ClientEvent, FnEventHandler};
use colloquy::history::{HistoryStore, MemoryHistoryStore};
use colloquy::{
    Client, ClientConfig, ClientError, Clock, Message, Role, TransportError, Turn,
};
use colloquy::enrichment::EnrichmentRequest;
use serde_json::{Value, json};

const BASE: &str = "http://fake";

// ── Fakes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Call {
    method: &'static str,
    url: String,
    body: Vec<u8>,
    dialect: Option<Dialect>,
    headers: Option<Headers>,
}

impl Call {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Default)]
struct FakeTransport {
    replies: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    fn replying(replies: Vec<Result<Vec<u8>, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        })
    }

    fn ok(body: impl Into<Vec<u8>>) -> Arc<Self> {
        Self::replying(vec![Ok(body.into())])
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: Call) -> TransportFuture<'_> {
        self.calls.lock().unwrap().push(call);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no reply queued".into())));
        Box::pin(async move { reply })
    }
}

impl Transport for FakeTransport {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        self.answer(Call {
            method: "GET",
            url: url.to_string(),
            body: Vec::new(),
            dialect: None,
            headers: None,
        })
    }

    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>, stream: Option<Dialect>) -> TransportFuture<'a> {
        self.answer(Call {
            method: "POST",
            url: url.to_string(),
            body,
            dialect: stream,
            headers: None,
        })
    }

    fn post_with_headers<'a>(&'a self, url: &'a str, body: Vec<u8>, headers: Headers) -> TransportFuture<'a> {
        self.answer(Call {
            method: "POST",
            url: url.to_string(),
            body,
            dialect: None,
            headers: Some(headers),
        })
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        noon()
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
struct FakeFiles(HashMap<PathBuf, Vec<u8>>);

impl FakeFiles {
    fn with(mut self, path: &str, data: &[u8]) -> Self {
        self.0.insert(PathBuf::from(path), data.to_vec());
        self
    }
}

impl FileReader for FakeFiles {
    fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }
}

type Recorded = Arc<Mutex<Vec<String>>>;

fn recorder() -> (Recorded, FnEventHandler<impl Fn(&ClientEvent<'_>) + Send + Sync>) {
    let seen: Recorded = Arc::default();
    let sink = seen.clone();
    let handler = FnEventHandler::new(move |event: &ClientEvent<'_>| {
        let line = match event {
            ClientEvent::Request { method, endpoint, .. } => format!("request {method} {endpoint}"),
            ClientEvent::Response { endpoint, .. } => format!("response {endpoint}"),
            ClientEvent::Truncated(report) => format!("truncated {}", report.evicted),
            ClientEvent::HistoryWriteFailed { .. } => "write failed".to_string(),
            ClientEvent::BinaryWritten { label, bytes, .. } => format!("wrote {label} {bytes}"),
        };
        sink.lock().unwrap().push(line);
    });
    (seen, handler)
}

fn client_with(
    transport: Arc<FakeTransport>,
    store: MemoryHistoryStore,
    config: ClientConfig,
) -> Client<Arc<FakeTransport>, MemoryHistoryStore> {
    Client::new(transport, store, config.with_url(BASE), false).with_clock(FixedClock)
}

fn classic_reply(text: &str, tokens: u32) -> Vec<u8> {
    json!({
        "choices": [{"message": {"role": "assistant", "content": text}}],
        "usage": {"total_tokens": tokens}
    })
    .to_string()
    .into_bytes()
}

fn responses_reply(text: &str, tokens: u32) -> Vec<u8> {
    json!({
        "output": [
            {"type": "reasoning", "content": []},
            {"type": "message", "content": [{"type": "output_text", "text": text}]}
        ],
        "usage": {"total_tokens": tokens}
    })
    .to_string()
    .into_bytes()
}

// ── Query ────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_uses_classic_endpoint_and_persists() {
    let transport = FakeTransport::ok(classic_reply("pong", 11));
    let store = MemoryHistoryStore::new();
    let mut client = client_with(transport.clone(), store.clone(), ClientConfig::default());

    let (answer, tokens) = client.query("ping", None).await.unwrap();
    assert_eq!(answer, "pong");
    assert_eq!(tokens, 11);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "http://fake/v1/chat/completions");
    assert_eq!(calls[0].dialect, None);

    let body = calls[0].json();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["stream"], false);
    assert_eq!(body["temperature"], 1.0);
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "You are a helpful assistant."},
            {"role": "user", "content": "ping"}
        ])
    );

    let stored = store.snapshot("default");
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[2].text(), Some("pong"));
    assert_eq!(stored[2].timestamp, Some(noon()));
}

#[tokio::test]
async fn alternate_models_use_responses_envelope() {
    let transport = FakeTransport::ok(responses_reply("deep thought", 42));
    let config = ClientConfig::default().with_model("gpt-5").with_effort("high");
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    let (answer, tokens) = client.query("meaning?", None).await.unwrap();
    assert_eq!((answer.as_str(), tokens), ("deep thought", 42));

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.url, "http://fake/v1/responses");
    let body = call.json();
    assert_eq!(body["reasoning"], json!({"effort": "high"}));
    assert_eq!(body["max_output_tokens"], 4096);
    assert_eq!(body["input"][1]["content"], "meaning?");
    assert!(body.get("messages").is_none());
}

#[tokio::test]
async fn o1_models_skip_the_anchor() {
    let transport = FakeTransport::ok(classic_reply("ok", 1));
    let config = ClientConfig::default().with_model("o1-mini");
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    client.query("hi", None).await.unwrap();

    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages, json!([{"role": "user", "content": "hi"}]));
    assert_eq!(client.history()[0].role(), Role::System);
}

#[tokio::test]
async fn search_models_omit_sampling_fields() {
    let transport = FakeTransport::ok(classic_reply("ok", 1));
    let config = ClientConfig::default().with_model("gpt-4o-search-preview");
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    client.query("news", None).await.unwrap();

    let body = transport.calls()[0].json();
    assert!(body.get("temperature").is_none());
    assert!(body.get("top_p").is_none());
}

#[tokio::test]
async fn persisted_thread_is_resumed_with_current_persona() {
    let store = MemoryHistoryStore::new().with_thread(
        "default",
        vec![
            Turn::untimed(Message::system("an old persona")),
            Turn::untimed(Message::user("earlier")),
            Turn::untimed(Message::assistant("before")),
        ],
    );
    let transport = FakeTransport::ok(classic_reply("again", 3));
    let config = ClientConfig::default().with_role("Be brief.");
    let mut client = client_with(transport.clone(), store.clone(), config);

    client.query("next", None).await.unwrap();

    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 4);
    assert_eq!(messages[0]["content"], "Be brief.");
    assert_eq!(messages[1]["content"], "earlier");
    assert_eq!(store.snapshot("default").len(), 5);
}

#[tokio::test]
async fn omit_history_neither_reads_nor_writes() {
    let store = MemoryHistoryStore::new()
        .with_thread("default", vec![Turn::untimed(Message::user("secret"))]);
    let transport = FakeTransport::ok(classic_reply("ok", 1));
    let config = ClientConfig::default().with_omit_history(true);
    let mut client = client_with(transport.clone(), store.clone(), config);

    client.query("fresh", None).await.unwrap();

    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(store.snapshot("default").len(), 1);
}

#[tokio::test]
async fn persistence_failure_after_query_is_reported_not_returned() {
    let store = MemoryHistoryStore::new();
    store.fail_writes(true);
    let (seen, handler) = recorder();
    let transport = FakeTransport::ok(classic_reply("fine", 2));
    let mut client =
        client_with(transport, store, ClientConfig::default()).with_event_handler(handler);

    let (answer, _) = client.query("hi", None).await.unwrap();
    assert_eq!(answer, "fine");
    assert!(seen.lock().unwrap().contains(&"write failed".to_string()));
}

#[tokio::test]
async fn transport_errors_propagate_unchanged() {
    let transport = FakeTransport::replying(vec![Err(TransportError::Http {
        status: 503,
        body: "overloaded".into(),
    })]);
    let mut client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let err = client.query("hi", None).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Http { status: 503, .. })
    ));
}

#[tokio::test]
async fn semantic_errors_carry_token_usage() {
    let raw = json!({"choices": [], "usage": {"total_tokens": 7}}).to_string();
    let transport = FakeTransport::ok(raw);
    let mut client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let err = client.query("hi", None).await.unwrap_err();
    assert!(matches!(err, ClientError::NoResponses { total_tokens: 7 }));
    assert_eq!(err.total_tokens(), Some(7));
}

#[tokio::test]
async fn empty_reply_is_an_empty_response() {
    let transport = FakeTransport::ok(Vec::<u8>::new());
    let mut client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let err = client.query("hi", None).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse));
}

#[tokio::test]
async fn oversized_history_is_truncated_after_append() {
    let long = vec!["word"; 40].join(" ");
    let store = MemoryHistoryStore::new().with_thread(
        "default",
        vec![
            Turn::untimed(Message::system("x")),
            Turn::untimed(Message::user(long.clone())),
            Turn::untimed(Message::assistant(long)),
        ],
    );
    let (seen, handler) = recorder();
    let transport = FakeTransport::ok(classic_reply("ok", 1));
    let config = ClientConfig::default().with_context_window(250);
    let mut client =
        client_with(transport.clone(), store, config).with_event_handler(handler);

    client.query("next", None).await.unwrap();

    assert!(seen.lock().unwrap().contains(&"truncated 1".to_string()));
    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[2]["content"], "next");
}

// ── Attachments ──────────────────────────────────────────────────────

#[tokio::test]
async fn image_attachment_is_sent_but_not_stored() {
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
    let transport = FakeTransport::ok(classic_reply("a cat", 5));
    let store = MemoryHistoryStore::new();
    let mut client = client_with(transport.clone(), store.clone(), ClientConfig::default())
        .with_file_reader(FakeFiles::default().with("cat.png", &png));

    let attachment = Attachment::Image("cat.png".into());
    client.query("what is this?", Some(&attachment)).await.unwrap();

    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 3);
    let url = messages[2]["content"][0]["image_url"]["url"].as_str().unwrap();
    assert_eq!(url, format!("data:image/png;base64,{}", STANDARD.encode(png)));

    let stored = store.snapshot("default");
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|turn| turn.text().is_some()));
}

#[tokio::test]
async fn remote_image_url_is_passed_through() {
    let transport = FakeTransport::ok(classic_reply("a dog", 5));
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default());

    let attachment = Attachment::Image("https://example.com/dog.jpg".into());
    client.query("and this?", Some(&attachment)).await.unwrap();

    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(
        messages[2]["content"][0],
        json!({"type": "image_url", "image_url": {"url": "https://example.com/dog.jpg"}})
    );
}

#[tokio::test]
async fn audio_attachment_carries_sniffed_format() {
    let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ";
    let transport = FakeTransport::ok(classic_reply("a beep", 5));
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default())
        .with_file_reader(FakeFiles::default().with("beep.wav", wav));

    let attachment = Attachment::Audio("beep.wav".into());
    client.query("hear this", Some(&attachment)).await.unwrap();

    let part = transport.calls()[0].json()["messages"][2]["content"][0].clone();
    assert_eq!(part["type"], "input_audio");
    assert_eq!(part["input_audio"]["format"], "wav");
    assert_eq!(part["input_audio"]["data"], STANDARD.encode(wav));
}

#[tokio::test]
async fn unreadable_attachment_fails_before_sending() {
    let transport = FakeTransport::ok(classic_reply("unused", 1));
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default())
        .with_file_reader(FakeFiles::default());

    let attachment = Attachment::Image("missing.png".into());
    let err = client.query("hi", Some(&attachment)).await.unwrap_err();
    assert!(matches!(err, ClientError::Attachment(_)));
    assert!(transport.calls().is_empty());
}

// ── Streaming ────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_writes_once_and_records_reply() {
    let transport = FakeTransport::ok("a b c\n");
    let store = MemoryHistoryStore::new();
    let mut client = client_with(transport.clone(), store.clone(), ClientConfig::default());

    let mut out = Vec::new();
    let text = client.stream("abc?", None, &mut out).await.unwrap();

    assert_eq!(out, b"a b c\n");
    assert_eq!(text, "a b c");

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.dialect, Some(Dialect::Legacy));
    assert_eq!(call.json()["stream"], true);
    assert_eq!(store.snapshot("default")[2].text(), Some("a b c"));
}

#[tokio::test]
async fn stream_picks_event_tagged_dialect_for_alternate_models() {
    let transport = FakeTransport::ok("done\n");
    let config = ClientConfig::default().with_model("gpt-5-mini");
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    client.stream("go", None, &mut Vec::new()).await.unwrap();

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.url, "http://fake/v1/responses");
    assert_eq!(call.dialect, Some(Dialect::EventTagged));
}

#[tokio::test]
async fn stream_error_line_is_recorded_verbatim() {
    let transport = FakeTransport::ok("Error: expected value at line 1 column 1\n");
    let mut client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let text = client.stream("hi", None, &mut Vec::new()).await.unwrap();
    assert!(text.starts_with("Error: "));
    assert_eq!(client.history().last().unwrap().text(), Some(text.as_str()));
}

// ── Context and models ───────────────────────────────────────────────

#[tokio::test]
async fn provided_context_precedes_the_question() {
    let transport = FakeTransport::ok(classic_reply("summary", 9));
    let store = MemoryHistoryStore::new();
    let mut client = client_with(transport.clone(), store.clone(), ClientConfig::default());

    client.provide_context("first   second\nthird");
    assert!(store.snapshot("default").is_empty());

    client.query("summarize", None).await.unwrap();
    let messages = transport.calls()[0].json()["messages"].clone();
    assert_eq!(messages[1]["content"], "first second third");
    assert_eq!(messages[2]["content"], "summarize");
}

#[tokio::test]
async fn list_models_filters_sorts_and_marks_current() {
    let raw = json!({"data": [
        {"id": "whisper-1"},
        {"id": "o1-mini"},
        {"id": "gpt-4o-mini"},
        {"id": "dall-e-3"},
        {"id": "gpt-4o"}
    ]})
    .to_string();
    let transport = FakeTransport::ok(raw);
    let client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default());

    let models = client.list_models().await.unwrap();
    assert_eq!(models, vec!["* gpt-4o (current)", "- gpt-4o-mini", "- o1-mini"]);

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.method, "GET");
    assert_eq!(call.url, "http://fake/v1/models");
}

#[tokio::test]
async fn list_models_rejects_empty_payload() {
    let transport = FakeTransport::ok(Vec::<u8>::new());
    let client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    assert!(matches!(
        client.list_models().await.unwrap_err(),
        ClientError::EmptyResponse
    ));
}

// ── Enrichment ───────────────────────────────────────────────────────

fn apify_config() -> ClientConfig {
    ClientConfig::default().with_apify_api_key("apify-key")
}

#[tokio::test]
async fn enrichment_is_recorded_as_function_turn() {
    let transport = FakeTransport::ok(r#"[{"page_title": "Rust", "url": "https://rust-lang.org"}]"#);
    let store = MemoryHistoryStore::new();
    let mut client = client_with(transport.clone(), store.clone(), apify_config());

    let request = EnrichmentRequest::new("Apify", "apify~rag-web-browser").with_param("query", "rust");
    client.inject_enrichment(&request).await.unwrap();

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(
        call.url,
        "https://api.apify.com/v2/acts/apify~rag-web-browser/run-sync-get-dataset-items"
    );
    let headers = call.headers.as_ref().unwrap();
    assert_eq!(headers["Authorization"], "Bearer apify-key");
    assert_eq!(call.json()["proxyConfiguration"], json!({"useApifyProxy": true}));

    let stored = store.snapshot("default");
    let turn = stored.last().unwrap();
    assert_eq!(turn.role(), Role::Function);
    assert_eq!(turn.message.name.as_deref(), Some("apify-rag-web-browser"));
    assert_eq!(
        turn.text(),
        Some("[MCP: apify~rag-web-browser]\nPage Title: Rust\nUrl: https://rust-lang.org")
    );
}

#[tokio::test]
async fn enrichment_requires_history() {
    let transport = FakeTransport::ok("[]");
    let config = apify_config().with_omit_history(true);
    let mut client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    let err = client
        .inject_enrichment(&EnrichmentRequest::new("apify", "f"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::HistoryDisabled));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn enrichment_write_failure_is_returned() {
    let store = MemoryHistoryStore::new();
    store.fail_writes(true);
    let transport = FakeTransport::ok(r#"{"a": 1}"#);
    let mut client = client_with(transport, store, apify_config());

    let err = client
        .inject_enrichment(&EnrichmentRequest::new("apify", "f"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::History(_)));
}

#[tokio::test]
async fn enrichment_without_key_is_rejected() {
    let transport = FakeTransport::ok("[]");
    let mut client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let err = client
        .inject_enrichment(&EnrichmentRequest::new("apify", "f"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingApiKey(_)));
}

// ── Media ────────────────────────────────────────────────────────────

#[tokio::test]
async fn transcription_is_uploaded_and_recorded() {
    let transport = FakeTransport::ok(r#"{"text": "hello world"}"#);
    let store = MemoryHistoryStore::new();
    let config = ClientConfig::default().with_model("whisper-1").with_api_key("sk-test");
    let mut client = client_with(transport.clone(), store.clone(), config)
        .with_file_reader(FakeFiles::default().with("/tmp/clip.wav", b"RIFFdata"));

    let text = client.transcribe("/tmp/clip.wav").await.unwrap();
    assert_eq!(text, "hello world");

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.url, "http://fake/v1/audio/transcriptions");
    let headers = call.headers.as_ref().unwrap();
    assert!(headers["Content-Type"].starts_with("multipart/form-data; boundary="));
    assert_eq!(headers["Authorization"], "Bearer sk-test");
    let body = String::from_utf8_lossy(&call.body);
    assert!(body.contains("name=\"file\"; filename=\"clip.wav\""));
    assert!(body.contains("whisper-1"));

    let stored = store.snapshot("default");
    assert_eq!(stored[1].text(), Some("[transcribe] clip.wav"));
    assert_eq!(stored[2].text(), Some("hello world"));
}

#[tokio::test]
async fn generated_image_is_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let raw = json!({"data": [{"b64_json": STANDARD.encode(b"PNGDATA")}]}).to_string();
    let (seen, handler) = recorder();
    let transport = FakeTransport::ok(raw);
    let config = ClientConfig::default().with_model("dall-e-3");
    let client =
        client_with(transport.clone(), MemoryHistoryStore::new(), config).with_event_handler(handler);

    client
        .generate_image("a lighthouse", output.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"PNGDATA");
    assert_eq!(
        transport.calls()[0].json(),
        json!({"model": "dall-e-3", "prompt": "a lighthouse"})
    );
    assert!(seen.lock().unwrap().contains(&"wrote image 7".to_string()));
}

#[tokio::test]
async fn missing_image_data_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let transport = FakeTransport::ok(r#"{"data": []}"#);
    let client = client_with(transport, MemoryHistoryStore::new(), ClientConfig::default());

    let err = client
        .generate_image("nothing", output.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no image data returned");
    assert!(!output.exists());
}

#[tokio::test]
async fn edit_image_rejects_non_images() {
    let transport = FakeTransport::ok("{}");
    let client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default())
        .with_file_reader(FakeFiles::default().with("notes.txt", b"just some text"));

    let err = client
        .edit_image("make it blue", "notes.txt", "out.png")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unsupported MIME type: text/plain; charset=utf-8");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn edit_image_uploads_form() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("edited.png");
    let gif = b"GIF89a\x01\x00\x01\x00";
    let raw = json!({"data": [{"b64_json": STANDARD.encode(b"EDITED")}]}).to_string();
    let transport = FakeTransport::ok(raw);
    let client = client_with(transport.clone(), MemoryHistoryStore::new(), ClientConfig::default())
        .with_file_reader(FakeFiles::default().with("in.gif", gif));

    client
        .edit_image("add a hat", "in.gif", output.to_str().unwrap())
        .await
        .unwrap();

    let calls = transport.calls();
    let call = &calls[0];
    assert_eq!(call.url, "http://fake/v1/images/edits");
    let body = String::from_utf8_lossy(&call.body);
    assert!(body.contains("filename=\"in.gif\"\r\nContent-Type: image/gif"));
    assert!(body.contains("add a hat"));
    assert_eq!(std::fs::read(&output).unwrap(), b"EDITED");
}

#[tokio::test]
async fn speech_format_follows_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("hello.mp3");
    let transport = FakeTransport::ok(b"ID3audio".to_vec());
    let config = ClientConfig::default().with_model("tts-1");
    let client = client_with(transport.clone(), MemoryHistoryStore::new(), config);

    client
        .synthesize_speech("hello", output.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(
        transport.calls()[0].json(),
        json!({"model": "tts-1", "voice": "nova", "input": "hello", "response_format": "mp3"})
    );
    assert_eq!(std::fs::read(&output).unwrap(), b"ID3audio");
}

// ── Threads ──────────────────────────────────────────────────────────

#[tokio::test]
async fn configured_thread_receives_the_exchange() {
    let transport = FakeTransport::ok(classic_reply("ok", 1));
    let store = MemoryHistoryStore::new();
    let config = ClientConfig::default().with_thread("project-x");
    let mut client = client_with(transport, store.clone(), config);

    client.query("hi", None).await.unwrap();

    assert_eq!(client.store().thread(), "project-x");
    assert_eq!(store.snapshot("project-x").len(), 3);
    assert!(store.snapshot("default").is_empty());
}
