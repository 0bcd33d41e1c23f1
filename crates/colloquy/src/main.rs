//! Chat with an OpenAI-style API from the terminal.
//!
//! Reads the API key from `<NAME>_API_KEY` (default `OPENAI_API_KEY`) unless
//! the config file sets one. Conversations are kept per thread under
//! `~/.colloquy/history`.
//!
//! # Examples
//!
//! ```sh
//! # One question, streamed
//! colloquy "What is a monad?"
//!
//! # Pick a model and thread, attach an image
//! colloquy --model gpt-4o --thread review --image ./diagram.png "Explain this"
//!
//! # Pipe a document in as context, then ask about it
//! cat notes.md | colloquy "Summarize the notes above"
//!
//! # Interactive session on a fresh thread
//! colloquy --interactive
//!
//! # Media endpoints
//! colloquy --model tts-1 --speak out.mp3 "Hello there"
//! colloquy --model whisper-1 --transcribe meeting.wav
//!
//! # Fetch external context into the thread
//! colloquy --mcp apify~rag-web-browser --param '{"query": "rust 2024 edition"}'
//! ```

use colloquy::api::{Attachment, HttpTransport, RetryConfig};
use colloquy::enrichment::{APIFY_PROVIDER, EnrichmentRequest};
use colloquy::events::LoggingHandler;
use colloquy::history::{FileHistoryStore, HistoryManager, HistoryStore};
use colloquy::{Client, ClientConfig, logging};
use clap::Parser;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process;

const APIFY_KEY_VAR: &str = "APIFY_API_KEY";
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "q"];

type AppClient = Client<HttpTransport, FileHistoryStore>;

/// Chat with an OpenAI-style API from the terminal.
#[derive(Parser)]
#[command(name = "colloquy", version)]
struct Cli {
    /// Prompt to send
    input: Vec<String>,

    // ── Configuration ──────────────────────────────────────────
    /// JSON config file; CLI flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// History thread to use
    #[arg(long)]
    thread: Option<String>,

    /// Directory holding the thread files
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Context window size in tokens
    #[arg(long)]
    context_window: Option<usize>,

    /// Persona written into the first turn
    #[arg(long)]
    role: Option<String>,

    /// Neither read nor write history
    #[arg(long)]
    omit_history: bool,

    /// Retries for transient failures on non-streaming calls
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Log requests as cURL commands and responses to stderr
    #[arg(long)]
    debug: bool,

    // ── Chat ───────────────────────────────────────────────────
    /// Image URL or file to attach to the prompt
    #[arg(long, conflicts_with = "audio")]
    image: Option<String>,

    /// Audio file to attach to the prompt
    #[arg(long)]
    audio: Option<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Read prompts from stdin until `exit`
    #[arg(long, short)]
    interactive: bool,

    // ── History ────────────────────────────────────────────────
    /// Print the thread as markdown and exit
    #[arg(long)]
    history: bool,

    /// List the thread's user prompts and exit
    #[arg(long)]
    prompts: bool,

    /// List available chat models and exit
    #[arg(long)]
    list_models: bool,

    // ── Media ──────────────────────────────────────────────────
    /// Synthesize the prompt to this audio file
    #[arg(long, value_name = "OUTPUT")]
    speak: Option<String>,

    /// Generate an image from the prompt into this file
    #[arg(long, value_name = "OUTPUT")]
    draw: Option<String>,

    /// Edit the image given with --image according to the prompt, into this file
    #[arg(long, value_name = "OUTPUT", requires = "image")]
    edit: Option<String>,

    /// Transcribe this audio file
    #[arg(long, value_name = "AUDIO")]
    transcribe: Option<String>,

    // ── Enrichment ─────────────────────────────────────────────
    /// Apify actor to run, e.g. `apify~rag-web-browser`
    #[arg(long, value_name = "FUNCTION")]
    mcp: Option<String>,

    /// JSON object of actor parameters (with --mcp)
    #[arg(long, requires = "mcp")]
    param: Option<String>,
}

// ── Setup ──────────────────────────────────────────────────────────

fn load_config(cli: &Cli) -> Result<ClientConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read config '{}': {e}", path.display()))?;
            ClientConfig::from_json(&json)
                .map_err(|e| format!("failed to parse config '{}': {e}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }
    if let Some(thread) = &cli.thread {
        config = config.with_thread(thread);
    }
    if let Some(window) = cli.context_window {
        config = config.with_context_window(window);
    }
    if let Some(role) = &cli.role {
        config = config.with_role(role);
    }
    if cli.omit_history {
        config = config.with_omit_history(true);
    }
    if config.api_key.is_empty() {
        config.api_key = std::env::var(config.api_key_env_var()).unwrap_or_default();
    }
    if config.apify_api_key.is_empty() {
        config.apify_api_key = std::env::var(APIFY_KEY_VAR).unwrap_or_default();
    }
    Ok(config)
}

fn history_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.history_dir {
        return dir.clone();
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".colloquy")
        .join("history")
}

fn build_client(cli: &Cli, config: ClientConfig) -> Result<AppClient, String> {
    let transport = HttpTransport::new(&config)
        .map_err(|e| e.to_string())?
        .with_retry(RetryConfig::with_retries(cli.retries));
    let store = FileHistoryStore::new(history_dir(cli)).map_err(|e| e.to_string())?;
    let env_var = config.api_key_env_var();

    let client = Client::new(transport, store, config, cli.interactive);
    if cli.debug {
        Ok(client.with_event_handler(LoggingHandler::new(env_var)))
    } else {
        Ok(client)
    }
}

fn attachment(cli: &Cli) -> Option<Attachment> {
    if let Some(image) = &cli.image {
        return Some(Attachment::Image(image.clone()));
    }
    cli.audio.clone().map(Attachment::Audio)
}

fn piped_stdin() -> Result<Option<String>, String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(Some(buf).filter(|text| !text.trim().is_empty()))
}

// ── Commands ───────────────────────────────────────────────────────

fn print_history(cli: &Cli, config: &ClientConfig) -> Result<(), String> {
    let store = FileHistoryStore::new(history_dir(cli)).map_err(|e| e.to_string())?;
    let manager = HistoryManager::new(store);
    if cli.prompts {
        let prompts = manager
            .parse_user_history(&config.thread)
            .map_err(|e| e.to_string())?;
        for prompt in prompts {
            println!("{prompt}");
        }
    } else {
        print!("{}", manager.print(&config.thread).map_err(|e| e.to_string())?);
    }
    Ok(())
}

async fn chat(
    client: &mut AppClient,
    input: &str,
    attachment: Option<&Attachment>,
    prefer_stream: bool,
) -> Result<(), String> {
    if prefer_stream && client.capabilities().supports_streaming {
        client
            .stream(input, attachment, &mut io::stdout())
            .await
            .map_err(|e| e.to_string())?;
    } else {
        let (answer, tokens) = client.query(input, attachment).await.map_err(|e| e.to_string())?;
        println!("{answer}");
        tracing::debug!("reply used {tokens} tokens");
    }
    Ok(())
}

async fn interactive(client: &mut AppClient, prefer_stream: bool) -> Result<(), String> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    eprintln!("thread {}, type `exit` to quit", client.store().thread());

    loop {
        print!("> ");
        stdout.flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        let line = line.trim();
        if read == 0 || EXIT_COMMANDS.contains(&line) {
            return Ok(());
        }
        if line.is_empty() {
            continue;
        }
        if let Err(e) = chat(client, line, None, prefer_stream).await {
            eprintln!("Error: {e}");
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = load_config(&cli)?;

    if cli.history || cli.prompts {
        return print_history(&cli, &config);
    }

    let prompt = cli.input.join(" ");
    let mut client = build_client(&cli, config)?;

    if cli.list_models {
        for line in client.list_models().await.map_err(|e| e.to_string())? {
            println!("{line}");
        }
        return Ok(());
    }

    if let Some(function) = &cli.mcp {
        let mut request = EnrichmentRequest::new(APIFY_PROVIDER, function);
        if let Some(param) = &cli.param {
            request.params = serde_json::from_str(param)
                .map_err(|e| format!("--param must be a JSON object: {e}"))?;
        }
        client
            .inject_enrichment(&request)
            .await
            .map_err(|e| e.to_string())?;
        eprintln!("added {function} output to thread {}", client.store().thread());
        if prompt.is_empty() {
            return Ok(());
        }
    }

    if let Some(audio) = &cli.transcribe {
        let text = client.transcribe(audio).await.map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }
    if let Some(output) = &cli.speak {
        return client.synthesize_speech(&prompt, output).await.map_err(|e| e.to_string());
    }
    if let Some(output) = &cli.draw {
        return client.generate_image(&prompt, output).await.map_err(|e| e.to_string());
    }
    if let (Some(output), Some(input)) = (&cli.edit, &cli.image) {
        return client
            .edit_image(&prompt, input, output)
            .await
            .map_err(|e| e.to_string());
    }

    if cli.interactive {
        return interactive(&mut client, !cli.no_stream).await;
    }
    if let Some(context) = piped_stdin()? {
        client.provide_context(&context);
    }
    if prompt.is_empty() {
        return Err("provide a prompt, or use --interactive".to_string());
    }
    chat(&mut client, &prompt, attachment(&cli).as_ref(), !cli.no_stream).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
