//! Tracing output for the CLI.
//!
//! [`StderrLayer`] is a minimal `tracing_subscriber` layer that prints each
//! event as one `HH:MM:SS LEVEL message {fields}` line. Stdout stays
//! reserved for replies. [`init`] installs it behind a level filter.

use chrono::Local;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

pub struct StderrLayer {
    sink: Sink,
}

impl Default for StderrLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl StderrLayer {
    pub fn new() -> Self {
        Self::with_sink(Box::new(std::io::stderr()))
    }

    /// Write to `sink` instead of stderr.
    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for StderrLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format_line(
            &Local::now().format("%H:%M:%S").to_string(),
            event.metadata().level(),
            &visitor.message,
            &visitor.fields,
        );
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{line}");
        }
    }
}

fn format_line(
    time: &str,
    level: &tracing::Level,
    message: &str,
    fields: &[(String, String)],
) -> String {
    let mut line = format!("{time} {level:>5} {message}");
    if !fields.is_empty() {
        let extras: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        line.push_str(&format!(" {{{}}}", extras.join(", ")));
    }
    line
}

/// Extracts the message and extra fields from a tracing event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Install the stderr layer globally: `DEBUG` when `debug` is set, `WARN`
/// otherwise.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(StderrLayer::new().with_filter(level))
        .init();
}
