//! Tracing subscriber setup for the console.

use std::path::Path;

use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taxon_core::defaults::LOG_FILTER;

/// Where log lines go.
struct Sink {
    writer: BoxMakeWriter,
    ansi: bool,
    guard: Option<WorkerGuard>,
}

/// Daily-rolling file sink for `LOG_FILE`; ANSI off unless forced.
fn file_sink(path: &str, ansi: Option<bool>) -> Sink {
    let path = Path::new(path);
    let dir = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("taxon.log");
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
    Sink {
        writer: BoxMakeWriter::new(writer),
        ansi: ansi.unwrap_or(false),
        guard: Some(guard),
    }
}

/// Stderr keeps stdout free for reports and JSON output.
fn stderr_sink(ansi: Option<bool>) -> Sink {
    Sink {
        writer: BoxMakeWriter::new(std::io::stderr),
        ansi: ansi.unwrap_or(true),
        guard: None,
    }
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - log file path; enables daily rolling files instead of stderr
///   LOG_ANSI    - "true"/"1" forces colors, anything else disables them
///   RUST_LOG    - env filter (default: [`LOG_FILTER`])
///
/// Hold the returned guard until exit so buffered file output is flushed.
pub fn init() -> Option<WorkerGuard> {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let log_file = std::env::var("LOG_FILE").ok().filter(|p| !p.trim().is_empty());
    let ansi = std::env::var("LOG_ANSI").ok().map(|v| v == "true" || v == "1");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(LOG_FILTER));
    let sink = match log_file.as_deref() {
        Some(path) => file_sink(path, ansi),
        None => stderr_sink(ansi),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(sink.writer))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(sink.writer)
                    .with_ansi(sink.ansi),
            )
            .init();
    }

    debug!(
        subsystem = "cli",
        json,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    sink.guard
}
