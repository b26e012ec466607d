use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;
use crate::protocol::openai_chat::Usage;

/// Initialize the tracing subscriber with the configured log level and format.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str, log_format: LogFormat) {
    let Some(filter) = env_filter(log_level) else {
        return;
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}

fn env_filter(log_level: &str) -> Option<EnvFilter> {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return None;
    }

    let tracing_level = match level.as_str() {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };

    Some(EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO")))
}

/// Log a finished non-streaming completion.
pub fn log_request_complete(model: &str, usage: &Usage, start_time: Instant) {
    info!(
        model,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "completion finished"
    );
}

/// Log a streamed completion that reached end-of-stream.
pub fn log_stream_complete(model: &str, frames: u64, malformed: u64, start_time: Instant) {
    info!(
        model,
        frames,
        malformed,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "stream finished"
    );
}
