//! sse-cli - tail a Server-Sent Events stream from the command line
//!
//! Connects with a reconnecting `EventSource` and prints every event until
//! Ctrl+C (or until `--count` events have been printed).

mod config;
mod output;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sse_client::{Event, EventHandler, EventSource, EventSourceOptions};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{ArgOverrides, Config};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "sse-cli")]
#[command(author, version, about = "Tail a Server-Sent Events stream")]
struct Cli {
    /// Event stream URL
    #[arg(env = "SSE_URL")]
    url: Option<String>,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Only print events of this type (repeatable)
    #[arg(short, long = "event")]
    events: Vec<String>,

    /// Last-Event-ID to resume from
    #[arg(long)]
    last_event_id: Option<String>,

    /// Delay after a failed connection in milliseconds
    #[arg(long)]
    reconnect_delay: Option<u64>,

    /// Use the server's retry hint as the reconnect delay
    #[arg(long)]
    honor_retry: bool,

    /// Client options file (YAML)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "SSE_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Exit after printing this many events
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let output_arg: Option<&str> = cli.output.map(Into::into);
    let merged = config.merge_with_args(ArgOverrides {
        url: cli.url.as_deref(),
        headers: &cli.headers,
        output: output_arg,
        no_color: cli.no_color,
        reconnect_delay_ms: cli.reconnect_delay,
        honor_retry: cli.honor_retry,
    })?;

    let format: OutputFormat = merged
        .output
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid output format '{}': {}", merged.output, e))?;
    let ctx = Arc::new(OutputContext::new(format, merged.no_color, cli.quiet));

    let mut options = match &cli.options {
        Some(path) => EventSourceOptions::from_yaml_file(path)
            .with_context(|| format!("Failed to load options: {}", path.display()))?,
        None => EventSourceOptions::default(),
    };
    options.headers.extend(merged.headers);
    if let Some(id) = cli.last_event_id {
        options.last_event_id = Some(id);
    }
    if let Some(delay) = merged.reconnect_delay_ms {
        options.reconnect.delay_ms = delay;
    }
    options.reconnect.honor_server_retry |= merged.honor_retry;
    debug!(?options, "Resolved client options");

    ctx.info(&format!("Connecting to {}...", merged.url));
    ctx.info("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    let printed = Arc::new(AtomicUsize::new(0));

    ctx.header();
    let source = EventSource::create_with(&merged.url, options, |source| {
        register_handlers(source, &cli.events, &ctx, &printed);
    })
    .with_context(|| format!("Failed to open event stream: {}", merged.url))?;

    // Set up Ctrl+C handler
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        if cli
            .count
            .is_some_and(|limit| printed.load(Ordering::SeqCst) >= limit)
        {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    ctx.info("Closing event stream...");
    source.close();
    ctx.success(&format!(
        "Closed after {} event(s); last event id: {:?}",
        printed.load(Ordering::SeqCst),
        source.last_event_id()
    ));

    Ok(())
}

/// Print all events, or only the requested types
fn register_handlers(
    source: &EventSource,
    types: &[String],
    ctx: &Arc<OutputContext>,
    printed: &Arc<AtomicUsize>,
) {
    let printer: EventHandler = {
        let ctx = ctx.clone();
        let printed = printed.clone();
        Arc::new(move |event: &Event| {
            ctx.print_event(event);
            printed.fetch_add(1, Ordering::SeqCst);
        })
    };

    if types.is_empty() {
        source.set_event_callback(move |event| printer(event));
        return;
    }

    for event_type in types {
        source.add_event_handler(event_type, printer.clone());
    }

    // Connection state still goes to stderr when filtering
    let ctx = ctx.clone();
    source.set_event_callback(move |event| {
        if event.is_open() {
            ctx.info("Connected");
        } else if event.is_error() {
            let status = if event.data.is_empty() {
                "no response".to_string()
            } else {
                format!("HTTP {}", event.data)
            };
            ctx.warn(&format!("Connection error ({}), reconnecting...", status));
        }
    });
}

/// Parse a `NAME:VALUE` header argument
fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

// Implement conversion for OutputFormat to string (for config merge)
impl From<OutputFormat> for &str {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}
