//! `logtail`: follow one live log in the terminal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use logtail::{
    LineMode, LineSink, LogRegistry, LogSession, LogSource, LogView, ReconnectPolicy,
    SessionStatus, TailConfig, TerminalConfig, TerminalSink,
};

/// Live log tail with stable line numbers
#[derive(Parser, Debug)]
#[command(name = "logtail")]
#[command(about = "Render a log and follow its websocket stream with numbered lines")]
#[command(version)]
struct Args {
    /// Websocket address of the live stream (ws://host:port/<log-id>/).
    /// Without it, only the seed is rendered.
    #[arg(env = "LOGTAIL_ADDRESS")]
    address: Option<String>,

    /// File with the content the log already has
    #[arg(long, env = "LOGTAIL_SEED_FILE")]
    seed_file: Option<PathBuf>,

    /// File re-read and rendered once the stream reports it finished
    #[arg(long, env = "LOGTAIL_CANONICAL_FILE")]
    canonical_file: Option<PathBuf>,

    /// Hold partial lines back until a later chunk completes them
    #[arg(long, env = "LOGTAIL_BUFFERED_LINES")]
    buffered_lines: bool,

    /// Clip rendered lines to this many columns
    #[arg(long, env = "LOGTAIL_MAX_WIDTH")]
    max_width: Option<usize>,

    /// Reconnection attempts after an unexpected disconnect (0 disables)
    #[arg(long, env = "LOGTAIL_RECONNECT_ATTEMPTS", default_value_t = 0)]
    reconnect_attempts: u32,

    /// Delay before the first reconnection attempt, in milliseconds
    #[arg(long, env = "LOGTAIL_RECONNECT_INITIAL_MS", default_value_t = 500)]
    reconnect_initial_ms: u64,

    /// Upper bound for reconnection delays, in milliseconds
    #[arg(long, env = "LOGTAIL_RECONNECT_MAX_MS", default_value_t = 30_000)]
    reconnect_max_ms: u64,

    /// Log filter (overrides RUST_LOG)
    #[arg(long, env = "LOGTAIL_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn tail_config(&self) -> TailConfig {
        TailConfig {
            line_mode: if self.buffered_lines {
                LineMode::Buffered
            } else {
                LineMode::PerChunk
            },
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect_attempts,
                initial_delay: Duration::from_millis(self.reconnect_initial_ms),
                max_delay: Duration::from_millis(self.reconnect_max_ms),
                ..ReconnectPolicy::default()
            },
            ..TailConfig::default()
        }
    }

    fn terminal_config(&self) -> TerminalConfig {
        TerminalConfig {
            max_width: self.max_width,
            ..TerminalConfig::default()
        }
    }
}

fn setup_logging(level: Option<&str>) {
    let filter = level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// The log id: last non-empty path segment of the address.
fn log_id(address: Option<&str>) -> String {
    address
        .and_then(|a| Url::parse(a).ok())
        .and_then(|url| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| "log".to_string())
}

/// Render the canonical transcript of `id` below a separator.
fn render_canonical(path: &Path, id: &str, config: TerminalConfig) -> Result<u64> {
    let transcript = fs::read_to_string(path)
        .with_context(|| format!("failed to read canonical transcript {}", path.display()))?;
    let mut sink = TerminalSink::with_config(io::stdout(), config);
    sink.append_raw(&format!("── {id}: finished ──\n"));
    let mut view = LogView::new(id, sink);
    view.seed(&transcript);
    Ok(view.rendered_line_count())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.log_level.as_deref());

    let seed = match &args.seed_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?,
        None => String::new(),
    };

    let id = log_id(args.address.as_deref());
    let source = match &args.address {
        Some(address) => LogSource::streaming(id.clone(), address.clone()).with_seed(seed),
        None => LogSource::fixed(id.clone(), seed),
    };

    let terminal = args.terminal_config();
    let sink_config = terminal.clone();
    let canonical = args.canonical_file.clone();
    let resync = move |log_id: &str| match &canonical {
        Some(path) => match render_canonical(path, log_id, terminal.clone()) {
            Ok(lines) => info!(log = log_id, lines, "canonical transcript rendered"),
            Err(e) => error!(log = log_id, error = %e, "resynchronization failed"),
        },
        None => info!(log = log_id, "log finished"),
    };

    let mut registry = LogRegistry::new(
        args.tail_config(),
        move |_: &LogSource| TerminalSink::with_config(io::stdout(), sink_config.clone()),
        resync,
    );
    registry.discover(source)?;
    registry.run();

    let status = registry.get(&id).map(LogSession::status);
    registry.teardown();
    if status == Some(SessionStatus::Disconnected) {
        warn!(log = %id, "stream ended before the log finished");
        bail!("stream for `{id}` disconnected");
    }
    Ok(())
}
