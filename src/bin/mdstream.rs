//! CLI binary for mdstream.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, renders live transfer progress, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdstream::{
    format_duration, ClientConfig, DocumentPayload, StatusSnapshot, TransferEngine, TransferMode,
    TransferObserver, TransferStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Convert a PDF to Markdown through a remote conversion service.
#[derive(Parser, Debug)]
#[command(name = "mdstream", version, about, long_about = None)]
struct Cli {
    /// Input PDF file (or markdown file with --markdown).
    #[arg(required_unless_present = "check")]
    input: Option<PathBuf>,

    /// Write output to this file instead of stdout (atomic write).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use the single-response batch endpoint instead of streaming.
    #[arg(long)]
    batch: bool,

    /// Skip LLM cleaning on the remote side (implies --batch).
    #[arg(long)]
    no_clean: bool,

    /// Treat the input as existing markdown to clean, not a PDF.
    #[arg(long)]
    markdown: bool,

    /// Base URL of the conversion service.
    #[arg(long, env = "MDSTREAM_BASE_URL", default_value = mdstream::DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds (batch requests and stream connection).
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Suppress the progress spinner.
    #[arg(short, long)]
    quiet: bool,

    /// Only probe the service health and exit.
    #[arg(long)]
    check: bool,
}

// ── Terminal progress observer ───────────────────────────────────────────────

/// Renders transfer progress as a live spinner line.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferObserver for SpinnerObserver {
    fn on_status(&self, snapshot: &StatusSnapshot) {
        self.bar.set_prefix(snapshot.status.to_string());
        let msg = if snapshot.detail.is_empty() {
            snapshot.message.clone()
        } else {
            format!("{}  {}", snapshot.message, dim(&snapshot.detail))
        };
        self.bar.set_message(msg);
    }

    fn on_content(&self, _delta: &str, buffer: &str) {
        self.bar
            .set_message(format!("{} chars received", buffer.chars().count()));
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = ClientConfig::builder()
        .base_url(&cli.base_url)
        .request_timeout_secs(cli.timeout);

    let spinner = if cli.quiet { None } else { Some(SpinnerObserver::new()) };
    if let Some(ref s) = spinner {
        builder = builder.observer(Arc::clone(s) as mdstream::ObserverHandle);
    }
    let config = builder.build()?;
    let engine = TransferEngine::with_http(config)?;

    // Pre-flight probe: a dead backend should fail before we read the input.
    let probe = engine.probe_health().await;
    if cli.check {
        if let Some(s) = spinner {
            s.finish();
        }
        return match probe {
            Ok(report) => {
                println!("{} service healthy (api: {})", green("✔"), report.api);
                Ok(())
            }
            Err(e) => {
                eprintln!("{} {e}", red("✘"));
                std::process::exit(2);
            }
        };
    }
    if probe.is_err() {
        if let Some(s) = spinner {
            s.finish();
        }
        eprintln!(
            "{} conversion service is not reachable at {}",
            red("✘"),
            cli.base_url
        );
        std::process::exit(2);
    }

    // input is present unless --check (enforced by clap)
    let input = match cli.input {
        Some(p) => p,
        None => std::process::exit(2),
    };
    let payload = if cli.markdown {
        let content = tokio::fs::read_to_string(&input)
            .await
            .with_context(|| format!("failed to read {}", input.display()))?;
        DocumentPayload::markdown(content)
    } else {
        DocumentPayload::from_pdf_file(&input).await?
    };

    let mode = if cli.batch || cli.no_clean {
        TransferMode::Batch
    } else {
        TransferMode::Streaming
    };

    let outcome = engine.transfer(payload, mode, !cli.no_clean).await?;
    if let Some(s) = spinner {
        s.finish();
    }

    match outcome.status {
        TransferStatus::Succeeded => {
            write_output(&outcome.markdown, cli.output.as_deref()).await?;
            let latency = outcome
                .first_chunk_latency
                .map(|d| format!(", first chunk after {}", format_duration(d)))
                .unwrap_or_default();
            eprintln!(
                "{} {} chars in {}{}",
                green("✔"),
                bold(&outcome.char_count.to_string()),
                format_duration(outcome.elapsed),
                dim(&latency)
            );
            Ok(())
        }
        status => {
            // Partial output is still worth keeping on failure.
            if !outcome.markdown.is_empty() {
                write_output(&outcome.markdown, cli.output.as_deref()).await?;
            }
            let detail = outcome.error.unwrap_or_else(|| status.to_string());
            eprintln!("{} transfer {status}: {detail}", red("✘"));
            std::process::exit(1);
        }
    }
}

/// Print to stdout, or write atomically (temp file + rename) to `path`.
async fn write_output(markdown: &str, path: Option<&std::path::Path>) -> Result<()> {
    match path {
        None => {
            println!("{markdown}");
            Ok(())
        }
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
            let tmp = path.with_extension("md.tmp");
            tokio::fs::write(&tmp, markdown)
                .await
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .with_context(|| format!("failed to rename into {}", path.display()))?;
            eprintln!("{} wrote {}", green("✔"), path.display());
            Ok(())
        }
    }
}
