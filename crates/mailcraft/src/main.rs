//! `mailcraft` - compose MIME messages from JSON drafts
//!
//! Reads a draft, renders it with `mailcraft-mime`, and writes the message
//! bytes for a mail transport to pick up.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod draft;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailcraft_mime::{AttachmentOutcome, ComposerConfig, RenderedMessage};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use draft::Draft;

/// Compose a MIME message from a JSON draft.
#[derive(Debug, Parser)]
#[command(name = "mailcraft", version, about)]
struct Cli {
    /// Draft JSON file; reads stdin when omitted or `-`.
    draft: Option<PathBuf>,

    /// Composer settings file.
    #[arg(short, long, env = "MAILCRAFT_CONFIG")]
    config: Option<PathBuf>,

    /// Write the message here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the envelope recipients, one per line, instead of the message.
    #[arg(long)]
    recipients: bool,

    /// Fail when any attachment had to be left out.
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    // Initialize logging; stdout carries the message
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailcraft=info,mailcraft_mime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = run(&cli)?;

    match &cli.output {
        Some(path) => std::fs::write(path, &output)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout()
            .lock()
            .write_all(&output)
            .context("writing to stdout")?,
    }

    Ok(())
}

/// Composes the draft named on the command line and returns the bytes to
/// emit.
fn run(cli: &Cli) -> Result<Vec<u8>> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ComposerConfig::default_path);
    let config = ComposerConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let draft = Draft::load(cli.draft.as_deref())?;
    let rendered = draft
        .into_composer(&config, config.capabilities())
        .finalize();

    report(&rendered, cli.strict)?;

    if cli.recipients {
        let mut listing = rendered.recipients().join("\n");
        listing.push('\n');
        return Ok(listing.into_bytes());
    }

    Ok(rendered.into_bytes())
}

/// Logs the outcome and enforces `--strict`.
fn report(rendered: &RenderedMessage, strict: bool) -> Result<()> {
    let omitted: Vec<&str> = rendered
        .omitted()
        .filter_map(|outcome| match outcome {
            AttachmentOutcome::Omitted { name, .. } => Some(name.as_str()),
            AttachmentOutcome::Included { .. } => None,
        })
        .collect();

    info!(
        message_id = rendered.message_id(),
        size = rendered.as_bytes().len(),
        recipients = rendered.recipients().len(),
        omitted = omitted.len(),
        "Composed message"
    );

    if strict && !omitted.is_empty() {
        bail!("attachments left out: {}", omitted.join(", "));
    }

    Ok(())
}
