//! # mass
//!
//! Connects to a server, starts listening, and logs every event until the
//! connection ends or ctrl-c is pressed.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mass_client::{EventCallback, EventFilter, MassClient};
use mass_core::MassEvent;
use mass_core::logging::{LogFormat, init_subscriber};
use mass_settings::loader::{load_settings_from_path, settings_path};

/// Command-line client for a mass server.
#[derive(Parser, Debug)]
#[command(name = "mass", about = "Connect to a mass server and log its events")]
struct Cli {
    /// Server URL, e.g. `http://localhost:8095` (overrides settings).
    url: Option<String>,

    /// Log level, e.g. `debug` (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: `compact` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Settings file (defaults to `~/.mass/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let path = args.settings.unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(url) = args.url {
        settings.server_url = url;
    }
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    if let Some(format) = args.log_format {
        settings.log_format = format;
    }

    init_subscriber(&settings.log_level, settings.log_format);

    let client = Arc::new(MassClient::new(&settings).context("Invalid server URL")?);
    let _ = client.subscribe(
        EventCallback::sync(|event: &MassEvent| {
            tracing::info!(
                event = %event.event,
                object_id = event.object_id.as_deref().unwrap_or("-"),
                "event received"
            );
        }),
        EventFilter::all(),
    );

    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.start_listening().await })
    };

    tokio::select! {
        joined = listener => {
            joined
                .context("Listener task failed")?
                .context("Connection to server failed")?;
            tracing::info!("Server closed the connection");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down...");
            client.disconnect().await;
        }
    }

    tracing::info!(phase = %client.phase(), "Shutdown complete");
    Ok(())
}
