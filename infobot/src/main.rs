//! infobot: factoid bot for IRC channels.
//!
//! Usage:
//!   infobot -c /usr/local/etc/infobot.toml [-l /var/log/infobot]
//!
//! Connects to the configured server, identifies to services, joins the
//! configured channels and answers !info / !learn / !forget. Reconnects
//! with backoff when the server connection drops. SIGINT/SIGTERM quit
//! cleanly.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use infobot_sdk::client::ReconnectConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use infobot::app::App;
use infobot::config::{Args, FileConfig};
use infobot::store::FactoidStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_dir.as_deref())?;

    tracing::info!(path = %args.config.display(), "Parsing configuration file");
    let config = FileConfig::load(&args.config)?.resolve(&args)?;

    let store = FactoidStore::open(&config.database)
        .context("Couldn't connect to factoid database")?;
    tracing::info!(factoids = store.count()?, "Factoid database ready");

    let app = App {
        store: Arc::new(store),
        connect: config.connect,
        session: config.session,
        reconnect: ReconnectConfig::default(),
    };
    app.run(Box::pin(shutdown_signal())).await
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    // Use JSON logs with INFOBOT_LOG_JSON=1, human-readable otherwise
    let json = std::env::var("INFOBOT_LOG_JSON").unwrap_or_default() == "1";

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Couldn't create log directory {}", dir.display()))?;
            let path = dir.join("infobot.log");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Couldn't create logger at {}", path.display()))?;
            install_subscriber(std::io::stdout.and(Mutex::new(file)), json, false);
        }
        None => install_subscriber(std::io::stdout, json, true),
    }
    Ok(())
}

fn install_subscriber<W>(writer: W, json: bool, ansi: bool)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "infobot=info,infobot_sdk=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
