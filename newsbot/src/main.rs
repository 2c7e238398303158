/*
newsbot - single-binary main.rs
Starts the daily scheduler and the HTTP command surface inside the same process.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use common::{Config, Settings};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use newsbot::commands::CommandDispatcher;
use newsbot::llm::remote::RemoteCompletionClient;
use newsbot::pipeline::{NewsPipeline, Outcome};
use newsbot::scheduler::Scheduler;
use newsbot::server::{launch_rocket, AppState};
use newsbot::sink::discord::DiscordSink;
use newsbot::sink::NotificationSink;

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "Daily gaming news bot with AI fact-checking")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append-only log file; empty string disables it
    #[arg(long, default_value = "newsbot.log")]
    log_file: String,

    /// Run the scheduler only (do not bind the HTTP command surface)
    #[arg(long)]
    no_server: bool,

    /// Run the pipeline once and exit (exit code 0 only if the report was delivered)
    #[arg(long)]
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let args = Args::parse();

    init_logging(&args.log_level, &args.log_file)?;
    if dotenv_loaded {
        info!(".env file loaded");
    }

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");
    let override_path = match args.config {
        Some(p) if !p.exists() => {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p) => Some(p),
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(error = %format!("{:#}", e), "failed to load configuration");
        e
    })?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let settings = match Settings::from_env(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        hour = settings.schedule.hour,
        minute = settings.schedule.minute,
        model = %settings.completion.model,
        "daily post time configured (UTC)"
    );

    let client = Arc::new(RemoteCompletionClient::from_settings(&settings.completion)?);
    let sink: Arc<dyn NotificationSink> = Arc::new(DiscordSink::from_settings(&settings.discord)?);
    let pipeline = Arc::new(NewsPipeline::new(
        client,
        sink.clone(),
        settings.completion.model.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(settings.schedule.hour, settings.schedule.minute)?);

    // Nothing is scheduled before the platform session is confirmed.
    sink.wait_until_ready().await.context("Failed to start bot")?;

    if args.run_once {
        let outcome = pipeline.run().await;
        info!(?outcome, "single run finished");
        return Ok(if outcome == Outcome::Delivered {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let shutdown = Arc::new(Notify::new());
    let worker = scheduler.start(pipeline.clone(), shutdown.clone()).await;
    if worker.is_some() {
        info!("Daily gaming news task started");
    }

    if args.no_server {
        info!("HTTP command surface disabled via CLI (--no-server)");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        info!("ctrl-c received");
    } else {
        let state = AppState {
            started_at: Utc::now(),
            dispatcher: Arc::new(CommandDispatcher::new(pipeline, scheduler.clone(), sink)),
            command_token: settings.server.command_token.clone(),
        };
        if let Err(e) = launch_rocket(state, &settings.server).await {
            error!(%e, "Rocket server failed");
        }
    }

    info!("notifying scheduler to shutdown");
    shutdown.notify_one();
    if let Some(handle) = worker {
        match tokio::time::timeout(Duration::from_secs(20), handle).await {
            Ok(Ok(())) => info!("scheduler exited cleanly"),
            Ok(Err(join_err)) => error!(%join_err, "scheduler task panicked"),
            Err(_) => info!("Timed out waiting for scheduler to exit; continuing shutdown"),
        }
    }

    info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// stdout plus an optional append-only plain-text log file.
fn init_logging(level: &str, log_file: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = if log_file.is_empty() {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file: {}", log_file))?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
