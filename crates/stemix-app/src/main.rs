//! # Stemix
//!
//! Multitrack stem player for the terminal. Loads the stems of a song from
//! disk or from a separation job and mixes them live.

mod cli;
mod commands;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, JobAction};
use commands::{describe, execute};
use settings::Settings;
use stemix_audio::{AudioContext, CpalContext, FileSource, LoadOutcome, MultitrackEngine};
use stemix_client::{ApiClient, HttpStemSource};
use stemix_core::{StemSet, StemSource, DEFAULT_ORIGINAL_BPM};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often engine events are drained while waiting for input.
const EVENT_POLL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stemix=debug,stemix_app=debug,stemix_audio=info".into()),
        )
        .init();

    info!("Starting Stemix v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.no_loop {
        settings.engine.loop_playback = false;
    }

    match cli.command {
        Command::Devices => {
            for device in stemix_audio::output::list_output_devices()? {
                println!("{device}");
            }
            Ok(())
        }
        Command::Library {
            limit,
            offset,
            ref api,
        } => {
            settings.apply_api_args(api);
            let client = ApiClient::with_config(settings.api.clone())?;
            for job in client.library(limit, offset).await? {
                println!(
                    "{}  {:<10}  {}",
                    job.job_id,
                    format!("{:?}", job.status).to_lowercase(),
                    job.filename.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Upload {
            ref file,
            mode,
            ref api,
        } => {
            settings.apply_api_args(api);
            let client = ApiClient::with_config(settings.api.clone())?;
            let job = client.upload_file(file, mode.into()).await?;
            println!("job {} {:?}", job.job_id, job.status);
            play_job(&cli, &settings, client, &job.job_id).await
        }
        Command::Manage {
            ref job_id,
            action,
            ref api,
        } => {
            settings.apply_api_args(api);
            let client = ApiClient::with_config(settings.api.clone())?;
            match action {
                JobAction::Pause => client.pause_job(job_id).await?,
                JobAction::Resume => client.resume_job(job_id).await?,
                JobAction::Delete => client.delete_job(job_id).await?,
            }
            println!("{job_id}: {action:?}");
            Ok(())
        }
        Command::Export {
            ref job_id,
            ref output,
            ref api,
        } => {
            settings.apply_api_args(api);
            let client = ApiClient::with_config(settings.api.clone())?;
            let archive = client.export_stems(job_id).await?;
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("stems-{job_id}.zip")));
            tokio::fs::write(&path, &archive)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("wrote {} ({} bytes)", path.display(), archive.len());
            Ok(())
        }
        Command::Local { ref stems, ref root } => {
            let source = root
                .as_ref()
                .map_or_else(FileSource::new, FileSource::with_root);
            let set: StemSet = stems.iter().cloned().collect();
            let original_bpm = cli.original_bpm.or(settings.original_bpm);
            play(&cli, &settings, Arc::new(source), set, original_bpm).await
        }
        Command::Job { ref job_id, ref api } => {
            settings.apply_api_args(api);
            let client = ApiClient::with_config(settings.api.clone())?;
            play_job(&cli, &settings, client, job_id).await
        }
    }
}

/// Wait for a separation job and play its stems.
async fn play_job(cli: &Cli, settings: &Settings, client: ApiClient, job_id: &str) -> Result<()> {
    println!("waiting for job {job_id}...");
    let result = client.wait_for_result(job_id).await?;
    if let Some(title) = &result.metadata.title {
        println!("{title}");
    }
    let original_bpm = cli
        .original_bpm
        .or(result.metadata.bpm)
        .or(settings.original_bpm);
    play(
        cli,
        settings,
        Arc::new(HttpStemSource::new(client)),
        result.stems,
        original_bpm,
    )
    .await
}

/// Load `stems` and run the interactive session until the user quits.
async fn play(
    cli: &Cli,
    settings: &Settings,
    source: Arc<dyn StemSource>,
    stems: StemSet,
    original_bpm: Option<f64>,
) -> Result<()> {
    let context: Arc<dyn AudioContext> =
        Arc::new(CpalContext::new().context("Failed to open audio output")?);
    let engine = MultitrackEngine::new(
        context,
        source,
        original_bpm.unwrap_or(DEFAULT_ORIGINAL_BPM),
        settings.engine.clone(),
    )?;
    if let Some(bpm) = cli.bpm {
        engine.set_bpm(bpm)?;
    }

    match engine.load(stems).wait().await {
        LoadOutcome::Loaded => {}
        LoadOutcome::Failed(message) => anyhow::bail!("Failed to load stems: {message}"),
        LoadOutcome::Superseded => anyhow::bail!("Load was cancelled"),
    }
    // Drop the events of the initial load, the status line covers them
    while engine.try_recv_event().is_some() {}

    println!("{}", commands::status(&engine.snapshot(), engine.position()));
    println!("type 'help' for commands");
    engine.play()?;

    let result = session(&engine).await;
    engine.dispose();
    result
}

async fn session(engine: &MultitrackEngine) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(EVENT_POLL);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse() {
                    Ok(command) => match execute(engine, command) {
                        Ok(true) => {}
                        Ok(false) => return Ok(()),
                        Err(e) => error!("{e:#}"),
                    },
                    Err(e) => warn!("{e}"),
                }
            }
            _ = ticker.tick() => {
                while let Some(event) = engine.try_recv_event() {
                    if let Some(text) = describe(&event) {
                        println!("{text}");
                    }
                }
            }
        }
    }
}
