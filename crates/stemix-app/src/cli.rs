//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stemix_client::StemMode;

/// Multitrack stem player.
#[derive(Debug, Parser)]
#[command(name = "stemix", version, about)]
pub struct Cli {
    /// Config file to use instead of the one in the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tempo the stems were recorded at.
    #[arg(long, global = true)]
    pub original_bpm: Option<f64>,

    /// Playback tempo to start with.
    #[arg(long, global = true)]
    pub bpm: Option<f64>,

    /// Stop at the end of the song instead of looping.
    #[arg(long, global = true)]
    pub no_loop: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play stems from local files.
    Local {
        /// A stem as `name=path`, repeatable. Order is mixer order.
        #[arg(long = "stem", value_parser = parse_stem, required = true)]
        stems: Vec<(String, String)>,

        /// Directory relative paths are resolved against.
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Wait for a separation job and play its stems.
    Job {
        job_id: String,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Upload a song for separation, wait for the stems and play them.
    Upload {
        file: PathBuf,

        /// Separation model.
        #[arg(long, value_enum, default_value_t = Mode::SixStems)]
        mode: Mode,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Pause, resume or delete a separation job.
    Manage {
        job_id: String,

        #[arg(value_enum)]
        action: JobAction,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Download the stems of a finished job as a zip archive.
    Export {
        job_id: String,

        /// Where to write the archive. Defaults to `stems-<job id>.zip`.
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// List jobs in the separation library.
    Library {
        #[arg(long, default_value_t = 20)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// List audio output devices.
    Devices,
}

/// Overrides for the API connection settings.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ApiArgs {
    /// API base URL, e.g. `https://stems.example.com/api/v1`.
    #[arg(long)]
    pub api: Option<String>,

    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Vocals, drums, bass, other.
    FourStems,
    /// Adds guitar and piano.
    SixStems,
    /// Vocals and accompaniment.
    TwoStems,
}

impl From<Mode> for StemMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::FourStems => Self::FourStems,
            Mode::SixStems => Self::SixStems,
            Mode::TwoStems => Self::TwoStems,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobAction {
    Pause,
    Resume,
    Delete,
}

fn parse_stem(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), path.to_string()))
        }
        _ => Err(format!("expected name=path, got '{value}'")),
    }
}
