//! Interactive transport commands typed on stdin.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use stemix_audio::{EngineEvent, EngineSnapshot, MultitrackEngine};
use stemix_core::format_time;

pub const HELP: &str = "\
commands:
  play | pause | stop | toggle      transport
  seek <seconds>                    jump to a position
  bpm <tempo>                       change tempo, pitch is kept
  vol <stem> <db>                   channel volume
  mute <stem> | solo <stem>         toggle mute or solo
  pan <stem> <-1..1>                channel balance
  reload                            load the current stems again
  status                            show transport and mixer
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Toggle,
    Seek(f64),
    Bpm(f64),
    Volume { stem: String, db: f32 },
    Mute(String),
    Solo(String),
    Pan { stem: String, pan: f32 },
    Reload,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };
        let mut arg = |what: &str| {
            words
                .next()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{verb} needs {what}"))
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "toggle" | "t" => Self::Toggle,
            "seek" => Self::Seek(number(&arg("a position")?)?),
            "bpm" => Self::Bpm(number(&arg("a tempo")?)?),
            "vol" | "volume" => {
                let stem = arg("a stem")?;
                Self::Volume {
                    stem,
                    db: number(&arg("a level in dB")?)?,
                }
            }
            "mute" => Self::Mute(arg("a stem")?),
            "solo" => Self::Solo(arg("a stem")?),
            "pan" => {
                let stem = arg("a stem")?;
                Self::Pan {
                    stem,
                    pan: number(&arg("a balance")?)?,
                }
            }
            "reload" => Self::Reload,
            "status" | "s" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(command)
    }
}

fn number<T: FromStr>(word: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    word.parse().with_context(|| format!("'{word}' is not a number"))
}

/// Run a command against the engine. Returns `false` when the session should end.
pub fn execute(engine: &MultitrackEngine, command: Command) -> Result<bool> {
    match command {
        Command::Play => engine.play()?,
        Command::Pause => engine.pause(),
        Command::Stop => engine.stop(),
        Command::Toggle => engine.toggle_playback()?,
        Command::Seek(position) => engine.seek(position),
        Command::Bpm(bpm) => engine.set_bpm(bpm)?,
        Command::Volume { stem, db } => engine.set_channel_volume(&stem, db),
        Command::Mute(stem) => engine.toggle_mute(&stem),
        Command::Solo(stem) => engine.toggle_solo(&stem),
        Command::Pan { stem, pan } => engine.set_channel_pan(&stem, pan),
        Command::Reload => {
            engine.reload()?;
        }
        Command::Status => println!("{}", status(&engine.snapshot(), engine.position())),
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Multi-line summary of the transport and every channel.
pub fn status(snapshot: &EngineSnapshot, position: f64) -> String {
    let mut out = String::new();
    let load = if snapshot.is_loading {
        "loading".to_string()
    } else if let Some(error) = &snapshot.load_error {
        format!("failed: {error}")
    } else if snapshot.is_loaded {
        "loaded".to_string()
    } else {
        "empty".to_string()
    };

    let _ = writeln!(
        out,
        "{:?} {} / {}  {:.1} bpm (x{:.3})  [{load}]",
        snapshot.transport,
        format_time(position),
        format_time(snapshot.duration),
        snapshot.bpm,
        snapshot.playback_rate,
    );
    for channel in &snapshot.channels {
        let _ = writeln!(
            out,
            "  {:<10} {:>6.1} dB  pan {:>5.2}{}{}",
            channel.name,
            channel.volume_db,
            channel.pan,
            if channel.muted { "  M" } else { "" },
            if channel.soloed { "  S" } else { "" },
        );
    }
    out.trim_end().to_string()
}

/// One line for events worth telling the user about.
pub fn describe(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::StateChanged(state) => Some(format!("{state:?}")),
        EngineEvent::DurationUpdate(duration) => Some(format!("duration {}", format_time(*duration))),
        EngineEvent::Loading => Some("loading stems...".to_string()),
        EngineEvent::Loaded => Some("stems loaded".to_string()),
        EngineEvent::LoadFailed(error) => Some(format!("load failed: {error}")),
        EngineEvent::PlaybackFinished => Some("end of song".to_string()),
        EngineEvent::TempoChanged { bpm, rate } => Some(format!("{bpm:.1} bpm (x{rate:.3})")),
        EngineEvent::PositionUpdate(_) | EngineEvent::ChannelChanged(_) => None,
    }
}
