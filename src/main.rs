// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drumtrack::audio::{self, Output};
use drumtrack::config::PlayerConfig;
use drumtrack::drumkit::Drumkit;
use drumtrack::engine::{self, Command, Engine, EngineHandle, PreparedSong, ScriptedEvent};
use drumtrack::mixer::SAMPLE_RATE;
use drumtrack::song::Song;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pedal driven drum accompaniment player."
)]
struct Cli {
    /// The path to the player config. Values can be overridden with
    /// DRUMTRACK_ environment variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the instruments of a drumkit.
    Kit {
        /// The path to the drumkit.
        path: PathBuf,
    },
    /// Validates a song and prints its structure.
    Song {
        /// The path to the song description.
        path: PathBuf,
    },
    /// Renders a song to a WAV file.
    Render {
        /// The path to the song description.
        song: PathBuf,
        /// The path to the drumkit.
        #[arg(short, long)]
        kit: PathBuf,
        /// The WAV file to write.
        #[arg(short, long)]
        out: PathBuf,
        /// A scripted command in the form <SECONDS>:<COMMAND>, e.g. 0:start or
        /// 12.5:release. May be given more than once. Defaults to 0:start.
        #[arg(short, long = "event")]
        events: Vec<String>,
        /// Stop rendering after this many seconds.
        #[arg(long, default_value_t = 600.0)]
        max_seconds: f64,
    },
    /// Plays a song through the audio interface. Pedal commands are read from
    /// stdin, one per line: press, release, long, tap, foot1, foot2, start,
    /// stop, pause, fill, outro, transition [PART], tempo <BPM|song>, status
    /// and quit.
    Play {
        /// The path to the song description.
        song: PathBuf,
        /// The path to the drumkit.
        #[arg(short, long)]
        kit: PathBuf,
        /// The device name to play through. Uses the default device when absent.
        #[arg(short, long)]
        device: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Kit { path } => {
            let kit = Drumkit::decode(std::fs::read(&path)?)?;
            println!("{}", kit.header);
            for (note, instrument) in kit.instruments() {
                println!(
                    "- note {:3}: {} layers, volume {}, choke group {}, polyphony {}{}",
                    note,
                    instrument.layers.len(),
                    instrument.volume,
                    instrument.choke_group,
                    instrument.polyphony,
                    if instrument.non_percussive {
                        ", non percussive"
                    } else {
                        ""
                    }
                );
            }
        }
        Commands::Song { path } => {
            let config = PlayerConfig::load(cli.config.as_deref())?;
            let song = Song::load(&path, config.trigger_fraction())?;
            print!("{}", song);
        }
        Commands::Render {
            song,
            kit,
            out,
            events,
            max_seconds,
        } => {
            let config = PlayerConfig::load(cli.config.as_deref())?;
            let mut engine = prepare_engine(&config, &song, &kit)?;
            let mut events = events
                .iter()
                .map(|event| event.parse::<ScriptedEvent>())
                .collect::<Result<Vec<_>, _>>()?;
            if events.is_empty() {
                events.push(ScriptedEvent {
                    at: 0.0,
                    command: Command::Start,
                });
            }

            let summary = engine::render_to_wav(&mut engine, &out, events, max_seconds)?;
            println!(
                "Wrote {:.1} seconds to {}{}",
                summary.frames as f64 / f64::from(SAMPLE_RATE),
                out.display(),
                if summary.finished {
                    ""
                } else {
                    " (time limit reached)"
                }
            );
        }
        Commands::Play { song, kit, device } => {
            let config = PlayerConfig::load(cli.config.as_deref())?;
            let engine = prepare_engine(&config, &song, &kit)?;
            let handle = engine.handle();
            let _output = Output::start(device.as_deref(), engine, config.buffer_time_ms())?;
            console(&handle)?;
        }
    }

    Ok(())
}

/// Loads the kit and the song into a new engine.
fn prepare_engine(
    config: &PlayerConfig,
    song: &Path,
    kit: &Path,
) -> Result<Engine, Box<dyn Error>> {
    let kit = Drumkit::decode(std::fs::read(kit)?)?;
    let song = Song::load(song, config.trigger_fraction())?;
    let mut engine = Engine::new(config);
    engine.set_kit(kit);
    engine.load_song(PreparedSong::new(song));
    Ok(engine)
}

/// Reads pedal commands from stdin until quit or end of input.
fn console(handle: &EngineHandle) -> Result<(), Box<dyn Error>> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "status" => {
                let status = handle.status();
                println!(
                    "{} part {} fill {} beat {} tempo {}",
                    status.player.state,
                    status.player.part_index + 1,
                    status.player.drum_fill_index + 1,
                    status.beat_in_bar,
                    status.tempo
                );
            }
            command => match command.parse::<Command>() {
                Ok(command) => handle.send(command)?,
                Err(e) => eprintln!("{}", e),
            },
        }
    }
    Ok(())
}
