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
mod document;
mod midi;
mod pin;
mod player;
mod timing;

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A JSON MIDI player."
)]
struct Cli {
    /// Prints per-message detail and the playback statistics summary.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    MidiDevices {},
    /// Plays the given composition files as one concatenated schedule.
    Play {
        /// The paths of the JSON compositions to play.
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Default logging is off except for this crate, so library noise stays out
    // of the playback output.
    let default_filter = if cli.verbose {
        "off,jmplay=debug"
    } else {
        "off,jmplay=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play { files } => {
            if files.is_empty() {
                return Err("No composition files given.".into());
            }

            let mut documents = Vec::new();
            for path in &files {
                let json = fs::read_to_string(path)
                    .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
                documents.extend(document::parse(&json).map_err(|e| {
                    format!("unable to parse {}: {}", path.display(), e)
                })?);
            }

            let stats = player::play_list(&documents, midi::output_transport()?)?;
            if cli.verbose {
                println!("{}", stats);
            }
        }
    }

    Ok(())
}
