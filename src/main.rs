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
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sndmix::audio;
use sndmix::config::{self, MixSettings};
use sndmix::sound::{MusicPlayer, SoundBank, VoicePool};

/// How often the control loop sweeps the voice pool.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample mixer for music and sound banks."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists every entry of a sound bank.
    Bank {
        /// The path to the sound bank.
        path: PathBuf,
    },
    /// Plays background music until it ends.
    Music {
        /// The path to the sound config.
        config_path: PathBuf,
        /// The music file (.ogg, .mp3 or .wav).
        file: String,
        /// Loop the track until interrupted.
        #[arg(long = "loop")]
        looping: bool,
        /// The track volume, in percent.
        #[arg(short, long, default_value_t = 100)]
        volume: i32,
    },
    /// Plays one sound bank entry.
    Sound {
        /// The path to the sound config.
        config_path: PathBuf,
        /// The path to the sound bank.
        bank_path: PathBuf,
        /// The entry group.
        group: i32,
        /// The entry item.
        item: i32,
        /// The volume scale, in percent.
        #[arg(short, long, default_value_t = 100)]
        volume: i32,
        /// Absolute pan, in stage units.
        #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
        pan: f32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

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
        Commands::Bank { path } => {
            let bank = SoundBank::load_filtered(&path, |_, _| true, 0)?;
            let (version, sub_version) = bank.version();

            println!(
                "{} (version {}.{}, entries: {}):",
                path.display(),
                version,
                sub_version,
                bank.len()
            );
            for ((group, item), asset) in bank.entries() {
                println!(
                    "- {},{}: {} Hz, {} frames ({:.3}s)",
                    group,
                    item,
                    asset.sample_rate(),
                    asset.len(),
                    asset.duration().as_secs_f64()
                );
            }
        }
        Commands::Music {
            config_path,
            file,
            looping,
            volume,
        } => {
            let sound = config::load(&config_path)?;
            let device = audio::get_device(&sound)?;
            let mut player = MusicPlayer::new(device, MixSettings::from(&sound));

            player.open(&file, i32::from(looping), volume, 0, 0)?;
            while player.is_live() {
                thread::sleep(TICK_INTERVAL);
            }
        }
        Commands::Sound {
            config_path,
            bank_path,
            group,
            item,
            volume,
            pan,
        } => {
            let sound = config::load(&config_path)?;
            let device = audio::get_device(&sound)?;
            let mut pool = VoicePool::new(device, MixSettings::from(&sound), sound.channels());

            let bank = SoundBank::load_filtered(&bank_path, |g, i| g == group && i == item, 1)?;
            if !bank.play(&mut pool, (group, item), volume, pan) {
                let bank_path = bank_path.display();
                return Err(format!("unable to play {},{} from {}", group, item, bank_path).into());
            }

            while pool.playing_count() > 0 {
                thread::sleep(TICK_INTERVAL);
                pool.tick();
            }
            // Let the resampler tail drain.
            thread::sleep(Duration::from_millis(100));
        }
    }

    Ok(())
}
