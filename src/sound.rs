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
mod asset;
pub mod bank;
mod error;
mod music;
mod voice;

pub use asset::{SoundAsset, SILENT_SAMPLE_RATE};
pub use bank::{load_sound, SoundBank, SoundKey};
pub use error::SoundError;
pub use music::MusicPlayer;
pub use voice::{PlaybackVoice, VoicePool, MAX_VOICES};
