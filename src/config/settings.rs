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
use super::Sound;

const DEFAULT_STAGE_BOUNDS: (f32, f32) = (-160.0, 160.0);

/// Volume exponent at or below which music is treated as silent.
pub const MUSIC_SILENCE_FLOOR: f32 = -5.0;

/// An immutable snapshot of everything the mixing stages read from configuration.
///
/// Stages copy what they need at construction. A new snapshot only reaches live
/// pipelines through the explicit `apply_settings`/`update_volume` calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixSettings {
    pub master_volume: i32,
    pub wav_volume: i32,
    pub bgm_volume: i32,
    pub max_bgm_volume: i32,
    pub audio_ducking: bool,
    pub stereo_effects: bool,
    pub panning_range: f32,
    pub xmin: f32,
    pub xmax: f32,
}

/// The slice of the snapshot the pan/volume effect works from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanSettings {
    pub stereo_effects: bool,
    pub panning_range: f32,
    pub xmin: f32,
    pub xmax: f32,
}

impl Default for MixSettings {
    fn default() -> Self {
        MixSettings::from(&Sound::default())
    }
}

impl From<&Sound> for MixSettings {
    fn from(sound: &Sound) -> Self {
        MixSettings {
            master_volume: sound.master_volume(),
            wav_volume: sound.wav_volume(),
            bgm_volume: sound.bgm_volume(),
            max_bgm_volume: sound.max_bgm_volume(),
            audio_ducking: sound.audio_ducking(),
            stereo_effects: sound.stereo_effects(),
            panning_range: sound.panning_range(),
            xmin: DEFAULT_STAGE_BOUNDS.0,
            xmax: DEFAULT_STAGE_BOUNDS.1,
        }
    }
}

impl MixSettings {
    /// Returns a copy with new stage bounds, used when the playfield changes.
    pub fn with_stage_bounds(self, xmin: f32, xmax: f32) -> Self {
        MixSettings { xmin, xmax, ..self }
    }

    pub fn pan(&self) -> PanSettings {
        PanSettings {
            stereo_effects: self.stereo_effects,
            panning_range: self.panning_range,
            xmin: self.xmin,
            xmax: self.xmax,
        }
    }

    /// The mix gain used while ducking is disabled. Depends on configuration only.
    pub fn static_gain(&self) -> f64 {
        0.5 * (self.wav_volume as f64 * self.master_volume as f64 * 0.0001)
    }

    /// The base-2 volume exponent for a music track played at `track_volume` percent.
    pub fn music_volume(&self, track_volume: i32) -> f32 {
        MUSIC_SILENCE_FLOOR
            + self.bgm_volume as f32
                * 0.06
                * (self.master_volume as f32 / 100.0)
                * (track_volume as f32 / 100.0)
    }
}
