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
use serde::Deserialize;

use crate::sound::MAX_VOICES;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_CHANNELS: usize = 16;
const DEFAULT_MASTER_VOLUME: i32 = 100;
const DEFAULT_WAV_VOLUME: i32 = 80;
const DEFAULT_BGM_VOLUME: i32 = 80;
const DEFAULT_MAX_BGM_VOLUME: i32 = 100;
const DEFAULT_PANNING_RANGE: f32 = 30.0;

/// A YAML representation of the sound configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sound {
    /// The audio output device. Names starting with "mock" select the offline device.
    device: Option<String>,

    /// Number of voice slots allocated up front (default: 16, at most 256).
    channels: Option<usize>,

    /// Master volume percentage applied to everything (default: 100).
    master_volume: Option<i32>,

    /// Volume percentage for sound effects (default: 80).
    wav_volume: Option<i32>,

    /// Volume percentage for background music (default: 80).
    bgm_volume: Option<i32>,

    /// Upper bound for a track's own volume (default: 100).
    max_bgm_volume: Option<i32>,

    /// Duck the whole mix together when any channel nears overload (default: false).
    audio_ducking: Option<bool>,

    /// Pan voices across the stereo field from their stage position (default: true).
    stereo_effects: Option<bool>,

    /// Width of the stereo panning, in percent (default: 30).
    panning_range: Option<f32>,
}

impl Sound {
    /// New will create a new sound configuration with every other value at its default.
    pub fn new(device: &str) -> Sound {
        Sound {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the number of voice slots, capped at the pool bound.
    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS).min(MAX_VOICES)
    }

    pub fn master_volume(&self) -> i32 {
        self.master_volume.unwrap_or(DEFAULT_MASTER_VOLUME)
    }

    pub fn wav_volume(&self) -> i32 {
        self.wav_volume.unwrap_or(DEFAULT_WAV_VOLUME)
    }

    pub fn bgm_volume(&self) -> i32 {
        self.bgm_volume.unwrap_or(DEFAULT_BGM_VOLUME)
    }

    pub fn max_bgm_volume(&self) -> i32 {
        self.max_bgm_volume.unwrap_or(DEFAULT_MAX_BGM_VOLUME)
    }

    pub fn audio_ducking(&self) -> bool {
        self.audio_ducking.unwrap_or(false)
    }

    pub fn stereo_effects(&self) -> bool {
        self.stereo_effects.unwrap_or(true)
    }

    pub fn panning_range(&self) -> f32 {
        self.panning_range.unwrap_or(DEFAULT_PANNING_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let sound = Sound::new("mock-device");
        assert_eq!(sound.device(), "mock-device");
        assert_eq!(sound.channels(), 16);
        assert_eq!(sound.master_volume(), 100);
        assert_eq!(sound.wav_volume(), 80);
        assert!(!sound.audio_ducking());
        assert!(sound.stereo_effects());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
            device: mock-yaml
            channels: 1000
            master_volume: 50
            audio_ducking: true
            panning_range: 60
        "#;
        let sound: Sound = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(sound.device(), "mock-yaml");
        assert_eq!(sound.channels(), MAX_VOICES);
        assert_eq!(sound.master_volume(), 50);
        assert!(sound.audio_ducking());
        assert_eq!(sound.panning_range(), 60.0);
        assert_eq!(sound.bgm_volume(), 80);
    }
}
