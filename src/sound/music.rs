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
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, span, Level};

use crate::audio::effect::VolumeControl;
use crate::audio::sample_source::{
    Codec, DecodedSource, LoopCount, LoopedSource, SampleSource, Transcoder,
};
use crate::audio::{Device, GainStage, Pipeline, StreamId, TARGET_SAMPLE_RATE};
use crate::config::{MixSettings, MUSIC_SILENCE_FLOOR};

use super::SoundError;

/// The background music slot. Opening a track always dismantles the previous one first.
pub struct MusicPlayer {
    device: Arc<dyn Device>,
    settings: MixSettings,
    filename: String,
    loop_count: i32,
    volume: i32,
    /// Loop markers, in frames. Kept for callers; looping always covers the whole track.
    loop_start: i32,
    loop_end: i32,
    codec: Option<Codec>,
    stream: Option<StreamId>,
}

impl MusicPlayer {
    pub fn new(device: Arc<dyn Device>, settings: MixSettings) -> Self {
        MusicPlayer {
            device,
            settings,
            filename: String::new(),
            loop_count: 0,
            volume: 100,
            loop_start: 0,
            loop_end: 0,
            codec: None,
            stream: None,
        }
    }

    /// Starts playing `filename`: once if `loop_count` is zero or less, endlessly otherwise.
    /// An empty filename only stops the current track.
    ///
    /// On failure the error is logged and returned, and nothing plays.
    pub fn open(
        &mut self,
        filename: &str,
        loop_count: i32,
        volume: i32,
        loop_start: i32,
        loop_end: i32,
    ) -> Result<(), SoundError> {
        let span = span!(Level::INFO, "open music");
        let _enter = span.enter();

        self.filename = filename.to_string();
        self.loop_count = loop_count;
        self.volume = volume;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self.codec = None;

        if let Some(stream) = self.stream.take() {
            self.device.lock().starve(stream);
        }
        if filename.is_empty() {
            return Ok(());
        }

        let pipeline = match self.build(Path::new(filename)) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!(file = filename, err = %e, "Failed to load music.");
                return Err(e);
            }
        };
        self.stream = Some(self.device.register(pipeline));

        info!(
            file = filename,
            format = self.codec.map(|codec| codec.as_str()).unwrap_or(""),
            looping = loop_count > 0,
            "Playing music."
        );
        Ok(())
    }

    fn build(&mut self, path: &Path) -> Result<Pipeline, SoundError> {
        let codec = Codec::from_path(path).ok_or_else(|| {
            SoundError::Format(format!("unsupported file extension: {}", path.display()))
        })?;
        let source = DecodedSource::open(path, codec)?;
        let sample_rate = source.sample_rate();

        let count = if self.loop_count > 0 {
            LoopCount::Infinite
        } else {
            LoopCount::Times(1)
        };
        let (volume, silent) = self.volume_setting();
        let transcoder = Transcoder::new(sample_rate, TARGET_SAMPLE_RATE as f64)?;

        self.codec = Some(codec);
        Ok(Pipeline::new(
            Box::new(LoopedSource::new(source, count)),
            GainStage::Volume(VolumeControl::new(volume, silent)),
            transcoder,
        ))
    }

    /// Clamps the track volume and maps it to the volume stage's exponent and silent flag.
    fn volume_setting(&mut self) -> (f32, bool) {
        if self.volume > self.settings.max_bgm_volume {
            debug!(
                volume = self.volume,
                max = self.settings.max_bgm_volume,
                "Music volume clamped."
            );
            self.volume = self.settings.max_bgm_volume;
        }
        let volume = self.settings.music_volume(self.volume);
        (volume, volume <= MUSIC_SILENCE_FLOOR)
    }

    /// Holds the track in place, producing silence. There is no resume; open the track again.
    pub fn pause(&self) {
        let Some(stream) = self.stream else {
            return;
        };
        if let Some(pipeline) = self.device.lock().pipeline_mut(stream) {
            pipeline.pause();
        }
    }

    /// Recomputes the live volume from the current settings snapshot.
    pub fn update_volume(&mut self) {
        let (volume, silent) = self.volume_setting();
        let Some(stream) = self.stream else {
            return;
        };
        let mut mixer = self.device.lock();
        if let Some(control) = mixer
            .pipeline_mut(stream)
            .and_then(|pipeline| pipeline.volume_control_mut())
        {
            control.set(volume, silent);
        }
    }

    pub fn apply_settings(&mut self, settings: MixSettings) {
        self.settings = settings;
        self.update_volume();
    }

    /// Whether a track is still registered with the device.
    pub fn is_live(&self) -> bool {
        self.stream
            .is_some_and(|stream| self.device.lock().contains(stream))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn loop_points(&self) -> (i32, i32) {
        (self.loop_start, self.loop_end)
    }

    /// The format tag of the playing track.
    pub fn format(&self) -> Option<&'static str> {
        self.codec.map(|codec| codec.as_str())
    }
}
