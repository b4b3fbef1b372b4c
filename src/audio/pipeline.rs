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
use crate::audio::effect::{PanVolumeEffect, VolumeControl};
use crate::audio::sample_source::{EmptySource, SampleSource, SampleSourceError, Transcoder};
use crate::audio::Frame;

/// The gain stage of a pipeline.
pub enum GainStage {
    /// Voices: per-voice volume and stereo pan.
    PanVolume(PanVolumeEffect),
    /// Music: exponent volume with a silent flag.
    Volume(VolumeControl),
}

impl GainStage {
    fn process(&self, frames: &mut [Frame]) {
        match self {
            GainStage::PanVolume(effect) => effect.process(frames),
            GainStage::Volume(control) => control.process(frames),
        }
    }
}

/// A registered chain of stages: source, gain, then rate conversion to the device rate.
///
/// Every field is reachable from the render thread, so all mutation happens under the
/// mixer lock.
pub struct Pipeline {
    source: Box<dyn SampleSource>,
    gain: GainStage,
    transcoder: Transcoder,
    paused: bool,
}

impl Pipeline {
    pub fn new(source: Box<dyn SampleSource>, gain: GainStage, transcoder: Transcoder) -> Self {
        Pipeline {
            source,
            gain,
            transcoder,
            paused: false,
        }
    }

    pub fn pan_volume_mut(&mut self) -> Option<&mut PanVolumeEffect> {
        match &mut self.gain {
            GainStage::PanVolume(effect) => Some(effect),
            GainStage::Volume(_) => None,
        }
    }

    pub fn volume_control_mut(&mut self) -> Option<&mut VolumeControl> {
        match &mut self.gain {
            GainStage::Volume(control) => Some(control),
            GainStage::PanVolume(_) => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Holds the pipeline in place, producing silence. There is no way back.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Replaces the source with an empty one and discards anything buffered after it,
    /// so the next pull reports end-of-stream.
    pub fn starve(&mut self) {
        let rate = self.source.sample_rate();
        self.source = Box::new(EmptySource::new(rate));
        self.transcoder.clear();
    }
}

impl SampleSource for Pipeline {
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        if self.paused {
            output.fill([0.0, 0.0]);
            return Ok(output.len());
        }

        let Pipeline {
            source,
            gain,
            transcoder,
            ..
        } = self;
        transcoder.process(output, |buffer| {
            let read = source.next_chunk(buffer)?;
            gain.process(&mut buffer[..read]);
            Ok(read)
        })
    }

    fn sample_rate(&self) -> u32 {
        crate::audio::TARGET_SAMPLE_RATE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::sample_source::MemorySampleSource;
    use crate::config::MixSettings;

    fn pipeline(len: usize, volume: i32) -> Pipeline {
        let frames: Arc<[Frame]> = vec![[0.5, 0.5]; len].into();
        let source = MemorySampleSource::from_shared(frames, 48000);
        let mut effect = PanVolumeEffect::new(MixSettings::default().pan());
        effect.set_volume(volume);
        Pipeline::new(
            Box::new(source),
            GainStage::PanVolume(effect),
            Transcoder::new(48000, 48000.0).unwrap(),
        )
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = pipeline(10, 512);
        let mut out = vec![[0.0; 2]; 16];
        assert_eq!(pipeline.next_chunk(&mut out).unwrap(), 10);
        assert_eq!(out[0], [1.0, 1.0]);
        assert_eq!(pipeline.next_chunk(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_starve_reports_end_of_stream() {
        let mut pipeline = pipeline(1000, 256);
        let mut out = vec![[0.0; 2]; 16];
        assert_eq!(pipeline.next_chunk(&mut out).unwrap(), 16);

        pipeline.starve();
        assert_eq!(pipeline.next_chunk(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_paused_pipeline_outputs_silence_and_stays_live() {
        let mut pipeline = pipeline(1000, 256);
        pipeline.pause();

        let mut out = vec![[1.0; 2]; 16];
        assert_eq!(pipeline.next_chunk(&mut out).unwrap(), 16);
        assert!(out.iter().all(|f| *f == [0.0, 0.0]));
        assert!(pipeline.is_paused());
    }

    #[test]
    fn test_gain_accessors() {
        let mut pipeline = pipeline(1, 256);
        assert!(pipeline.pan_volume_mut().is_some());
        assert!(pipeline.volume_control_mut().is_none());
    }
}
