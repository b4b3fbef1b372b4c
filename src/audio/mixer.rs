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
// Core mixing logic shared by the cpal and mock devices.
use std::sync::Arc;

use crate::audio::normalizer::{GainMode, Normalizer, SharedGain};
use crate::audio::pipeline::Pipeline;
use crate::audio::sample_source::SampleSource;
use crate::audio::{Frame, TARGET_SAMPLE_RATE};
use crate::config::MixSettings;

/// Identifies a pipeline registered with a mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

/// Sums every registered pipeline and normalizes the result.
///
/// The mixer is only ever touched through the device lock, which makes that lock the
/// single guard over everything the render path can reach.
pub struct Mixer {
    streams: Vec<(StreamId, Pipeline)>,
    next_id: u64,
    normalizer: Normalizer,
    /// Per-stream scratch, sized on demand outside the steady state.
    scratch: Vec<Frame>,
}

impl Mixer {
    pub fn new(settings: &MixSettings) -> Self {
        Mixer {
            streams: Vec::new(),
            next_id: 1,
            normalizer: Normalizer::new(GainMode::from(settings), TARGET_SAMPLE_RATE),
            scratch: Vec::new(),
        }
    }

    /// Registers a pipeline. It is pulled from the next render on.
    pub fn add(&mut self, pipeline: Pipeline) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;
        self.streams.push((id, pipeline));
        id
    }

    pub fn pipeline_mut(&mut self, id: StreamId) -> Option<&mut Pipeline> {
        self.streams
            .iter_mut()
            .find(|(stream, _)| *stream == id)
            .map(|(_, pipeline)| pipeline)
    }

    /// Starves the stream so it ends on the next render. Unknown ids are ignored.
    pub fn starve(&mut self, id: StreamId) {
        if let Some(pipeline) = self.pipeline_mut(id) {
            pipeline.starve();
        }
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.iter().any(|(stream, _)| *stream == id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn apply_settings(&mut self, settings: &MixSettings) {
        self.normalizer.set_mode(GainMode::from(settings));
    }

    pub fn shared_gain(&self) -> Arc<SharedGain> {
        self.normalizer.shared_gain()
    }

    /// Renders the next block of the mix into `output`.
    ///
    /// Streams that reach end-of-stream or fail are dropped after their last frames are
    /// summed.
    pub fn render(&mut self, output: &mut [Frame]) {
        output.fill([0.0, 0.0]);
        if self.scratch.len() < output.len() {
            self.scratch.resize(output.len(), [0.0, 0.0]);
        }

        let scratch = &mut self.scratch[..output.len()];
        self.streams.retain_mut(|(_, pipeline)| {
            let mut filled = 0;
            let mut live = true;
            while filled < scratch.len() {
                match pipeline.next_chunk(&mut scratch[filled..]) {
                    Ok(0) | Err(_) => {
                        live = false;
                        break;
                    }
                    Ok(read) => filled += read,
                }
            }
            for (out, frame) in output.iter_mut().zip(&scratch[..filled]) {
                out[0] += frame[0];
                out[1] += frame[1];
            }
            live
        });

        self.normalizer.process(output);
    }
}
