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
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::SampleSourceError;
use crate::audio::Frame;

// Resampling configuration constants
/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 512;

/// Ratios this close to 1.0 are passed through untouched.
const PASSTHROUGH_EPSILON: f64 = 1e-9;

/// Stereo only.
const CHANNELS: usize = 2;

/// Sliding-window input buffer for streaming resampling (planar format)
struct PlanarInputBuffer {
    /// Per-channel input samples (sliding window)
    channels: Vec<Vec<f32>>,
    /// Whether the upstream stage has reached EOF
    source_finished: bool,
}

impl PlanarInputBuffer {
    fn new() -> Self {
        Self {
            channels: vec![Vec::with_capacity(INPUT_BLOCK_SIZE * 2); CHANNELS],
            source_finished: false,
        }
    }

    /// Number of frames currently in the buffer
    fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Append interleaved stereo frames
    fn push_frames(&mut self, frames: &[Frame]) {
        for frame in frames {
            self.channels[0].push(frame[0]);
            self.channels[1].push(frame[1]);
        }
    }

    /// Drain the first `n` frames from all channels
    fn drain_frames(&mut self, n: usize) {
        for ch in &mut self.channels {
            ch.drain(0..n.min(ch.len()));
        }
    }

    fn clear(&mut self) {
        for ch in &mut self.channels {
            ch.clear();
        }
    }
}

/// Planar FIFO output buffer for streaming sample delivery
struct PlanarOutputFifo {
    /// Per-channel output samples ready for consumption
    channels: Vec<Vec<f32>>,
    /// Current read position (in frames)
    read_pos: usize,
}

impl PlanarOutputFifo {
    fn new() -> Self {
        Self {
            channels: vec![Vec::with_capacity(INPUT_BLOCK_SIZE * 4); CHANNELS],
            read_pos: 0,
        }
    }

    /// Number of frames available to read
    fn available_frames(&self) -> usize {
        self.channels[0].len().saturating_sub(self.read_pos)
    }

    /// Drain frames into interleaved output, returns number of frames written
    fn drain_to(&mut self, output: &mut [Frame]) -> usize {
        let to_copy = self.available_frames().min(output.len());

        for (i, frame) in output[..to_copy].iter_mut().enumerate() {
            frame[0] = self.channels[0][self.read_pos + i];
            frame[1] = self.channels[1][self.read_pos + i];
        }
        self.read_pos += to_copy;

        // Compact buffers if we've consumed a lot
        if self.read_pos > 4096 {
            for ch in self.channels.iter_mut() {
                ch.drain(..self.read_pos);
            }
            self.read_pos = 0;
        }
        to_copy
    }

    /// Append frames from resampler output (already planar)
    fn push_planar(&mut self, per_channel: &[Vec<f32>], num_frames: usize) {
        for (ch, input) in self.channels.iter_mut().zip(per_channel) {
            let frames_to_copy = num_frames.min(input.len());
            ch.extend_from_slice(&input[..frames_to_copy]);
        }
    }

    fn clear(&mut self) {
        for ch in &mut self.channels {
            ch.clear();
        }
        self.read_pos = 0;
    }
}

/// Sample-rate conversion stage backed by a rubato sinc resampler.
///
/// The stage does not own its input: every call pulls from an upstream closure, so the
/// stages ahead of it in a pipeline stay individually addressable.
pub struct Transcoder {
    resampler: Option<SincFixedIn<f32>>,
    source_rate: u32,
    target_rate: f64,

    /// Sliding window of input samples (planar)
    input_buffer: PlanarInputBuffer,
    /// FIFO of output samples ready for consumption (planar)
    output_fifo: PlanarOutputFifo,
    /// Temporary buffer for resampler output (reused to avoid allocation)
    output_scratch: Vec<Vec<f32>>,
    /// Temporary buffer for reading from upstream (reused)
    upstream_buffer: Vec<Frame>,
}

impl Transcoder {
    /// Creates a stage converting `source_rate` into `target_rate`.
    /// The target may be fractional, which is how pitch shifting is expressed.
    pub fn new(source_rate: u32, target_rate: f64) -> Result<Self, SampleSourceError> {
        let ratio = target_rate / source_rate.max(1) as f64;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(SampleSourceError::ResamplingFailed(source_rate, target_rate));
        }

        let (resampler, output_scratch) = if (ratio - 1.0).abs() > PASSTHROUGH_EPSILON {
            let sinc_params = SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                oversampling_factor: 128,
                interpolation: SincInterpolationType::Linear,
                window: WindowFunction::BlackmanHarris2,
            };

            let r = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, CHANNELS)
                .map_err(|_e| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;

            let scratch = r.output_buffer_allocate(true);
            (Some(r), scratch)
        } else {
            (None, Vec::new())
        };

        Ok(Transcoder {
            resampler,
            source_rate,
            target_rate,
            input_buffer: PlanarInputBuffer::new(),
            output_fifo: PlanarOutputFifo::new(),
            output_scratch,
            upstream_buffer: vec![[0.0; 2]; INPUT_BLOCK_SIZE],
        })
    }

    /// Whether the stage actually resamples.
    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Fills `output` with converted frames pulled from `upstream`. Returns 0 at EOF.
    pub fn process<F>(
        &mut self,
        output: &mut [Frame],
        mut upstream: F,
    ) -> Result<usize, SampleSourceError>
    where
        F: FnMut(&mut [Frame]) -> Result<usize, SampleSourceError>,
    {
        // If no resampler, just pass through directly
        if self.resampler.is_none() {
            if self.input_buffer.source_finished {
                return Ok(0);
            }
            return upstream(output);
        }

        let mut total_frames = 0;

        while total_frames < output.len() {
            // First, drain any available frames from the output FIFO
            total_frames += self.output_fifo.drain_to(&mut output[total_frames..]);

            if total_frames >= output.len() {
                break;
            }

            // Output FIFO depleted - need to process more input
            let had_output = self.fill_output_fifo(&mut upstream)?;

            // If fill_output_fifo didn't produce any output and upstream is done, we're finished
            if !had_output
                && self.input_buffer.source_finished
                && self.output_fifo.available_frames() == 0
            {
                break;
            }
        }

        Ok(total_frames)
    }

    /// Drops everything buffered and reports EOF from now on.
    pub fn clear(&mut self) {
        self.input_buffer.clear();
        self.input_buffer.source_finished = true;
        self.output_fifo.clear();
    }

    /// Fill the output FIFO by reading from upstream and processing through the resampler.
    /// Returns true if any output was produced.
    fn fill_output_fifo<F>(&mut self, upstream: &mut F) -> Result<bool, SampleSourceError>
    where
        F: FnMut(&mut [Frame]) -> Result<usize, SampleSourceError>,
    {
        let source_rate = self.source_rate;
        let target_rate = self.target_rate;
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(false);
        };

        // 1. Try to fill input buffer from upstream
        let input_frames_needed = resampler.input_frames_next();
        while !self.input_buffer.source_finished && self.input_buffer.len() < input_frames_needed
        {
            let frames_needed = (input_frames_needed - self.input_buffer.len())
                .min(self.upstream_buffer.len());

            let frames_read = upstream(&mut self.upstream_buffer[..frames_needed])?;
            if frames_read == 0 {
                self.input_buffer.source_finished = true;
                break;
            }

            self.input_buffer
                .push_frames(&self.upstream_buffer[..frames_read]);
        }

        // 2. Process if we have enough input
        if self.input_buffer.len() >= input_frames_needed {
            let (nbr_in, nbr_out) = resampler
                .process_into_buffer(
                    self.input_buffer.channels.as_slice(),
                    self.output_scratch.as_mut_slice(),
                    None,
                )
                .map_err(|_e| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;

            self.input_buffer.drain_frames(nbr_in);

            if nbr_out > 0 {
                self.output_fifo.push_planar(&self.output_scratch, nbr_out);
                return Ok(true);
            }
            return Ok(false);
        } else if self.input_buffer.source_finished {
            // 3. Upstream finished - process any remaining input
            if self.input_buffer.len() == 0 {
                return Ok(false);
            }

            let (_nbr_in, nbr_out) = resampler
                .process_partial_into_buffer(
                    Some(self.input_buffer.channels.as_slice()),
                    self.output_scratch.as_mut_slice(),
                    None,
                )
                .map_err(|_e| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;

            let remaining = self.input_buffer.len();
            self.input_buffer.drain_frames(remaining);

            if nbr_out > 0 {
                self.output_fifo.push_planar(&self.output_scratch, nbr_out);
                return Ok(true);
            }
        }

        Ok(false)
    }
}
