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
use std::time::Duration;

use super::error::SampleSourceError;
use crate::audio::Frame;

/// A source of stereo sample frames.
pub trait SampleSource: Send {
    /// Fills `output` with up to `output.len()` frames.
    /// Returns the number of frames written (0 = EOF).
    /// Returns Err(error) if an error occurred.
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError>;

    /// Get the native sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the duration of this source (if known)
    /// Returns None if the duration is unknown or infinite
    fn duration(&self) -> Option<Duration> {
        None
    }
}

/// A sample source that can be rewound. Required by the loop wrapper.
pub trait SeekableSource: SampleSource {
    /// Moves the read cursor to the given frame.
    fn seek(&mut self, frame: usize) -> Result<(), SampleSourceError>;

    /// The current read cursor, in frames from the start of the source.
    fn position(&self) -> usize;
}

impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        (**self).next_chunk(output)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }
}
