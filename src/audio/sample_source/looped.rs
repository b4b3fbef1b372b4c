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
use super::error::SampleSourceError;
use super::traits::{SampleSource, SeekableSource};
use crate::audio::Frame;

/// How many times a looped source plays through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Times(u32),
    Infinite,
}

impl LoopCount {
    /// A single pass, or an endless loop.
    pub fn from_flag(looping: bool) -> LoopCount {
        if looping {
            LoopCount::Infinite
        } else {
            LoopCount::Times(1)
        }
    }
}

/// Replays a seekable source a number of times by rewinding it on each end-of-stream.
pub struct LoopedSource<S: SeekableSource> {
    source: S,
    remaining: LoopCount,
}

impl<S: SeekableSource> LoopedSource<S> {
    pub fn new(source: S, count: LoopCount) -> Self {
        Self {
            source,
            remaining: count,
        }
    }
}

impl<S: SeekableSource> SampleSource for LoopedSource<S> {
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        let mut filled = 0;

        while filled < output.len() {
            if self.remaining == LoopCount::Times(0) {
                break;
            }

            let read = self.source.next_chunk(&mut output[filled..])?;
            if read > 0 {
                filled += read;
                continue;
            }

            // End of one pass.
            if let LoopCount::Times(remaining) = &mut self.remaining {
                *remaining -= 1;
                if *remaining == 0 {
                    break;
                }
            }

            // A source that produced nothing since its start would spin forever.
            if self.source.position() == 0 {
                self.remaining = LoopCount::Times(0);
                break;
            }

            self.source.seek(0)?;
        }

        Ok(filled)
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn duration(&self) -> Option<std::time::Duration> {
        match self.remaining {
            LoopCount::Infinite => None,
            LoopCount::Times(n) => self.source.duration().map(|d| d * n),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::sample_source::MemorySampleSource;

    fn source(len: usize) -> MemorySampleSource {
        let frames: Arc<[Frame]> = (0..len).map(|i| [i as f32, i as f32]).collect();
        MemorySampleSource::from_shared(frames, 44100)
    }

    fn drain(source: &mut impl SampleSource, limit: usize) -> Vec<Frame> {
        let mut all = Vec::new();
        let mut out = [[0.0; 2]; 4];
        while all.len() < limit {
            let read = source.next_chunk(&mut out).unwrap();
            if read == 0 {
                break;
            }
            all.extend_from_slice(&out[..read]);
        }
        all
    }

    #[test]
    fn test_single_pass() {
        let mut looped = LoopedSource::new(source(6), LoopCount::Times(1));
        let frames = drain(&mut looped, 100);
        assert_eq!(frames.len(), 6);
        assert_eq!(looped.next_chunk(&mut [[0.0; 2]; 4]).unwrap(), 0);
    }

    #[test]
    fn test_counted_passes() {
        let mut looped = LoopedSource::new(source(3), LoopCount::Times(3));
        let frames = drain(&mut looped, 100);
        assert_eq!(frames.len(), 9);
        assert_eq!(frames[3], [0.0, 0.0]);
        assert_eq!(frames[8], [2.0, 2.0]);
    }

    #[test]
    fn test_infinite_loop_rewinds_cursor() {
        let inner = source(5);
        let cursor = inner.cursor();
        let mut looped = LoopedSource::new(inner, LoopCount::Infinite);

        let frames = drain(&mut looped, 23);
        assert!(frames.len() >= 23);
        assert!(cursor.load(std::sync::atomic::Ordering::Relaxed) < 5);
        assert_eq!(looped.duration(), None);
    }

    #[test]
    fn test_infinite_loop_of_empty_source_terminates() {
        let mut looped = LoopedSource::new(source(0), LoopCount::Infinite);
        assert_eq!(looped.next_chunk(&mut [[0.0; 2]; 4]).unwrap(), 0);
    }
}
