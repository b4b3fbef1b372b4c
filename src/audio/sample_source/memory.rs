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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{SampleSource, SeekableSource};
use crate::audio::Frame;

/// A sample source that replays frames held in memory.
///
/// The frames are shared, so any number of sources may replay the same buffer at once.
/// The read cursor is published through an atomic so that the control thread can
/// observe playback progress without taking the mixer lock.
pub struct MemorySampleSource {
    frames: Arc<[Frame]>,
    /// First frame of the replayed range.
    start: usize,
    /// One past the last frame of the replayed range.
    end: usize,
    /// Frames read so far, counted from `start`.
    cursor: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl MemorySampleSource {
    /// Creates a source that replays the whole buffer.
    pub fn from_shared(frames: Arc<[Frame]>, sample_rate: u32) -> Self {
        let end = frames.len();
        Self::with_range(frames, sample_rate, 0, end)
    }

    /// Creates a source bounded to `start..end` of the buffer.
    pub fn with_range(frames: Arc<[Frame]>, sample_rate: u32, start: usize, end: usize) -> Self {
        let end = end.min(frames.len());
        let start = start.min(end);
        Self {
            frames,
            start,
            end,
            cursor: Arc::new(AtomicUsize::new(0)),
            sample_rate,
        }
    }

    /// Returns a shared handle to the playback cursor, in frames from the start of the
    /// replayed range. It reaches [`len`](Self::len) once the range is exhausted.
    pub fn cursor(&self) -> Arc<AtomicUsize> {
        self.cursor.clone()
    }

    /// Number of frames in the replayed range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        let read = self.cursor.load(Ordering::Relaxed);
        let current = self.start + read;
        let available = self.end.saturating_sub(current);
        let to_copy = available.min(output.len());

        if to_copy > 0 {
            output[..to_copy].copy_from_slice(&self.frames[current..current + to_copy]);
            self.cursor.store(read + to_copy, Ordering::Relaxed);
        }

        Ok(to_copy)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        if self.sample_rate == 0 {
            return Some(Duration::ZERO);
        }
        Some(Duration::from_secs_f64(
            self.len() as f64 / self.sample_rate as f64,
        ))
    }
}

impl SeekableSource for MemorySampleSource {
    fn seek(&mut self, frame: usize) -> Result<(), SampleSourceError> {
        self.cursor.store(frame.min(self.len()), Ordering::Relaxed);
        Ok(())
    }

    fn position(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

/// A source that is always at end-of-stream. Swapped in to starve a live pipeline.
pub struct EmptySource {
    sample_rate: u32,
}

impl EmptySource {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl SampleSource for EmptySource {
    fn next_chunk(&mut self, _output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        Ok(0)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Arc<[Frame]> {
        (0..len).map(|i| [i as f32, -(i as f32)]).collect()
    }

    #[test]
    fn test_reads_whole_buffer_then_eof() {
        let mut source = MemorySampleSource::from_shared(ramp(5), 44100);
        let mut out = [[0.0; 2]; 3];

        assert_eq!(source.next_chunk(&mut out).unwrap(), 3);
        assert_eq!(out[2], [2.0, -2.0]);
        assert_eq!(source.next_chunk(&mut out).unwrap(), 2);
        assert_eq!(out[1], [4.0, -4.0]);
        assert_eq!(source.next_chunk(&mut out).unwrap(), 0);
        assert_eq!(source.position(), 5);
    }

    #[test]
    fn test_cursor_is_shared() {
        let mut source = MemorySampleSource::from_shared(ramp(8), 44100);
        let cursor = source.cursor();
        let mut out = [[0.0; 2]; 6];

        source.next_chunk(&mut out).unwrap();
        assert_eq!(cursor.load(Ordering::Relaxed), 6);

        source.seek(0).unwrap();
        assert_eq!(cursor.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_multiple_replays_of_one_buffer() {
        let frames = ramp(4);
        let mut first = MemorySampleSource::from_shared(frames.clone(), 22050);
        let mut second = MemorySampleSource::from_shared(frames, 22050);
        let mut out = [[0.0; 2]; 4];

        first.next_chunk(&mut out[..2]).unwrap();
        assert_eq!(second.next_chunk(&mut out).unwrap(), 4);
        assert_eq!(first.position(), 2);
        assert_eq!(second.position(), 4);
    }

    #[test]
    fn test_range_is_clamped() {
        let mut source = MemorySampleSource::with_range(ramp(4), 8000, 1, 100);
        let mut out = [[0.0; 2]; 8];

        assert_eq!(source.len(), 3);
        assert_eq!(source.next_chunk(&mut out).unwrap(), 3);
        assert_eq!(out[0], [1.0, -1.0]);
    }

    #[test]
    fn test_cursor_counts_from_range_start() {
        let mut source = MemorySampleSource::with_range(ramp(10), 8000, 4, 8);
        let cursor = source.cursor();
        let mut out = [[0.0; 2]; 3];

        assert_eq!(cursor.load(Ordering::Relaxed), 0);
        source.next_chunk(&mut out).unwrap();
        assert_eq!(out[0], [4.0, -4.0]);
        assert_eq!(cursor.load(Ordering::Relaxed), 3);

        source.next_chunk(&mut out).unwrap();
        assert_eq!(cursor.load(Ordering::Relaxed), source.len());
        assert_eq!(source.position(), 4);

        source.seek(1).unwrap();
        source.next_chunk(&mut out[..1]).unwrap();
        assert_eq!(out[0], [5.0, -5.0]);
        assert_eq!(source.position(), 2);
    }

    #[test]
    fn test_empty_source() {
        let mut source = EmptySource::new(48000);
        let mut out = [[1.0; 2]; 4];
        assert_eq!(source.next_chunk(&mut out).unwrap(), 0);
    }
}
