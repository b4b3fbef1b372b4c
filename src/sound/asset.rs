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
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::sample_source::{wav, MemorySampleSource, SampleSourceError};
use crate::audio::Frame;

use super::VoicePool;

/// Rate of the placeholder played for unknown bank entries.
pub const SILENT_SAMPLE_RATE: u32 = 11025;

/// Decoded PCM, immutable once created and shared by every voice that plays it.
#[derive(Debug)]
pub struct SoundAsset {
    frames: Arc<[Frame]>,
    sample_rate: u32,
}

impl SoundAsset {
    pub fn new(frames: Vec<Frame>, sample_rate: u32) -> SoundAsset {
        SoundAsset {
            frames: frames.into(),
            sample_rate,
        }
    }

    /// An asset with no frames.
    pub fn silent(sample_rate: u32) -> SoundAsset {
        SoundAsset::new(Vec::new(), sample_rate)
    }

    /// Decodes a WAV stream.
    pub fn from_wav<R: Read>(reader: R) -> Result<SoundAsset, SampleSourceError> {
        let (frames, sample_rate) = wav::read_frames(reader)?;
        Ok(SoundAsset::new(frames, sample_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.len() as f64 / self.sample_rate as f64)
    }

    /// A fresh replay over the whole asset.
    pub fn replay(&self) -> MemorySampleSource {
        MemorySampleSource::from_shared(self.frames.clone(), self.sample_rate)
    }

    /// Plays the asset once on the lowest free voice. Returns false if none is free.
    pub fn play(self: &Arc<Self>, pool: &mut VoicePool) -> bool {
        match pool.reserve() {
            Some(voice) => voice.play(Some(self), false, 1.0),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::audio::sample_source::SampleSource;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_from_wav() {
        let asset = SoundAsset::from_wav(Cursor::new(wav_bytes(&[vec![0; 22050]], 22050))).unwrap();
        assert_eq!(asset.sample_rate(), 22050);
        assert_eq!(asset.len(), 22050);
        assert_eq!(asset.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_replays_are_independent() {
        let asset = SoundAsset::new(vec![[0.25, 0.25]; 10], 8000);
        let mut first = asset.replay();
        let mut second = asset.replay();
        let mut out = [[0.0; 2]; 10];

        assert_eq!(first.next_chunk(&mut out[..4]).unwrap(), 4);
        assert_eq!(second.next_chunk(&mut out).unwrap(), 10);
        assert_eq!(first.next_chunk(&mut out).unwrap(), 6);
    }

    #[test]
    fn test_silent() {
        let asset = SoundAsset::silent(SILENT_SAMPLE_RATE);
        assert!(asset.is_empty());
        assert_eq!(asset.sample_rate(), 11025);
        assert_eq!(asset.duration(), Duration::ZERO);
    }
}
