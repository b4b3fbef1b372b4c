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

use hound::WavReader;

use super::error::SampleSourceError;
use crate::audio::Frame;

/// Decodes a complete WAV stream into stereo frames.
///
/// The reader is consumed only as far as the RIFF header and data chunk require, so this
/// works on a WAV embedded in a larger container. Mono input is duplicated to both sides
/// and anything past the second channel is dropped.
pub fn read_frames<R: Read>(reader: R) -> Result<(Vec<Frame>, u32), SampleSourceError> {
    let mut wav_reader = WavReader::new(reader)?;
    let spec = wav_reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            wav_reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, hound::Error>>()?
        }
    };

    let frames = samples
        .chunks_exact(channels)
        .map(|frame| {
            if channels == 1 {
                [frame[0], frame[0]]
            } else {
                [frame[0], frame[1]]
            }
        })
        .collect();

    Ok((frames, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_mono_is_duplicated() {
        let bytes = wav_bytes(&[vec![i16::MAX, 0, i16::MIN]], 11025);
        let (frames, rate) = read_frames(Cursor::new(bytes)).unwrap();

        assert_eq!(rate, 11025);
        assert_eq!(frames.len(), 3);
        assert!((frames[0][0] - 1.0).abs() < 1e-3);
        assert_eq!(frames[0][0], frames[0][1]);
        assert_eq!(frames[2], [-1.0, -1.0]);
    }

    #[test]
    fn test_stereo_interleaving() {
        let bytes = wav_bytes(&[vec![16384, 0], vec![-16384, 8192]], 22050);
        let (frames, _) = read_frames(Cursor::new(bytes)).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], [0.5, -0.5]);
        assert_eq!(frames[1], [0.0, 0.25]);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result = read_frames(Cursor::new(b"not a riff file".to_vec()));
        assert!(matches!(result, Err(SampleSourceError::WavError(_))));
    }
}
