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
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::SampleSourceError;
use super::traits::{SampleSource, SeekableSource};
use crate::audio::Frame;

/// The codecs music may be streamed from, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Vorbis,
    Mp3,
    Wav,
}

impl Codec {
    /// Dispatches on the file extension. Returns None for unsupported extensions.
    pub fn from_path(path: &Path) -> Option<Codec> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "ogg" => Some(Codec::Vorbis),
            "mp3" => Some(Codec::Mp3),
            "wav" => Some(Codec::Wav),
            _ => None,
        }
    }

    /// The short format tag, doubling as the probe hint.
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Vorbis => "ogg",
            Codec::Mp3 => "mp3",
            Codec::Wav => "wav",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A streaming decoder over an audio file. Packets are decoded on demand as frames are pulled.
pub struct DecodedSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    n_frames: Option<u64>,
    /// Interleaved scratch buffer for the decoded packet, reused while large enough.
    sample_buffer: Option<SampleBuffer<f32>>,
    sample_buffer_frames: usize,
    /// Frames of the current packet not yet handed out.
    pending: Vec<Frame>,
    pending_pos: usize,
    position: usize,
    is_finished: bool,
}

impl DecodedSource {
    /// Opens the file and prepares a decoder for its first audio track.
    pub fn open(path: &Path, codec: Codec) -> Result<Self, SampleSourceError> {
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(codec.as_str());

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let format_reader = probed.format;

        let file_path = path.display().to_string();
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SampleSourceError::NoAudioTrack(file_path.clone()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or(SampleSourceError::UnknownSampleRate(file_path))?;
        let channels = params.channels.map(|c| c.count()).unwrap_or(2).max(1);

        let decoder_opts: DecoderOptions = Default::default();
        let decoder = get_codecs().make(&params, &decoder_opts)?;

        Ok(DecodedSource {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            n_frames: params.n_frames,
            sample_buffer: None,
            sample_buffer_frames: 0,
            pending: Vec::with_capacity(params.max_frames_per_packet.unwrap_or(0) as usize),
            pending_pos: 0,
            position: 0,
            is_finished: false,
        })
    }

    /// Decodes packets until one yields audio. Returns false at end-of-stream.
    fn refill(&mut self) -> Result<bool, SampleSourceError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is skipped, the stream carries on.
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            self.pending.clear();
            self.pending_pos = 0;

            // Buffers only grow when a packet outsizes every earlier one.
            let capacity = decoded.capacity();
            if self.sample_buffer.is_none() || self.sample_buffer_frames < capacity {
                let spec = *decoded.spec();
                self.sample_buffer = Some(SampleBuffer::<f32>::new(capacity as u64, spec));
                self.sample_buffer_frames = capacity;
                self.pending.reserve(capacity);
            }
            let Some(buffer) = self.sample_buffer.as_mut() else {
                continue;
            };
            buffer.copy_interleaved_ref(decoded);

            let channels = self.channels;
            self.pending
                .extend(buffer.samples().chunks_exact(channels).map(|frame| {
                    if channels == 1 {
                        [frame[0], frame[0]]
                    } else {
                        [frame[0], frame[1]]
                    }
                }));

            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl SampleSource for DecodedSource {
    fn next_chunk(&mut self, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        let mut filled = 0;

        while filled < output.len() && !self.is_finished {
            if self.pending_pos >= self.pending.len() && !self.refill()? {
                self.is_finished = true;
                break;
            }

            let available = self.pending.len() - self.pending_pos;
            let to_copy = available.min(output.len() - filled);
            output[filled..filled + to_copy]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + to_copy]);
            self.pending_pos += to_copy;
            filled += to_copy;
        }

        self.position += filled;
        Ok(filled)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.n_frames.map(|frames| {
            Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
        })
    }
}

impl SeekableSource for DecodedSource {
    fn seek(&mut self, frame: usize) -> Result<(), SampleSourceError> {
        self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: frame as u64,
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.position = frame;
        self.is_finished = false;
        Ok(())
    }

    fn position(&self) -> usize {
        self.position
    }
}
