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
//! Fixture builders for WAV files and sound banks.

use std::{error::Error, fs, io::Cursor, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes planar 16-bit channels as a WAV file in memory.
pub fn wav_bytes(channels: &[Vec<i16>], sample_rate: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        for i in 0..frames {
            for channel in channels {
                writer.write_sample(channel[i]).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// Writes planar 16-bit channels to a WAV file.
pub fn write_wav(
    path: &Path,
    channels: &[Vec<i16>],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    fs::write(path, wav_bytes(channels, sample_rate))?;
    Ok(())
}

/// Builds a sound bank holding the given (group, item, embedded file) entries in order.
pub fn bank_bytes(entries: &[(i32, i32, Vec<u8>)]) -> Vec<u8> {
    const HEADER_LEN: usize = 24;
    const SUB_HEADER_LEN: usize = 16;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"ElecbyteSnd\0");
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());

    for (index, (group, item, data)) in entries.iter().enumerate() {
        let next = if index + 1 < entries.len() {
            (bytes.len() + SUB_HEADER_LEN + data.len()) as u32
        } else {
            0
        };
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&group.to_le_bytes());
        bytes.extend_from_slice(&item.to_le_bytes());
        bytes.extend_from_slice(data);
    }
    bytes
}

pub fn write_bank(path: &Path, entries: &[(i32, i32, Vec<u8>)]) -> Result<(), Box<dyn Error>> {
    fs::write(path, bank_bytes(entries))?;
    Ok(())
}
