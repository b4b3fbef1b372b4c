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

//! Sound bank containers.
//!
//! All values are little-endian:
//!
//! ```text
//! header     "ElecbyteSnd\0"  version: u16  sub-version: u16  count: u32  first: u32
//! sub-header next: u32  length: u32  group: i32  item: i32  <embedded WAV>
//! ```
//!
//! Entries form a chain through their `next` offsets. The embedded WAV is read in place.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SoundAsset, SoundError, VoicePool, SILENT_SAMPLE_RATE};

const MAGIC: &[u8; 12] = b"ElecbyteSnd\0";

/// A (group, item) pair addressing one bank entry.
pub type SoundKey = (i32, i32);

/// The decoded entries of a sound bank.
#[derive(Debug, Default)]
pub struct SoundBank {
    sounds: HashMap<SoundKey, Arc<SoundAsset>>,
    version: (u16, u16),
}

impl SoundBank {
    /// Loads every entry with a non-negative group and item.
    pub fn load(path: &Path) -> Result<SoundBank, SoundError> {
        SoundBank::load_filtered(path, |group, item| group >= 0 && item >= 0, 0)
    }

    /// Loads the entries `keep` accepts.
    ///
    /// With `max` at zero the whole chain is scanned and entries that fail to decode are
    /// skipped. Otherwise this is a lookup: it returns after the first decoded match, gives
    /// up once more than `max` entries have not matched, and a decode failure is an error.
    pub fn load_filtered<F>(path: &Path, keep: F, max: u32) -> Result<SoundBank, SoundError>
    where
        F: FnMut(i32, i32) -> bool,
    {
        let file = File::open(path)?;
        let bank = SoundBank::read_filtered(&mut BufReader::new(file), keep, max);
        if let Err(e) = &bank {
            warn!(path = ?path, err = %e, "Unable to load sound bank.");
        }
        bank
    }

    /// Parses a bank from any seekable reader. See [`SoundBank::load_filtered`].
    pub fn read_filtered<R, F>(
        reader: &mut R,
        mut keep: F,
        max: u32,
    ) -> Result<SoundBank, SoundError>
    where
        R: Read + Seek,
        F: FnMut(i32, i32) -> bool,
    {
        let magic: [u8; 12] = read_array(reader, "header")?;
        if &magic != MAGIC {
            return Err(SoundError::Format(
                "unrecognized sound bank, invalid header".to_string(),
            ));
        }

        let version = (
            u16::from_le_bytes(read_array(reader, "header")?),
            u16::from_le_bytes(read_array(reader, "header")?),
        );
        let count = u32::from_le_bytes(read_array(reader, "header")?);
        let mut offset = u32::from_le_bytes(read_array(reader, "header")?);

        let mut bank = SoundBank {
            sounds: HashMap::new(),
            version,
        };
        let mut misses = 0u32;

        for _ in 0..count {
            reader.seek(SeekFrom::Start(offset as u64))?;
            let next = u32::from_le_bytes(read_array(reader, "sub-header")?);
            let _length = u32::from_le_bytes(read_array(reader, "sub-header")?);
            let group = i32::from_le_bytes(read_array(reader, "sub-header")?);
            let item = i32::from_le_bytes(read_array(reader, "sub-header")?);
            let key = (group, item);

            if keep(group, item) && !bank.sounds.contains_key(&key) {
                match SoundAsset::from_wav(&mut *reader) {
                    Ok(asset) => {
                        debug!(group, item, frames = asset.len(), "Loaded bank entry.");
                        bank.sounds.insert(key, Arc::new(asset));
                        if max > 0 {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(group, item, err = %e, "Unable to read bank entry.");
                        if max > 0 {
                            return Err(SoundError::Decode(e));
                        }
                    }
                }
            } else if max > 0 {
                misses += 1;
                if misses > max {
                    break;
                }
            }

            offset = next;
        }

        Ok(bank)
    }

    /// The (version, sub-version) pair from the header.
    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    pub fn get(&self, key: SoundKey) -> Option<&Arc<SoundAsset>> {
        self.sounds.get(&key)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Entries ordered by key.
    pub fn entries(&self) -> Vec<(SoundKey, &Arc<SoundAsset>)> {
        let mut entries: Vec<_> = self
            .sounds
            .iter()
            .map(|(key, asset)| (*key, asset))
            .collect();
        entries.sort_by_key(|(key, _)| *key);
        entries
    }

    /// Plays an entry once on the lowest free voice, at `volume_scale` percent and
    /// absolute pan `pan`. Returns false for unknown keys or when no voice is free.
    pub fn play(&self, pool: &mut VoicePool, key: SoundKey, volume_scale: i32, pan: f32) -> bool {
        let Some(asset) = self.get(key) else {
            return false;
        };
        let Some(voice) = pool.reserve() else {
            debug!(group = key.0, item = key.1, "No free voice, sound dropped.");
            return false;
        };
        voice.play_with(Some(asset), false, 1.0, |effect| {
            effect.set_volume(volume_scale * 64 / 25);
            effect.set_pan(pan, 1.0, None);
        })
    }

    /// Stops every voice playing the entry.
    pub fn stop(&self, pool: &mut VoicePool, key: SoundKey) {
        if let Some(asset) = self.get(key) {
            pool.stop(asset);
        }
    }
}

/// Looks up a single entry, scanning up to `max` misses. An absent entry yields a silent
/// placeholder.
pub fn load_sound(
    path: &Path,
    group: i32,
    item: i32,
    max: u32,
) -> Result<Arc<SoundAsset>, SoundError> {
    let bank = SoundBank::load_filtered(path, |g, i| g == group && i == item, max)?;
    Ok(bank
        .get((group, item))
        .cloned()
        .unwrap_or_else(|| Arc::new(SoundAsset::silent(SILENT_SAMPLE_RATE))))
}

fn read_array<R: Read, const N: usize>(reader: &mut R, part: &str) -> Result<[u8; N], SoundError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SoundError::Format(format!("truncated {}", part)),
        _ => SoundError::Io(e),
    })?;
    Ok(buf)
}
