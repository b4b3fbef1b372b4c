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
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

pub mod error;
mod settings;
mod sound;

pub use error::ConfigError;
pub use settings::{MixSettings, PanSettings, MUSIC_SILENCE_FLOOR};
pub use sound::Sound;

/// Loads the sound configuration from a YAML file. `SNDMIX_*` environment variables
/// override individual keys, e.g. `SNDMIX_MASTER_VOLUME=50`.
pub fn load(path: &Path) -> Result<Sound, ConfigError> {
    debug!(path = ?path, "Loading sound configuration");
    let merged = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(Environment::with_prefix("SNDMIX").try_parsing(true))
        .build()
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    merged
        .try_deserialize()
        .map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
}
