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

use std::path::PathBuf;

/// Failures while building the sound configuration from its YAML file and the
/// `SNDMIX_*` environment overrides.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file is missing or unreadable, or a source is not valid YAML.
    #[error("unable to read sound config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: config::ConfigError,
    },
    /// The merged sources do not map onto the sound settings.
    #[error("invalid sound config {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        source: config::ConfigError,
    },
}
