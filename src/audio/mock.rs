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
use std::{fmt, sync::Arc};

use parking_lot::{Mutex, MutexGuard};

use crate::audio::{Frame, Mixer};
use crate::config::MixSettings;

/// A mock device. Nothing is played; the mix is rendered on demand by the caller.
#[derive(Clone)]
pub struct Device {
    name: String,
    mixer: Arc<Mutex<Mixer>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, settings: &MixSettings) -> Device {
        Device {
            name: name.to_string(),
            mixer: Arc::new(Mutex::new(Mixer::new(settings))),
        }
    }

    /// Renders the next `frames` frames of the mix, as the output callback would.
    pub fn render(&self, frames: usize) -> Vec<Frame> {
        let mut output = vec![[0.0, 0.0]; frames];
        self.mixer.lock().render(&mut output);
        output
    }
}

impl crate::audio::Device for Device {
    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
