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
use std::{error::Error, fmt, sync::Arc};

use parking_lot::MutexGuard;

use crate::config::{self, MixSettings};

pub mod cpal;
pub mod effect;
pub mod mixer;
pub mod mock;
pub mod normalizer;
pub mod pipeline;
pub mod sample_source;
mod thread_priority;

pub use mixer::{Mixer, StreamId};
pub use pipeline::{GainStage, Pipeline};

/// One interleaved stereo frame.
pub type Frame = [f32; 2];

/// The rate every pipeline converts to before mixing.
pub const TARGET_SAMPLE_RATE: u32 = 48000;

/// An output that pulls the mix on its own schedule.
///
/// The lock returned by [`Device::lock`] is the one lock shared with the render path.
/// Any change to a registered pipeline must be made while holding it.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Locks the mixer.
    fn lock(&self) -> MutexGuard<'_, Mixer>;

    /// Registers a pipeline with the mix.
    fn register(&self, pipeline: Pipeline) -> StreamId {
        self.lock().add(pipeline)
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given configuration.
pub fn get_device(config: &config::Sound) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let settings = MixSettings::from(config);
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, &settings)));
    };

    Ok(Arc::new(cpal::Device::get(device, &settings)?))
}
