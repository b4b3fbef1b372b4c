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
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::audio::Frame;
use crate::config::PanSettings;

/// Unity gain for the pan/volume stage.
pub const UNITY_VOLUME: i32 = 256;

/// Highest volume and per-side gain the pan/volume stage accepts.
pub const MAX_VOLUME: i32 = 512;

/// A world coordinate that a voice pans relative to, updated by the application
/// while the voice plays.
#[derive(Debug, Clone, Default)]
pub struct WorldPosition(Arc<AtomicU32>);

impl WorldPosition {
    pub fn new(x: f32) -> Self {
        WorldPosition(Arc::new(AtomicU32::new(x.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, x: f32) {
        self.0.store(x.to_bits(), Ordering::Relaxed);
    }
}

/// Per-voice stereo volume and panning.
///
/// Holds no per-sample memory. Control calls mutate it under the mixer lock.
#[derive(Debug, Clone)]
pub struct PanVolumeEffect {
    volume: i32,
    /// Scale applied to the world position for relative panning.
    origin: f32,
    /// Pan offset, already multiplied by `origin`.
    pan: f32,
    position: Option<WorldPosition>,
    settings: PanSettings,
}

impl PanVolumeEffect {
    /// Full volume, centered.
    pub fn new(settings: PanSettings) -> Self {
        PanVolumeEffect {
            volume: UNITY_VOLUME,
            origin: 0.0,
            pan: 0.0,
            position: None,
            settings,
        }
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, MAX_VOLUME);
    }

    /// Sets the pan offset `pan`, scaled by `origin`. With a world position the pan is
    /// relative to it, otherwise it is absolute.
    pub fn set_pan(&mut self, pan: f32, origin: f32, position: Option<WorldPosition>) {
        self.origin = origin;
        self.pan = pan * origin;
        self.position = position;
    }

    pub fn set_settings(&mut self, settings: PanSettings) {
        self.settings = settings;
    }

    /// Computes the (left, right) gains, each in [0, 512].
    pub fn gains(&self) -> (i32, i32) {
        let volume = self.volume as f32;
        let PanSettings {
            stereo_effects,
            panning_range,
            xmin,
            xmax,
        } = self.settings;
        let width = xmax - xmin;

        let ratio = match &self.position {
            _ if !stereo_effects || width == 0.0 => None,
            Some(position) => Some(((xmax - self.origin * position.get()) - self.pan) / width),
            None if self.pan != 0.0 => Some((width / 2.0 - self.pan) / width),
            None => None,
        };
        let Some(ratio) = ratio else {
            return (self.volume, self.volume);
        };

        let scale = panning_range / 100.0;
        let offset = (100.0 - panning_range) / 200.0;
        let left = volume * 2.0 * (ratio * scale + offset);
        let right = volume * 2.0 * ((1.0 - ratio) * scale + offset);
        (clamp_gain(left), clamp_gain(right))
    }

    /// Applies the gains in place.
    pub fn process(&self, frames: &mut [Frame]) {
        let (left, right) = self.gains();
        if left == UNITY_VOLUME && right == UNITY_VOLUME {
            return;
        }
        let left = left as f32 / UNITY_VOLUME as f32;
        let right = right as f32 / UNITY_VOLUME as f32;
        for frame in frames.iter_mut() {
            frame[0] *= left;
            frame[1] *= right;
        }
    }
}

fn clamp_gain(gain: f32) -> i32 {
    if gain.is_nan() {
        return 0;
    }
    (gain as i32).clamp(0, MAX_VOLUME)
}

/// Music volume as a base-2 exponent, with a silent fast path.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeControl {
    volume: f32,
    silent: bool,
}

impl VolumeControl {
    pub fn new(volume: f32, silent: bool) -> Self {
        VolumeControl { volume, silent }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn set(&mut self, volume: f32, silent: bool) {
        self.volume = volume;
        self.silent = silent;
    }

    pub fn process(&self, frames: &mut [Frame]) {
        if self.silent {
            frames.fill([0.0, 0.0]);
            return;
        }
        if self.volume == 0.0 {
            return;
        }
        let gain = self.volume.exp2();
        for frame in frames.iter_mut() {
            frame[0] *= gain;
            frame[1] *= gain;
        }
    }
}
