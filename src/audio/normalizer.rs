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

//! Adaptive loudness normalization.
//!
//! Each stereo side runs an envelope follower that high-passes the signal, scales it by
//! the current mix gain and compresses anything that would leave [-1, 1]. The gain each
//! side ends up with is written back to a [`SharedGain`], so every normalizer holding the
//! same handle ducks together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::Frame;
use crate::config::MixSettings;

/// Gain every normalizer starts from.
pub const INITIAL_GAIN: f64 = 4.0;

/// Upper bound for the ducking gain.
pub const MAX_DUCKING_GAIN: f64 = 16.0;

/// Keeps the gain strictly positive.
const MIN_GAIN: f64 = 1e-9;

/// A mix gain shared between normalizers and readable from any thread.
///
/// Writers race on purpose: it is a control signal and the last writer wins.
#[derive(Debug)]
pub struct SharedGain(AtomicU64);

impl SharedGain {
    pub fn new(gain: f64) -> Self {
        SharedGain(AtomicU64::new(gain.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f64) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedGain {
    fn default() -> Self {
        SharedGain::new(INITIAL_GAIN)
    }
}

/// Where the shared gain comes from after each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainMode {
    /// The smaller of the two sides' adapted gains, capped at [`MAX_DUCKING_GAIN`].
    Ducking,
    /// A fixed gain that ignores the signal.
    Static(f64),
}

impl From<&MixSettings> for GainMode {
    fn from(settings: &MixSettings) -> Self {
        if settings.audio_ducking {
            GainMode::Ducking
        } else {
            GainMode::Static(settings.static_gain())
        }
    }
}

/// Envelope state for one side of the stereo signal.
#[derive(Debug, Clone, PartialEq)]
struct ChannelState {
    /// Compression ratio coefficient, kept in [0, 1].
    ratio: f64,
    /// Per-sample change applied to `ratio`.
    ratio_rate: f64,
    /// Tracks 1 / (mean |s| + 1/32).
    level: f64,
    /// Running mean of |s|.
    mean: f64,
    slow: f64,
    fast: f64,
}

impl ChannelState {
    fn new() -> Self {
        ChannelState {
            ratio: 1.0,
            ratio_rate: 0.0,
            level: 1.0,
            mean: 1.0 / 32.0,
            slow: 0.0,
            fast: 0.0,
        }
    }

    /// Runs one sample through the follower. Rewrites the sample and returns the gain
    /// this side wants for the next one.
    fn process(&mut self, gain: f64, sample: &mut f32, rate: f64) -> f64 {
        let x = *sample as f64;
        let mut gain = gain;

        self.slow += (x - self.slow) / (rate / 110.0 + 1.0);
        self.fast += (x - self.fast) / (rate / 112640.0 + 1.0);
        let mut s = (self.fast - self.slow) * gain;

        if s.abs() > 1.0 {
            gain *= s.abs().powf(-self.ratio);
            self.ratio_rate += 32.0 * (1.0 - self.ratio) / (rate + 32.0);
            s = 1f64.copysign(s);
        } else {
            let magnitude = s.abs();
            let bump = (1.0 - (1.0 - magnitude).powi(64)) * (0.5 - magnitude).powi(3);
            gain += gain
                * (self.ratio * (1.0 / 32.0 - self.mean) / self.level
                    + bump * self.level * (1.0 - self.ratio) / 32.0)
                / (rate * 2.0 / 8.0 + 1.0);
            self.ratio_rate -= (0.5 - self.mean) * self.ratio / (rate * 2.0);
        }

        self.level += (1.0 - self.level * (s.abs() + 1.0 / 32.0)) / (rate * 2.0);
        self.mean += (s.abs() - self.mean) / (rate * 2.0);
        self.ratio = (self.ratio + self.ratio_rate).clamp(0.0, 1.0);

        *sample = s as f32;

        if gain.is_finite() && gain > MIN_GAIN {
            gain
        } else {
            MIN_GAIN
        }
    }
}

/// Stateful stereo loudness normalizer.
pub struct Normalizer {
    gain: Arc<SharedGain>,
    mode: GainMode,
    left: ChannelState,
    right: ChannelState,
    sample_rate: f64,
}

impl Normalizer {
    /// Creates a normalizer with its own gain.
    pub fn new(mode: GainMode, sample_rate: u32) -> Self {
        Normalizer::with_shared_gain(Arc::new(SharedGain::default()), mode, sample_rate)
    }

    /// Creates a normalizer that reads and writes an existing shared gain.
    pub fn with_shared_gain(gain: Arc<SharedGain>, mode: GainMode, sample_rate: u32) -> Self {
        Normalizer {
            gain,
            mode,
            left: ChannelState::new(),
            right: ChannelState::new(),
            sample_rate: sample_rate.max(1) as f64,
        }
    }

    pub fn shared_gain(&self) -> Arc<SharedGain> {
        self.gain.clone()
    }

    pub fn set_mode(&mut self, mode: GainMode) {
        self.mode = mode;
    }

    /// Normalizes the frames in place.
    pub fn process(&mut self, frames: &mut [Frame]) {
        for frame in frames.iter_mut() {
            let gain = self.gain.get();
            let left = self.left.process(gain, &mut frame[0], self.sample_rate);
            let right = self.right.process(gain, &mut frame[1], self.sample_rate);
            let next = match self.mode {
                GainMode::Ducking => left.min(right).min(MAX_DUCKING_GAIN),
                GainMode::Static(gain) => gain,
            };
            self.gain.set(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;

    /// Deterministic pseudo-random samples in [-1, 1].
    fn noise(len: usize, seed: u64) -> Vec<Frame> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0) as f32
        };
        (0..len).map(|_| [next(), next()]).collect()
    }

    fn square(len: usize, period: usize) -> Vec<Frame> {
        (0..len)
            .map(|i| if (i / period) % 2 == 0 { [1.0, 1.0] } else { [-1.0, -1.0] })
            .collect()
    }

    #[test]
    fn test_output_never_exceeds_unity() {
        let mut normalizer = Normalizer::new(GainMode::Ducking, RATE);
        let mut frames = noise(96000, 7);
        frames.extend(square(48000, 40));

        normalizer.process(&mut frames);

        for frame in &frames {
            assert!(frame[0].abs() <= 1.0, "left {}", frame[0]);
            assert!(frame[1].abs() <= 1.0, "right {}", frame[1]);
        }
    }

    #[test]
    fn test_ducking_gain_stays_positive_and_capped() {
        let mut normalizer = Normalizer::new(GainMode::Ducking, RATE);
        let gain = normalizer.shared_gain();

        for seed in 0..4 {
            let mut frames = square(24000, 8 + seed as usize);
            frames.extend(noise(24000, seed));
            normalizer.process(&mut frames);

            let current = gain.get();
            assert!(current.is_finite());
            assert!(current > 0.0);
            assert!(current <= MAX_DUCKING_GAIN);
        }
    }

    #[test]
    fn test_loud_input_ducks_the_gain() {
        let mut normalizer = Normalizer::new(GainMode::Ducking, RATE);
        let mut frames = square(48000, 24);
        normalizer.process(&mut frames);
        assert!(normalizer.shared_gain().get() < INITIAL_GAIN);
    }

    #[test]
    fn test_static_gain_ignores_content() {
        let settings = MixSettings {
            audio_ducking: false,
            ..MixSettings::default()
        };
        let mode = GainMode::from(&settings);
        assert_eq!(mode, GainMode::Static(settings.static_gain()));

        let mut quiet = Normalizer::new(mode, RATE);
        let mut loud = Normalizer::new(mode, RATE);
        quiet.process(&mut vec![[0.0, 0.0]; 4800]);
        loud.process(&mut square(4800, 10));

        assert_eq!(quiet.shared_gain().get(), settings.static_gain());
        assert_eq!(loud.shared_gain().get(), settings.static_gain());
    }

    #[test]
    fn test_ducking_mode_from_settings() {
        let settings = MixSettings {
            audio_ducking: true,
            ..MixSettings::default()
        };
        assert_eq!(GainMode::from(&settings), GainMode::Ducking);
    }

    #[test]
    fn test_shared_gain_couples_normalizers() {
        let gain = Arc::new(SharedGain::default());
        let mut first = Normalizer::with_shared_gain(gain.clone(), GainMode::Static(0.25), RATE);
        let second = Normalizer::with_shared_gain(gain.clone(), GainMode::Ducking, RATE);

        first.process(&mut vec![[0.1, 0.1]; 10]);
        assert_eq!(second.shared_gain().get(), 0.25);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut normalizer = Normalizer::new(GainMode::Ducking, RATE);
        let mut frames = vec![[0.0, 0.0]; 1000];
        normalizer.process(&mut frames);
        assert!(frames.iter().all(|f| *f == [0.0, 0.0]));
    }
}
