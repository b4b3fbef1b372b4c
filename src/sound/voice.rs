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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::audio::effect::{PanVolumeEffect, WorldPosition};
use crate::audio::sample_source::{LoopCount, LoopedSource, Transcoder};
use crate::audio::{Device, GainStage, Pipeline, StreamId, TARGET_SAMPLE_RATE};
use crate::config::MixSettings;

use super::SoundAsset;

/// Upper bound on the number of voices in a pool.
pub const MAX_VOICES: usize = 256;

/// One voice slot: the asset it plays and the pipeline registered for it.
pub struct PlaybackVoice {
    index: usize,
    device: Arc<dyn Device>,
    settings: MixSettings,
    asset: Option<Arc<SoundAsset>>,
    looping: bool,
    /// Read position of the replay, published by the render thread.
    cursor: Option<Arc<AtomicUsize>>,
    stream: Option<StreamId>,
}

impl PlaybackVoice {
    fn new(index: usize, device: Arc<dyn Device>, settings: MixSettings) -> Self {
        PlaybackVoice {
            index,
            device,
            settings,
            asset: None,
            looping: false,
            cursor: None,
            stream: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn asset(&self) -> Option<&Arc<SoundAsset>> {
        self.asset.as_ref()
    }

    /// Starts playing the asset at full volume, centered. `frequency_multiplier` shifts the
    /// pitch through the resampler; values at or below zero play at the native pitch.
    /// Returns false without touching the voice if there is no asset.
    pub fn play(
        &mut self,
        asset: Option<&Arc<SoundAsset>>,
        looping: bool,
        frequency_multiplier: f32,
    ) -> bool {
        self.play_with(asset, looping, frequency_multiplier, |_| {})
    }

    /// Like [`play`](Self::play), but `setup` configures the pan/volume stage before the
    /// pipeline joins the mix, so the first rendered block already carries it.
    pub fn play_with(
        &mut self,
        asset: Option<&Arc<SoundAsset>>,
        looping: bool,
        frequency_multiplier: f32,
        setup: impl FnOnce(&mut PanVolumeEffect),
    ) -> bool {
        let Some(asset) = asset else {
            return false;
        };
        if self.asset.is_some() {
            self.stop();
        }

        let multiplier = if frequency_multiplier > 0.0 {
            frequency_multiplier as f64
        } else {
            1.0
        };
        let transcoder =
            match Transcoder::new(asset.sample_rate(), TARGET_SAMPLE_RATE as f64 / multiplier) {
                Ok(transcoder) => transcoder,
                Err(e) => {
                    warn!(voice = self.index, err = %e, "Unable to play sound.");
                    return false;
                }
            };

        let mut effect = PanVolumeEffect::new(self.settings.pan());
        setup(&mut effect);

        let replay = asset.replay();
        let cursor = replay.cursor();
        let pipeline = Pipeline::new(
            Box::new(LoopedSource::new(replay, LoopCount::from_flag(looping))),
            GainStage::PanVolume(effect),
            transcoder,
        );

        self.stream = Some(self.device.register(pipeline));
        self.asset = Some(asset.clone());
        self.looping = looping;
        self.cursor = Some(cursor);
        true
    }

    /// Starves the pipeline and frees the slot. Safe to call on a stopped voice.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.device.lock().starve(stream);
        }
        self.release();
    }

    /// Frees the slot and leaves whatever the pipeline still has buffered to drain.
    fn release(&mut self) {
        self.asset = None;
        self.cursor = None;
        self.looping = false;
    }

    fn with_effect(&self, apply: impl FnOnce(&mut PanVolumeEffect)) {
        let Some(stream) = self.stream else {
            return;
        };
        let mut mixer = self.device.lock();
        if let Some(effect) = mixer
            .pipeline_mut(stream)
            .and_then(|pipeline| pipeline.pan_volume_mut())
        {
            apply(effect);
        }
    }

    /// Sets the volume, 0 to 512 with 256 as unity.
    pub fn set_volume(&self, volume: i32) {
        self.with_effect(|effect| effect.set_volume(volume));
    }

    /// Sets the pan. With a position the pan follows it, otherwise it is absolute.
    pub fn set_pan(&self, pan: f32, origin: f32, position: Option<WorldPosition>) {
        self.with_effect(|effect| effect.set_pan(pan, origin, position));
    }

    /// True while an asset is bound, even if its playback has already run out.
    pub fn is_playing(&self) -> bool {
        self.asset.is_some()
    }

    /// Whether a bound, non-looping replay has reached the end of its asset.
    fn is_finished(&self) -> bool {
        match (&self.asset, &self.cursor) {
            (Some(asset), Some(cursor)) => {
                !self.looping && cursor.load(Ordering::Relaxed) >= asset.len()
            }
            _ => false,
        }
    }

    fn apply_settings(&mut self, settings: MixSettings) {
        self.settings = settings;
        self.with_effect(|effect| effect.set_settings(settings.pan()));
    }
}

/// Index-addressed voice slots, at most [`MAX_VOICES`].
pub struct VoicePool {
    device: Arc<dyn Device>,
    settings: MixSettings,
    voices: Vec<PlaybackVoice>,
}

impl VoicePool {
    pub fn new(device: Arc<dyn Device>, settings: MixSettings, size: usize) -> Self {
        let mut pool = VoicePool {
            device,
            settings,
            voices: Vec::new(),
        };
        pool.grow(size);
        pool
    }

    fn grow(&mut self, size: usize) {
        let size = size.min(MAX_VOICES);
        while self.voices.len() < size {
            let voice = PlaybackVoice::new(self.voices.len(), self.device.clone(), self.settings);
            self.voices.push(voice);
        }
    }

    /// Picks a voice for a caller-addressed channel.
    ///
    /// An index of zero or more (capped at 255) names the slot: the pool grows to reach it
    /// and the slot is stopped, unless `low_priority` is set and it is busy, in which case
    /// nothing happens. A negative index picks the highest free slot of a full-size pool.
    pub fn allocate(&mut self, index: i32, low_priority: bool) -> Option<&mut PlaybackVoice> {
        if index < 0 {
            self.grow(MAX_VOICES);
            return self.voices.iter_mut().rev().find(|voice| !voice.is_playing());
        }

        let index = (index as usize).min(MAX_VOICES - 1);
        if low_priority && self.voices.get(index).is_some_and(|voice| voice.is_playing()) {
            return None;
        }
        self.grow(index + 1);
        let voice = &mut self.voices[index];
        voice.stop();
        Some(voice)
    }

    /// Picks the lowest free voice for a one-shot.
    pub fn reserve(&mut self) -> Option<&mut PlaybackVoice> {
        self.voices.iter_mut().find(|voice| !voice.is_playing())
    }

    /// Frees voices whose replay has reached the end. Called once per application frame.
    pub fn tick(&mut self) {
        for voice in self.voices.iter_mut() {
            if voice.is_finished() {
                voice.release();
            }
        }
    }

    /// Grows with empty slots or stops and drops every slot from `size` up.
    pub fn set_size(&mut self, size: usize) {
        let size = size.min(MAX_VOICES);
        if size < self.voices.len() {
            for voice in self.voices[size..].iter_mut() {
                voice.stop();
            }
            self.voices.truncate(size);
        } else {
            self.grow(size);
        }
    }

    pub fn get(&mut self, index: usize) -> Option<&mut PlaybackVoice> {
        self.voices.get_mut(index)
    }

    /// Whether any voice is playing this asset.
    pub fn is_playing(&self, asset: &Arc<SoundAsset>) -> bool {
        self.voices.iter().any(|voice| plays(voice, asset))
    }

    /// Stops every voice playing this asset.
    pub fn stop(&mut self, asset: &Arc<SoundAsset>) {
        for voice in self.voices.iter_mut().filter(|voice| plays(voice, asset)) {
            voice.stop();
        }
    }

    pub fn stop_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn playing_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_playing()).count()
    }

    /// Hands a new settings snapshot to every voice, live ones included.
    pub fn apply_settings(&mut self, settings: MixSettings) {
        self.settings = settings;
        for voice in self.voices.iter_mut() {
            voice.apply_settings(settings);
        }
    }
}

fn plays(voice: &PlaybackVoice, asset: &Arc<SoundAsset>) -> bool {
    voice
        .asset
        .as_ref()
        .is_some_and(|bound| Arc::ptr_eq(bound, asset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;

    fn pool(size: usize) -> (Arc<mock::Device>, VoicePool) {
        let settings = MixSettings::default();
        let device = Arc::new(mock::Device::get("mock-voices", &settings));
        let pool = VoicePool::new(device.clone(), settings, size);
        (device, pool)
    }

    fn asset(len: usize) -> Arc<SoundAsset> {
        Arc::new(SoundAsset::new(vec![[0.5, 0.5]; len], TARGET_SAMPLE_RATE))
    }

    /// Plays a fresh asset at `multiplier` and counts the frames rendered until the
    /// mixer lets go of it.
    fn rendered_length(frames: usize, multiplier: f32) -> usize {
        let (device, mut pool) = pool(1);
        let sound = asset(frames);
        let voice = pool.allocate(0, false).unwrap();
        assert!(voice.play(Some(&sound), false, multiplier));

        let mut rendered = 0;
        loop {
            let live = !device.lock().is_empty();
            if !live {
                return rendered;
            }
            assert!(rendered < frames * 4, "playback never ended");
            device.render(512);
            rendered += 512;
        }
    }

    fn live_gains(device: &mock::Device, stream: StreamId) -> (i32, i32) {
        device
            .lock()
            .pipeline_mut(stream)
            .and_then(|pipeline| pipeline.pan_volume_mut())
            .map(|effect| effect.gains())
            .unwrap()
    }

    fn play(pool: &mut VoicePool, index: i32, asset: &Arc<SoundAsset>) {
        let voice = pool.allocate(index, false).unwrap();
        assert!(voice.play(Some(asset), false, 1.0));
    }

    #[test]
    fn test_auto_assign_returns_highest_free() {
        let (_device, mut pool) = pool(4);
        let sound = asset(1000);

        assert_eq!(pool.allocate(-1, false).map(|v| v.index()), Some(255));
        assert_eq!(pool.len(), MAX_VOICES);

        play(&mut pool, 255, &sound);
        play(&mut pool, 253, &sound);
        assert_eq!(pool.allocate(-1, false).map(|v| v.index()), Some(254));
    }

    #[test]
    fn test_reserve_returns_lowest_free() {
        let (_device, mut pool) = pool(4);
        let sound = asset(1000);

        assert_eq!(pool.reserve().map(|v| v.index()), Some(0));
        assert!(sound.play(&mut pool));
        assert!(sound.play(&mut pool));
        assert_eq!(pool.reserve().map(|v| v.index()), Some(2));
        assert!(pool.get(0).unwrap().is_playing());
        assert!(pool.get(1).unwrap().is_playing());
    }

    #[test]
    fn test_reserve_on_full_pool() {
        let (_device, mut pool) = pool(2);
        let sound = asset(1000);
        assert!(sound.play(&mut pool));
        assert!(sound.play(&mut pool));
        assert!(pool.reserve().is_none());
        assert!(!sound.play(&mut pool));
    }

    #[test]
    fn test_low_priority_leaves_busy_voice_alone() {
        let (device, mut pool) = pool(8);
        let sound = asset(48000);
        play(&mut pool, 3, &sound);
        let stream = pool.get(3).unwrap().stream.unwrap();

        assert!(pool.allocate(3, true).is_none());
        assert!(pool.get(3).unwrap().is_playing());
        device.render(64);
        assert!(device.lock().contains(stream));

        // A free slot is handed out even at low priority.
        assert_eq!(pool.allocate(4, true).map(|v| v.index()), Some(4));
    }

    #[test]
    fn test_explicit_allocation_stops_busy_voice() {
        let (device, mut pool) = pool(8);
        let sound = asset(48000);
        play(&mut pool, 2, &sound);

        let voice = pool.allocate(2, false).unwrap();
        assert!(!voice.is_playing());
        device.render(64);
        assert!(device.lock().is_empty());
    }

    #[test]
    fn test_explicit_index_grows_and_clamps() {
        let (_device, mut pool) = pool(2);
        assert_eq!(pool.allocate(10, false).map(|v| v.index()), Some(10));
        assert_eq!(pool.len(), 11);

        assert_eq!(pool.allocate(1000, false).map(|v| v.index()), Some(255));
        assert_eq!(pool.len(), MAX_VOICES);
    }

    #[test]
    fn test_pool_never_exceeds_bound() {
        let (_device, mut pool) = pool(0);
        let sound = asset(48000);
        for _ in 0..MAX_VOICES {
            let voice = pool.allocate(-1, false).unwrap();
            assert!(voice.play(Some(&sound), false, 1.0));
        }

        assert!(pool.allocate(-1, false).is_none());
        pool.set_size(1000);
        assert_eq!(pool.len(), MAX_VOICES);
        assert_eq!(pool.playing_count(), MAX_VOICES);
    }

    #[test]
    fn test_set_size_shrink_stops_trailing_voices() {
        let (device, mut pool) = pool(5);
        let sound = asset(48000);
        for index in 0..5 {
            play(&mut pool, index, &sound);
        }
        let kept: Vec<StreamId> = (0..2).map(|i| pool.get(i).unwrap().stream.unwrap()).collect();

        pool.set_size(2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.playing_count(), 2);

        device.render(64);
        let mixer = device.lock();
        assert_eq!(mixer.len(), 2);
        assert!(kept.iter().all(|stream| mixer.contains(*stream)));
    }

    #[test]
    fn test_tick_reclaims_finished_voices() {
        let (device, mut pool) = pool(2);
        let short = asset(100);
        let long = asset(48000);
        play(&mut pool, 0, &short);
        play(&mut pool, 1, &long);

        pool.tick();
        assert_eq!(pool.playing_count(), 2);

        device.render(256);
        pool.tick();
        assert!(!pool.get(0).unwrap().is_playing());
        assert!(pool.get(1).unwrap().is_playing());
    }

    #[test]
    fn test_tick_keeps_looping_voices() {
        let (device, mut pool) = pool(1);
        let sound = asset(100);
        let voice = pool.allocate(0, false).unwrap();
        assert!(voice.play(Some(&sound), true, 1.0));

        for _ in 0..4 {
            device.render(100);
            pool.tick();
        }
        assert!(pool.get(0).unwrap().is_playing());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (device, mut pool) = pool(1);
        let sound = asset(48000);
        play(&mut pool, 0, &sound);

        let voice = pool.get(0).unwrap();
        voice.stop();
        voice.stop();
        assert!(!voice.is_playing());
        device.render(16);
        assert!(device.lock().is_empty());
    }

    #[test]
    fn test_replay_replaces_previous_pipeline() {
        let (device, mut pool) = pool(1);
        let sound = asset(48000);
        play(&mut pool, 0, &sound);
        let voice = pool.get(0).unwrap();
        assert!(voice.play(Some(&sound), false, 1.0));

        device.render(16);
        assert_eq!(device.lock().len(), 1);
    }

    #[test]
    fn test_play_without_asset() {
        let (_device, mut pool) = pool(1);
        let voice = pool.get(0).unwrap();
        assert!(!voice.play(None, false, 1.0));
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_set_volume_reaches_live_pipeline() {
        let (device, mut pool) = pool(1);
        let sound = asset(4800);
        play(&mut pool, 0, &sound);

        pool.get(0).unwrap().set_volume(0);
        assert!(device.render(256).iter().all(|f| *f == [0.0, 0.0]));
    }

    #[test]
    fn test_frequency_multiplier_scales_playback_length() {
        let native = rendered_length(48000, 1.0);
        assert!(native.abs_diff(48000) <= 2048, "native {}", native);

        let doubled = rendered_length(48000, 2.0);
        assert!(doubled.abs_diff(24000) <= 2048, "doubled {}", doubled);

        let halved = rendered_length(48000, 0.5);
        assert!(halved.abs_diff(96000) <= 2048, "halved {}", halved);
    }

    #[test]
    fn test_non_positive_multiplier_plays_at_native_pitch() {
        let native = rendered_length(24000, 1.0);
        assert_eq!(rendered_length(24000, 0.0), native);
        assert_eq!(rendered_length(24000, -3.0), native);
    }

    #[test]
    fn test_set_pan_follows_moving_position() {
        let (device, mut pool) = pool(1);
        let sound = asset(48000);
        play(&mut pool, 0, &sound);
        let position = WorldPosition::new(0.0);

        let voice = pool.get(0).unwrap();
        voice.set_pan(0.0, 1.0, Some(position.clone()));
        let stream = voice.stream.unwrap();
        assert_eq!(live_gains(&device, stream), (256, 256));

        device.render(512);
        position.set(160.0);
        let (left, right) = live_gains(&device, stream);
        assert!(left < right, "left {} right {}", left, right);

        device.render(512);
        position.set(-160.0);
        let (left, right) = live_gains(&device, stream);
        assert!(left > right, "left {} right {}", left, right);
        assert!(device.lock().contains(stream));
    }

    #[test]
    fn test_play_with_configures_effect_before_registering() {
        let (device, mut pool) = pool(1);
        let sound = asset(48000);
        let voice = pool.allocate(0, false).unwrap();
        assert!(voice.play_with(Some(&sound), false, 1.0, |effect| {
            effect.set_volume(128);
        }));
        let stream = voice.stream.unwrap();
        assert_eq!(live_gains(&device, stream), (128, 128));
    }

    #[test]
    fn test_asset_identity() {
        let (_device, mut pool) = pool(4);
        let first = asset(48000);
        let second = asset(48000);
        assert!(first.play(&mut pool));
        assert!(first.play(&mut pool));
        assert!(second.play(&mut pool));

        assert!(pool.is_playing(&first));
        pool.stop(&first);
        assert!(!pool.is_playing(&first));
        assert!(pool.is_playing(&second));

        pool.stop_all();
        assert_eq!(pool.playing_count(), 0);
    }
}
