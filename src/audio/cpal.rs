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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, span, Level};

use crate::audio::thread_priority::{
    configure_render_thread_priority, render_thread_priority, rt_audio_enabled,
};
use crate::audio::{Device as AudioDevice, Frame, Mixer, TARGET_SAMPLE_RATE};
use crate::config::MixSettings;

/// Frames rendered per producer pass.
const BLOCK_FRAMES: usize = 512;

/// Interleaved output channels.
const CHANNELS: u16 = 2;

/// Lock-free single-producer single-consumer ring of interleaved samples.
struct CircularBuffer {
    /// Backing buffer, f32 bit patterns.
    buffer: Vec<AtomicU32>,
    /// Capacity (must be power of 2)
    capacity: usize,
    /// Read position (consumer)
    read_pos: AtomicUsize,
    /// Write position (producer)
    write_pos: AtomicUsize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        // Round up to next power of 2 for efficient modulo
        let cap = capacity.next_power_of_two();
        Self {
            buffer: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            capacity: cap,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Get number of samples available to read
    #[inline]
    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read) & (self.capacity - 1)
    }

    /// Get space available to write
    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Writes as many frames as fit. Returns the number of samples written.
    fn write(&self, frames: &[Frame]) -> usize {
        let to_write = self.space().min(frames.len() * 2) & !1;
        let write = self.write_pos.load(Ordering::Relaxed);
        let mask = self.capacity - 1;

        let samples = frames.iter().flat_map(|frame| frame.iter()).take(to_write);
        for (i, sample) in samples.enumerate() {
            self.buffer[(write + i) & mask].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Converts samples into `output`. Returns number of samples actually read.
    fn read_into<T, F>(&self, output: &mut [T], convert: F) -> usize
    where
        F: Fn(f32) -> T,
    {
        let to_read = self.available().min(output.len());
        let read = self.read_pos.load(Ordering::Relaxed);
        let mask = self.capacity - 1;

        for (i, out) in output[..to_read].iter_mut().enumerate() {
            let bits = self.buffer[(read + i) & mask].load(Ordering::Relaxed);
            *out = convert(f32::from_bits(bits));
        }

        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

/// Builds the stream callback for one device sample type.
fn create_callback<T>(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: SizedSample + FromSample<f32>,
{
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        let read = ring.read_into(data, T::from_sample);
        // Zero-fill any shortfall
        data[read..].fill(T::EQUILIBRIUM);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: Arc<CircularBuffer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    device.build_output_stream(
        config,
        create_callback::<T>(ring),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

/// Owns the render and output threads that feed one cpal stream.
struct OutputManager {
    stop: Arc<AtomicBool>,
    /// Handle to the output thread (keeps the stream alive).
    output_thread: Option<thread::JoinHandle<()>>,
    /// Handle to the producer thread (fills ring buffer).
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl OutputManager {
    /// Starts rendering `mixer` to `device`.
    fn start(device: cpal::Device, mixer: Arc<Mutex<Mixer>>) -> Result<Self, Box<dyn Error>> {
        let sample_format = device.default_output_config()?.sample_format();
        let stop = Arc::new(AtomicBool::new(false));

        // Create shared circular buffer (~100ms of audio)
        let capacity_samples = (TARGET_SAMPLE_RATE as usize * CHANNELS as usize) / 10;
        let ring = Arc::new(CircularBuffer::new(capacity_samples.max(1024)));

        let priority = render_thread_priority();
        let rt_audio = rt_audio_enabled();

        // Producer thread: lock, render one block, unlock, hand it to the ring.
        let producer_thread = {
            let ring = ring.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("sndmix-render".to_string())
                .spawn(move || {
                    configure_render_thread_priority(priority, rt_audio);
                    let mut scratch = vec![[0.0f32; 2]; BLOCK_FRAMES];

                    while !stop.load(Ordering::Relaxed) {
                        if ring.space() >= BLOCK_FRAMES * CHANNELS as usize {
                            mixer.lock().render(&mut scratch);
                            ring.write(&scratch);
                        } else {
                            // Ring full, yield briefly
                            thread::sleep(Duration::from_micros(500));
                        }
                    }
                })?
        };

        // The stream is not Send, so it is created and kept on its own thread.
        let output_thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("sndmix-output".to_string())
                .spawn(move || {
                    let config = cpal::StreamConfig {
                        channels: CHANNELS,
                        sample_rate: cpal::SampleRate(TARGET_SAMPLE_RATE),
                        buffer_size: cpal::BufferSize::Default,
                    };

                    let stream_result = match sample_format {
                        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, ring),
                        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, ring),
                        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, ring),
                        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, ring),
                        other => {
                            error!(format = ?other, "Unsupported device sample format");
                            return;
                        }
                    };

                    match stream_result {
                        Ok(stream) => {
                            if let Err(e) = stream.play() {
                                error!("Failed to start CPAL stream: {}", e);
                                return;
                            }
                            info!("CPAL output stream started successfully");

                            while !stop.load(Ordering::Relaxed) {
                                thread::sleep(Duration::from_millis(100));
                            }
                        }
                        Err(e) => {
                            error!("Failed to create CPAL stream: {}", e);
                        }
                    }
                })?
        };

        Ok(OutputManager {
            stop,
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        })
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        // Wait for threads to finish
        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// A small wrapper around a cpal::Device that owns the mixer it plays.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    mixer: Arc<Mutex<Mixer>>,
    /// Present once the device is opened for output.
    output_manager: Option<OutputManager>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        let settings = MixSettings::default();
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|(host_id, name, max_channels, _)| {
                let device: Box<dyn AudioDevice> = Box::new(Device {
                    name,
                    max_channels,
                    host_id,
                    mixer: Arc::new(Mutex::new(Mixer::new(&settings))),
                    output_manager: None,
                });
                device
            })
            .collect())
    }

    /// Lists stereo-capable cpal output devices.
    fn list_cpal_devices() -> Result<Vec<(cpal::HostId, String, u16, cpal::Device)>, Box<dyn Error>>
    {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels >= CHANNELS {
                    let Ok(name) = device.name() else {
                        continue;
                    };
                    devices.push((host_id, name, max_channels, device));
                }
            }
        }

        devices.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(devices)
    }

    /// Opens the given cpal device and starts rendering to it. "default" selects the
    /// default host's default output.
    pub fn get(name: &str, settings: &MixSettings) -> Result<Device, Box<dyn Error>> {
        let span = span!(Level::INFO, "open device (cpal)");
        let _enter = span.enter();

        let (host_id, name, max_channels, device) = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let name = device.name()?;
            (host.id(), name, CHANNELS, device)
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|(_, device_name, _, _)| device_name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let mixer = Arc::new(Mutex::new(Mixer::new(settings)));
        let output_manager = OutputManager::start(device, mixer.clone())?;
        info!(device = name, host = host_id.name(), "Opened output device.");

        Ok(Device {
            name,
            max_channels,
            host_id,
            mixer,
            output_manager: Some(output_manager),
        })
    }

    /// Whether the device is rendering.
    pub fn is_open(&self) -> bool {
        self.output_manager.is_some()
    }
}

impl AudioDevice for Device {
    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock()
    }
}
