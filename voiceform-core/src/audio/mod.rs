//! Audio capture boundary.
//!
//! Raw device capture is an external collaborator: the speech adapter only
//! sees [`SampleSource`], a pull-based supplier of 16 kHz mono i16 frames.
//! [`MicSource`] (feature `audio-cpal`) implements it over the default input
//! device; tests drive the adapter with scripted sources.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority and
//! must not allocate, block, or perform I/O. The callback therefore writes
//! into a lock-free SPSC ring; `MicSource::read` drains the ring, resamples to
//! 16 kHz on the capture-loop thread and converts to i16 there.
//!
//! `cpal::Stream` is `!Send` on Windows/macOS, so a `MicSource` must be
//! created and dropped on the same thread. The speech adapter does this by
//! invoking its source factory inside the capture `spawn_blocking` closure.

pub mod resample;
pub mod wav;

use std::sync::Arc;

use crate::error::Result;

/// Sample rate every capture source must deliver (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Pull-based supplier of 16 kHz mono PCM.
///
/// `read` fills `buf` and returns how many samples were written; `Ok(0)` means
/// "no data right now", not end-of-stream. Implementations need not be `Send`:
/// a source lives and dies on the capture-loop thread.
pub trait SampleSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;
}

/// Creates a [`SampleSource`] on the capture-loop thread.
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn SampleSource>> + Send + Sync>;

/// Ring capacity between the audio callback and the capture loop:
/// 2^22 f32 samples ≈ 87 s at 48 kHz, enough to ride out scheduling hiccups.
#[cfg(feature = "audio-cpal")]
const RING_CAPACITY: usize = 1 << 22;

/// Frames drained from the ring per `read` iteration.
#[cfg(feature = "audio-cpal")]
const DRAIN_CHUNK: usize = 960;

/// Microphone-backed [`SampleSource`] over cpal.
#[cfg(feature = "audio-cpal")]
pub struct MicSource {
    /// Kept alive so the stream is not dropped prematurely.
    _stream: cpal::Stream,
    ring: ringbuf::HeapCons<f32>,
    converter: resample::RateConverter,
    /// Converted samples waiting to be handed out by `read`.
    staged: Vec<i16>,
    scratch: Vec<f32>,
}

#[cfg(feature = "audio-cpal")]
impl MicSource {
    /// Open the system default input device.
    ///
    /// Must be called on the thread that will also drop the returned value.
    ///
    /// # Errors
    /// `VoiceformError::AudioDevice` when no input device exists, the sample
    /// format is unsupported, or the stream fails to open.
    pub fn open_default() -> Result<Self> {
        use crate::error::VoiceformError;
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use ringbuf::traits::{Producer, Split};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceformError::AudioDevice("no default input device".into()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| VoiceformError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        tracing::info!(
            device = device.name().unwrap_or_default().as_str(),
            sample_rate,
            channels,
            "opening input device"
        );

        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut producer, ring) = ringbuf::HeapRb::<f32>::new(RING_CAPACITY).split();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                let mut mix = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if channels == 1 {
                            let written = producer.push_slice(data);
                            if written < data.len() {
                                tracing::warn!(
                                    dropped = data.len() - written,
                                    "capture ring full"
                                );
                            }
                            return;
                        }
                        mixdown(data, channels, &mut mix, |s| s);
                        let written = producer.push_slice(&mix);
                        if written < mix.len() {
                            tracing::warn!(dropped = mix.len() - written, "capture ring full");
                        }
                    },
                    |err| tracing::error!("audio stream error: {err}"),
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let mut mix = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        mixdown(data, channels, &mut mix, |s| f32::from(s) / 32768.0);
                        let written = producer.push_slice(&mix);
                        if written < mix.len() {
                            tracing::warn!(dropped = mix.len() - written, "capture ring full");
                        }
                    },
                    |err| tracing::error!("audio stream error: {err}"),
                    None,
                )
            }
            fmt => {
                return Err(VoiceformError::AudioDevice(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| VoiceformError::AudioDevice(e.to_string()))?;

        stream
            .play()
            .map_err(|e| VoiceformError::AudioDevice(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            ring,
            converter: resample::RateConverter::new(sample_rate, TARGET_SAMPLE_RATE, DRAIN_CHUNK)?,
            staged: Vec::new(),
            scratch: vec![0f32; DRAIN_CHUNK],
        })
    }
}

/// Average interleaved frames down to mono, converting via `to_f32`.
#[cfg(feature = "audio-cpal")]
fn mixdown<T: Copy>(data: &[T], channels: usize, out: &mut Vec<f32>, to_f32: impl Fn(T) -> f32) {
    let frames = data.len() / channels.max(1);
    out.clear();
    out.reserve(frames);
    for frame in data.chunks_exact(channels.max(1)) {
        let sum: f32 = frame.iter().map(|s| to_f32(*s)).sum();
        out.push(sum / channels.max(1) as f32);
    }
}

#[cfg(feature = "audio-cpal")]
impl SampleSource for MicSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        use ringbuf::traits::Consumer;

        while self.staged.len() < buf.len() {
            let n = self.ring.pop_slice(&mut self.scratch);
            if n == 0 {
                break;
            }
            let converted = self.converter.convert(&self.scratch[..n]);
            self.staged.extend(
                converted
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
            );
        }

        if self.staged.is_empty() {
            return Ok(0);
        }
        let n = self.staged.len().min(buf.len());
        buf[..n].copy_from_slice(&self.staged[..n]);
        self.staged.drain(..n);
        Ok(n)
    }
}
