//! Control configuration.
//!
//! Settings are session-scoped: defaults, optionally overridden from the
//! environment at startup. Nothing is persisted.

use crate::audio::CaptureFormat;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Backend tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// Step used by the mixer backend's increment/decrement (percent)
    pub volume_unit: i32,

    /// Frames per peak-meter read on the raw capture buffer
    pub peak_block_frames: usize,

    /// Sample rate of the raw capture buffer in Hz
    pub capture_sample_rate: u32,

    /// Bits per sample of the raw capture buffer
    pub capture_bits_per_sample: u16,

    /// Channels of the raw capture buffer (peak metering reads stereo)
    pub capture_channels: u16,

    /// Buffer duration of the capture stream that keeps an endpoint's meter live
    pub stream_buffer: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            volume_unit: 1,
            peak_block_frames: 8,
            capture_sample_rate: 44100,
            capture_bits_per_sample: 16,
            capture_channels: 2,
            stream_buffer: Duration::from_millis(100),
        }
    }
}

impl ControlConfig {
    const VOLUME_UNIT_VAR: &'static str = "AUDIO_CONTROL_VOLUME_UNIT";
    const PEAK_BLOCK_FRAMES_VAR: &'static str = "AUDIO_CONTROL_PEAK_BLOCK_FRAMES";
    const SAMPLE_RATE_VAR: &'static str = "AUDIO_CONTROL_SAMPLE_RATE";
    const STREAM_BUFFER_MS_VAR: &'static str = "AUDIO_CONTROL_STREAM_BUFFER_MS";

    /// Load from the process environment, keeping defaults for anything
    /// missing or invalid.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let volume_unit = read_or(&lookup, Self::VOLUME_UNIT_VAR, defaults.volume_unit);
        let peak_block_frames =
            read_or(&lookup, Self::PEAK_BLOCK_FRAMES_VAR, defaults.peak_block_frames);
        let capture_sample_rate =
            read_or(&lookup, Self::SAMPLE_RATE_VAR, defaults.capture_sample_rate);
        let stream_buffer_ms = read_or(
            &lookup,
            Self::STREAM_BUFFER_MS_VAR,
            defaults.stream_buffer.as_millis() as u64,
        );

        Self {
            volume_unit,
            peak_block_frames,
            capture_sample_rate,
            stream_buffer: Duration::from_millis(stream_buffer_ms),
            ..defaults
        }
        .sanitized()
    }

    /// Pull every field back into its valid range.
    pub fn sanitized(mut self) -> Self {
        self.volume_unit = self.volume_unit.clamp(1, 100);
        self.peak_block_frames = self.peak_block_frames.max(1);
        if self.capture_sample_rate == 0 {
            self.capture_sample_rate = Self::default().capture_sample_rate;
        }
        if self.stream_buffer.is_zero() {
            self.stream_buffer = Self::default().stream_buffer;
        }
        self
    }

    /// Format of the raw capture buffer used for peak metering.
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.capture_sample_rate,
            bits_per_sample: self.capture_bits_per_sample,
            channels: self.capture_channels,
            frames: self.peak_block_frames,
        }
    }
}

fn read_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid value {:?} for {}", raw, key);
                default
            }
        },
    }
}
