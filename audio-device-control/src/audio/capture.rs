//! Audio capture and peak metering.
//!
//! A [`PeakSession`] owns the native capture resource that keeps the
//! selected capture path live for metering. It is acquired lazily on the first
//! peak read after (re)selection and released on disposal or re-selection.
//! Backends keep it behind the same mutex as capture-device switching.

use super::device::AudioError;
use tracing::{debug, warn};

/// Largest 16-bit sample magnitude.
pub const MAX_SAMPLE_VALUE: i32 = 32768;

/// A running native capture stream.
pub trait CaptureStream: Send {
    /// Whether the stream is currently capturing.
    fn is_capturing(&self) -> bool;

    /// Stop capturing. Dropping the stream releases the native resource.
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// One interleaved 16-bit stereo frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoFrame {
    pub left: i16,
    pub right: i16,
}

impl StereoFrame {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }
}

/// A raw capture buffer that can be sampled directly.
pub trait SampleBuffer: CaptureStream {
    /// Fill `frames` with the most recent frames, starting at the read cursor.
    fn read_latest(&mut self, frames: &mut [StereoFrame]) -> Result<(), AudioError>;
}

/// PCM format of a raw capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Bits per sample
    pub bits_per_sample: u16,

    /// Number of interleaved channels
    pub channels: u16,

    /// Number of frames the buffer holds
    pub frames: usize,
}

impl CaptureFormat {
    /// Bytes per frame.
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn average_bytes_per_second(&self) -> u32 {
        u32::from(self.block_align()) * self.sample_rate
    }

    /// Total buffer size in bytes.
    pub fn buffer_bytes(&self) -> u32 {
        (self.frames * usize::from(self.block_align())) as u32
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rate_khz = self.sample_rate as f64 / 1000.0;
        if rate_khz.fract() == 0.0 {
            write!(f, "{}kHz/{}-bit/{}ch", rate_khz as u32, self.bits_per_sample, self.channels)
        } else {
            write!(f, "{:.1}kHz/{}-bit/{}ch", rate_khz, self.bits_per_sample, self.channels)
        }
    }
}

/// Lazily acquired capture resource used for peak metering.
///
/// `None` means the session must be (re)created on the next read.
pub struct PeakSession<S: ?Sized + CaptureStream> {
    stream: Option<Box<S>>,
    opened: u64,
}

impl<S: ?Sized + CaptureStream> PeakSession<S> {
    /// Create an empty session.
    pub const fn new() -> Self {
        Self {
            stream: None,
            opened: 0,
        }
    }

    /// Whether a native resource is currently held.
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// How many times a native resource has been acquired.
    pub fn open_count(&self) -> u64 {
        self.opened
    }

    /// Return the live stream, acquiring it with `open` if absent.
    ///
    /// `open` may return `Ok(None)` when no native resource is available;
    /// the session then stays empty and is retried on the next call.
    pub fn get_or_open<F>(&mut self, open: F) -> Result<Option<&mut S>, AudioError>
    where
        F: FnOnce() -> Result<Option<Box<S>>, AudioError>,
    {
        if self.stream.is_none() {
            self.stream = open()?;
            if self.stream.is_some() {
                self.opened += 1;
                debug!("Peak session opened (#{})", self.opened);
            }
        }
        Ok(self.stream.as_deref_mut())
    }

    /// Stop and release the native resource. No-op if none is held.
    pub fn dispose(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if stream.is_capturing() {
                if let Err(e) = stream.stop() {
                    warn!("Failed to stop peak capture stream: {}", e);
                }
            }
            debug!("Peak session disposed");
        }
    }
}

impl<S: ?Sized + CaptureStream> Default for PeakSession<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + CaptureStream> Drop for PeakSession<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Peak level (0-100) of one block of stereo frames.
///
/// Each channel is averaged over the block, the two channel magnitudes are
/// averaged, and the result is scaled against the largest sample magnitude.
pub fn block_peak_percent(frames: &[StereoFrame]) -> i32 {
    if frames.is_empty() {
        return 0;
    }
    let count = frames.len() as i64;
    let (left_sum, right_sum) = frames.iter().fold((0i64, 0i64), |(l, r), frame| {
        (l + i64::from(frame.left), r + i64::from(frame.right))
    });
    let left = (left_sum / count).abs();
    let right = (right_sum / count).abs();
    let master = (left + right) / 2;
    ((master * 100) / i64::from(MAX_SAMPLE_VALUE)).min(100) as i32
}
