//! Per-endpoint audio API seam (Vista and later).
//!
//! The modern backend is written against these traits. On Windows they are
//! implemented over the MMDevice / EndpointVolume APIs; tests use in-memory
//! fakes.

use super::capture::CaptureStream;
use super::device::{AudioError, DataFlow};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Placeholder for names whose lookup failed.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Longest name the legacy multimedia APIs can report.
pub const WINMM_NAME_MAX_CHARS: usize = 31;

/// An active audio endpoint.
///
/// Calls are synchronous and block on the native audio service.
pub trait AudioEndpoint: Send + Sync {
    /// Endpoint friendly name (e.g. "Microphone (Realtek Audio)"); the line name.
    fn line_name(&self) -> Result<String, AudioError>;

    /// Friendly name of the adapter exposing this endpoint; the interface name.
    fn interface_name(&self) -> Result<String, AudioError>;

    /// Master volume scalar (0.0 to 1.0).
    fn volume_scalar(&self) -> Result<f32, AudioError>;

    fn set_volume_scalar(&self, level: f32) -> Result<(), AudioError>;

    /// Raise the volume by one native step. Saturates at the maximum.
    fn volume_step_up(&self) -> Result<(), AudioError>;

    /// Lower the volume by one native step. Saturates at the minimum.
    fn volume_step_down(&self) -> Result<(), AudioError>;

    fn mute(&self) -> Result<bool, AudioError>;

    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;

    /// Master peak value (0.0 to 1.0) as aggregated by the audio engine.
    fn peak_value(&self) -> Result<f32, AudioError>;
}

/// Enumeration and stream access for endpoints.
pub trait EndpointApi: Send + Sync {
    /// Active endpoints of a direction, in enumeration order.
    fn enumerate(&self, flow: DataFlow) -> Result<Vec<Arc<dyn AudioEndpoint>>, AudioError>;

    /// The OS default endpoint (multimedia role), if any endpoint is active.
    fn default_endpoint(&self, flow: DataFlow) -> Result<Option<Arc<dyn AudioEndpoint>>, AudioError>;

    /// Open a capture stream that keeps the endpoint's meter live.
    ///
    /// `device_index` is the position of the endpoint in the capture
    /// enumeration; `None` targets the default capture endpoint.
    fn open_capture_stream(
        &self,
        device_index: Option<usize>,
        buffer: Duration,
    ) -> Result<Box<dyn CaptureStream>, AudioError>;
}

/// Interface name of an endpoint, or [`UNKNOWN_NAME`] if the lookup fails.
pub fn interface_name_or_unknown(endpoint: &dyn AudioEndpoint) -> String {
    match endpoint.interface_name() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => UNKNOWN_NAME.to_string(),
        Err(e) => {
            warn!("Device interface name lookup failed: {}", e);
            UNKNOWN_NAME.to_string()
        }
    }
}

/// Line name of an endpoint, or [`UNKNOWN_NAME`] if the lookup fails.
pub fn line_name_or_unknown(endpoint: &dyn AudioEndpoint) -> String {
    match endpoint.line_name() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => UNKNOWN_NAME.to_string(),
        Err(e) => {
            warn!("Device line name lookup failed: {}", e);
            UNKNOWN_NAME.to_string()
        }
    }
}

/// Name as reported by the legacy multimedia APIs: cut at 31 characters.
pub fn winmm_name(name: &str) -> String {
    name.chars().take(WINMM_NAME_MAX_CHARS).collect()
}
