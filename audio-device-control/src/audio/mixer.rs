//! Mixer audio API seam (XP).
//!
//! Every mixer device exposes user-controllable lines. On a recording mixer
//! one line is usually the active one ("selected"); some hardware exposes a
//! single line with no select control at all.

use super::capture::{CaptureFormat, SampleBuffer};
use super::device::{AudioError, DataFlow};

/// A mixer device: the legacy notion of a device interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerDevice {
    /// Mixer device id (index into the system mixer list)
    pub id: u32,

    /// Mixer name (e.g. "Realtek HD Audio Input")
    pub name: String,
}

impl MixerDevice {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A user-controllable mixer line.
pub trait MixerLine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the mixer exposes a select control for this line.
    fn contains_selected(&self) -> bool;

    /// Whether this line is the active one. `false` without a select control.
    fn is_selected(&self) -> Result<bool, AudioError>;

    /// Make this line the active one.
    fn select(&self) -> Result<(), AudioError>;

    /// Whether the line has a mute control.
    fn contains_mute(&self) -> bool;

    /// Mute state. `false` without a mute control.
    fn mute(&self) -> Result<bool, AudioError>;

    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;

    /// Native volume in `0..=volume_max()`.
    fn volume(&self) -> Result<u32, AudioError>;

    fn volume_max(&self) -> u32;

    fn set_volume(&self, value: u32) -> Result<(), AudioError>;
}

/// Mixer enumeration and raw capture access.
pub trait MixerApi: Send + Sync {
    /// Mixer devices exposing the given direction, in device-id order.
    fn devices(&self, flow: DataFlow) -> Result<Vec<MixerDevice>, AudioError>;

    /// The default mixer device of the given direction.
    fn default_device(&self, flow: DataFlow) -> Result<Option<MixerDevice>, AudioError>;

    /// User lines of a mixer device.
    fn lines(&self, flow: DataFlow, device_id: u32) -> Result<Vec<Box<dyn MixerLine>>, AudioError>;

    /// Open and start a raw capture buffer on the capture device whose
    /// description matches `device_name`. `None` if no such device exists.
    fn open_capture_buffer(
        &self,
        device_name: &str,
        format: &CaptureFormat,
    ) -> Result<Option<Box<dyn SampleBuffer>>, AudioError>;
}
