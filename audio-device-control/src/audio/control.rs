//! The audio device capability interface.
//!
//! Implemented identically by every backend. All calls are synchronous and
//! may block on the native audio stack. Volumes are on the canonical 0-100
//! scale.

use super::device::{AudioError, DeviceSelection};
use super::registry::DeviceRegistry;

/// Capability interface shared by all backends.
///
/// Thread safety: capture-device switching and peak-session
/// creation/read/disposal are serialized by a per-backend lock. Volume and
/// mute calls are not, and may act on a device that a concurrent
/// `set_capture_device` is replacing.
pub trait AudioDeviceControl: Send + Sync {
    /// (interface, line) of the bound capture device; empty if none is bound.
    fn get_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError>;

    /// (interface, line) of the OS default capture device. Does not change
    /// this object's selection.
    fn get_windows_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError>;

    /// Fresh enumeration of capture interfaces and their lines.
    fn get_capture_devices_info(&self) -> Result<DeviceRegistry, AudioError>;

    /// Fresh enumeration of render interfaces and their lines.
    fn get_render_devices_info(&self) -> Result<DeviceRegistry, AudioError>;

    /// Bind the capture device. Tears down the peak session on success.
    fn set_capture_device(&self, interface: &str, line: &str) -> Result<(), AudioError>;

    fn set_render_device(&self, interface: &str, line: &str) -> Result<(), AudioError>;

    fn get_capture_volume(&self) -> Result<i32, AudioError>;

    fn get_render_volume(&self) -> Result<i32, AudioError>;

    /// Clamp `volume` to 0-100, apply it, and return the resulting volume.
    fn set_capture_volume(&self, volume: i32) -> Result<i32, AudioError>;

    /// Clamp `volume` to 0-100, apply it, and return the resulting volume.
    fn set_render_volume(&self, volume: i32) -> Result<i32, AudioError>;

    /// Step the volume up, saturating at 100.
    fn increment_capture_volume(&self) -> Result<i32, AudioError>;

    fn increment_render_volume(&self) -> Result<i32, AudioError>;

    /// Step the volume down, saturating at 0.
    fn decrement_capture_volume(&self) -> Result<i32, AudioError>;

    fn decrement_render_volume(&self) -> Result<i32, AudioError>;

    /// Flip mute and return the resulting state. A line without mute keeps
    /// its state.
    fn toggle_capture_mute(&self) -> Result<bool, AudioError>;

    fn toggle_render_mute(&self) -> Result<bool, AudioError>;

    /// Set mute and return the resulting state.
    fn set_capture_mute(&self, mute: bool) -> Result<bool, AudioError>;

    fn set_render_mute(&self, mute: bool) -> Result<bool, AudioError>;

    fn get_capture_mute_status(&self) -> Result<bool, AudioError>;

    fn get_render_mute_status(&self) -> Result<bool, AudioError>;

    /// Instantaneous capture level (0-100). Opens the peak session if absent.
    fn get_capture_device_master_peak_value(&self) -> Result<i32, AudioError>;

    /// Release the peak session. Safe to call when none exists.
    fn dispose_capture_device_master_peak_value(&self) -> Result<(), AudioError>;

    /// Instantaneous render level (0-100).
    fn get_render_device_master_peak_value(&self) -> Result<i32, AudioError>;
}
