//! Backend for platforms with no supported audio stack.
//!
//! Every operation fails with [`AudioError::PlatformUnsupported`].

use crate::audio::{AudioDeviceControl, AudioError, DeviceRegistry, DeviceSelection};

/// Stub backend bound on unrecognized platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }
}

fn unsupported<T>() -> Result<T, AudioError> {
    Err(AudioError::PlatformUnsupported)
}

impl AudioDeviceControl for UnsupportedBackend {
    fn get_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        unsupported()
    }

    fn get_windows_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        unsupported()
    }

    fn get_capture_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        unsupported()
    }

    fn get_render_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        unsupported()
    }

    fn set_capture_device(&self, _interface: &str, _line: &str) -> Result<(), AudioError> {
        unsupported()
    }

    fn set_render_device(&self, _interface: &str, _line: &str) -> Result<(), AudioError> {
        unsupported()
    }

    fn get_capture_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn get_render_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn set_capture_volume(&self, _volume: i32) -> Result<i32, AudioError> {
        unsupported()
    }

    fn set_render_volume(&self, _volume: i32) -> Result<i32, AudioError> {
        unsupported()
    }

    fn increment_capture_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn increment_render_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn decrement_capture_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn decrement_render_volume(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn toggle_capture_mute(&self) -> Result<bool, AudioError> {
        unsupported()
    }

    fn toggle_render_mute(&self) -> Result<bool, AudioError> {
        unsupported()
    }

    fn set_capture_mute(&self, _mute: bool) -> Result<bool, AudioError> {
        unsupported()
    }

    fn set_render_mute(&self, _mute: bool) -> Result<bool, AudioError> {
        unsupported()
    }

    fn get_capture_mute_status(&self) -> Result<bool, AudioError> {
        unsupported()
    }

    fn get_render_mute_status(&self) -> Result<bool, AudioError> {
        unsupported()
    }

    fn get_capture_device_master_peak_value(&self) -> Result<i32, AudioError> {
        unsupported()
    }

    fn dispose_capture_device_master_peak_value(&self) -> Result<(), AudioError> {
        unsupported()
    }

    fn get_render_device_master_peak_value(&self) -> Result<i32, AudioError> {
        unsupported()
    }
}
