//! Backends: one implementation of the capability interface per generation
//! of the native audio stack.
//!
//! The set of backends is closed, so they are held in a tagged enum and
//! dispatched statically rather than boxed.

mod legacy;
mod modern;
mod unsupported;

pub use legacy::LegacyBackend;
pub use modern::ModernBackend;
pub use unsupported::UnsupportedBackend;

use crate::audio::{AudioDeviceControl, AudioError, DeviceRegistry, DeviceSelection};
use crate::platform::PlatformKind;

/// The backend bound for this platform.
pub enum AudioBackend {
    /// Per-endpoint volume and meter APIs (Vista and later)
    Modern(ModernBackend),

    /// Mixer and raw capture buffer APIs (XP)
    Legacy(LegacyBackend),

    /// No supported audio stack
    Unsupported(UnsupportedBackend),
}

impl AudioBackend {
    /// Which variant is bound.
    pub fn kind(&self) -> PlatformKind {
        match self {
            AudioBackend::Modern(_) => PlatformKind::Modern,
            AudioBackend::Legacy(_) => PlatformKind::Legacy,
            AudioBackend::Unsupported(_) => PlatformKind::Unsupported,
        }
    }

    fn inner(&self) -> &dyn AudioDeviceControl {
        match self {
            AudioBackend::Modern(backend) => backend,
            AudioBackend::Legacy(backend) => backend,
            AudioBackend::Unsupported(backend) => backend,
        }
    }
}

impl From<ModernBackend> for AudioBackend {
    fn from(backend: ModernBackend) -> Self {
        AudioBackend::Modern(backend)
    }
}

impl From<LegacyBackend> for AudioBackend {
    fn from(backend: LegacyBackend) -> Self {
        AudioBackend::Legacy(backend)
    }
}

impl From<UnsupportedBackend> for AudioBackend {
    fn from(backend: UnsupportedBackend) -> Self {
        AudioBackend::Unsupported(backend)
    }
}

impl std::fmt::Debug for AudioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AudioBackend").field(&self.kind()).finish()
    }
}

impl AudioDeviceControl for AudioBackend {
    fn get_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        self.inner().get_selected_capture_device_info()
    }

    fn get_windows_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        self.inner().get_windows_selected_capture_device_info()
    }

    fn get_capture_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.inner().get_capture_devices_info()
    }

    fn get_render_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.inner().get_render_devices_info()
    }

    fn set_capture_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        self.inner().set_capture_device(interface, line)
    }

    fn set_render_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        self.inner().set_render_device(interface, line)
    }

    fn get_capture_volume(&self) -> Result<i32, AudioError> {
        self.inner().get_capture_volume()
    }

    fn get_render_volume(&self) -> Result<i32, AudioError> {
        self.inner().get_render_volume()
    }

    fn set_capture_volume(&self, volume: i32) -> Result<i32, AudioError> {
        self.inner().set_capture_volume(volume)
    }

    fn set_render_volume(&self, volume: i32) -> Result<i32, AudioError> {
        self.inner().set_render_volume(volume)
    }

    fn increment_capture_volume(&self) -> Result<i32, AudioError> {
        self.inner().increment_capture_volume()
    }

    fn increment_render_volume(&self) -> Result<i32, AudioError> {
        self.inner().increment_render_volume()
    }

    fn decrement_capture_volume(&self) -> Result<i32, AudioError> {
        self.inner().decrement_capture_volume()
    }

    fn decrement_render_volume(&self) -> Result<i32, AudioError> {
        self.inner().decrement_render_volume()
    }

    fn toggle_capture_mute(&self) -> Result<bool, AudioError> {
        self.inner().toggle_capture_mute()
    }

    fn toggle_render_mute(&self) -> Result<bool, AudioError> {
        self.inner().toggle_render_mute()
    }

    fn set_capture_mute(&self, mute: bool) -> Result<bool, AudioError> {
        self.inner().set_capture_mute(mute)
    }

    fn set_render_mute(&self, mute: bool) -> Result<bool, AudioError> {
        self.inner().set_render_mute(mute)
    }

    fn get_capture_mute_status(&self) -> Result<bool, AudioError> {
        self.inner().get_capture_mute_status()
    }

    fn get_render_mute_status(&self) -> Result<bool, AudioError> {
        self.inner().get_render_mute_status()
    }

    fn get_capture_device_master_peak_value(&self) -> Result<i32, AudioError> {
        self.inner().get_capture_device_master_peak_value()
    }

    fn dispose_capture_device_master_peak_value(&self) -> Result<(), AudioError> {
        self.inner().dispose_capture_device_master_peak_value()
    }

    fn get_render_device_master_peak_value(&self) -> Result<i32, AudioError> {
        self.inner().get_render_device_master_peak_value()
    }
}
