//! Audio Device Control - Library
//!
//! One capability interface over two generations of the Windows audio stack.
//!
//! ## Features
//!
//! - Enumerate capture/render device interfaces and their selectable lines
//! - Select the active capture and render device by interface and line name
//! - Read and set master volume on a normalized 0-100 scale
//! - Toggle and set mute
//! - Sample a real-time peak (VU) meter for the selected capture device
//!
//! The backend is chosen once, when [`AudioDeviceFacade`] is built: Vista and
//! later bind the per-endpoint backend, XP binds the mixer backend, and any
//! other platform binds a backend that fails every call with
//! [`AudioError::PlatformUnsupported`].

pub mod audio;
pub mod backend;
pub mod config;
pub mod facade;
pub mod platform;

#[cfg(test)]
pub(crate) mod testing;

pub use audio::{AudioDeviceControl, AudioError, DataFlow, DeviceLine, DeviceRegistry, DeviceSelection};
pub use backend::{AudioBackend, LegacyBackend, ModernBackend, UnsupportedBackend};
pub use config::ControlConfig;
pub use facade::{AudioDeviceFacade, NativeStack, SystemNatives};
pub use platform::{PlatformKind, PlatformProbe, SystemProbe};
