//! Audio device data models.
//!
//! Defines the core data structures for representing device lines, the
//! selected device pair, the signal direction, and the error taxonomy shared
//! by every backend.

use thiserror::Error;

/// Signal direction of a device (maps to Windows EDataFlow / mixer type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFlow {
    /// Recording devices (microphone, line-in)
    Capture,

    /// Playback devices (speakers, headphones)
    Render,
}

impl std::fmt::Display for DataFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFlow::Capture => f.write_str("capture"),
            DataFlow::Render => f.write_str("render"),
        }
    }
}

/// A selectable signal path on a device interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceLine {
    /// Selector key passed back to `set_capture_device` / `set_render_device`
    pub line_name: String,

    /// Secondary display name supplied by the backend. On the mixer backend
    /// this duplicates the interface name.
    pub friendly_name: String,

    /// Whether this line individually supports mute
    pub mutable: bool,
}

impl DeviceLine {
    /// Create a new DeviceLine.
    pub fn new(line_name: impl Into<String>, friendly_name: impl Into<String>, mutable: bool) -> Self {
        Self {
            line_name: line_name.into(),
            friendly_name: friendly_name.into(),
            mutable,
        }
    }
}

/// The (interface, line) pair a backend is currently bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    /// Device interface name (e.g. adapter name)
    pub interface: String,

    /// Line name on that interface
    pub line: String,
}

impl DeviceSelection {
    /// Create a new selection pair.
    pub fn new(interface: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            line: line.into(),
        }
    }

    /// The empty pair, returned when nothing is bound.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.interface.is_empty() && self.line.is_empty()
    }
}

/// Audio device control error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio device control is not supported on this platform")]
    PlatformUnsupported,

    #[error("The {interface} device interface was not found")]
    DeviceInterfaceNotFound { interface: String },

    #[error("The {line} device line was not found for the {interface} interface")]
    DeviceLineNotFound { interface: String, line: String },

    #[error("The {line} device line of the {interface} interface is unselectable")]
    DeviceLineUnselectable { interface: String, line: String },

    #[error("No device line detected for the {interface} device interface")]
    NoDeviceLines { interface: String },

    #[error("No {flow} device is selected")]
    NoDeviceSelected { flow: DataFlow },

    #[error("{operation} is not implemented by this backend")]
    NotImplemented { operation: &'static str },

    #[error("Native audio call failed: {0}")]
    Native(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsError(#[from] windows::core::Error),
}

impl AudioError {
    pub(crate) fn interface_not_found(interface: &str) -> Self {
        AudioError::DeviceInterfaceNotFound {
            interface: interface.to_string(),
        }
    }

    pub(crate) fn line_not_found(interface: &str, line: &str) -> Self {
        AudioError::DeviceLineNotFound {
            interface: interface.to_string(),
            line: line.to_string(),
        }
    }

    pub(crate) fn line_unselectable(interface: &str, line: &str) -> Self {
        AudioError::DeviceLineUnselectable {
            interface: interface.to_string(),
            line: line.to_string(),
        }
    }
}
