//! Audio module: the capability interface, its data model, and the native
//! seams each backend is written against.
//!
//! Nothing in here talks to the OS directly; the Windows implementations of
//! the seams live in `platform::windows`.

pub mod capture;
pub mod control;
pub mod device;
pub mod endpoint;
pub mod mixer;
pub mod registry;
pub mod volume;

pub use capture::{CaptureFormat, CaptureStream, PeakSession, SampleBuffer, StereoFrame};
pub use control::AudioDeviceControl;
pub use device::{AudioError, DataFlow, DeviceLine, DeviceSelection};
pub use endpoint::{AudioEndpoint, EndpointApi};
pub use mixer::{MixerApi, MixerDevice, MixerLine};
pub use registry::DeviceRegistry;
