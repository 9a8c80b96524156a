//! Entry point: probes the platform once and binds the matching backend.

use crate::audio::endpoint::EndpointApi;
use crate::audio::mixer::MixerApi;
use crate::audio::AudioError;
use crate::backend::{AudioBackend, LegacyBackend, ModernBackend, UnsupportedBackend};
use crate::config::ControlConfig;
use crate::platform::{PlatformKind, PlatformProbe, SystemProbe};
use tracing::info;

/// Factory for the native audio stacks a backend is built on.
///
/// Only the stack of the bound backend is ever requested.
pub trait NativeStack {
    /// Per-endpoint APIs, for the modern backend.
    fn endpoint_api(&self) -> Result<Box<dyn EndpointApi>, AudioError>;

    /// Mixer APIs, for the legacy backend.
    fn mixer_api(&self) -> Result<Box<dyn MixerApi>, AudioError>;
}

/// The native stacks of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNatives;

#[cfg(windows)]
impl NativeStack for SystemNatives {
    fn endpoint_api(&self) -> Result<Box<dyn EndpointApi>, AudioError> {
        Ok(Box::new(crate::platform::windows::WasapiEndpoints::new()?))
    }

    fn mixer_api(&self) -> Result<Box<dyn MixerApi>, AudioError> {
        Ok(Box::new(crate::platform::windows::WinMmMixers::new()))
    }
}

#[cfg(not(windows))]
impl NativeStack for SystemNatives {
    fn endpoint_api(&self) -> Result<Box<dyn EndpointApi>, AudioError> {
        Err(AudioError::PlatformUnsupported)
    }

    fn mixer_api(&self) -> Result<Box<dyn MixerApi>, AudioError> {
        Err(AudioError::PlatformUnsupported)
    }
}

/// Audio device control for the running platform.
///
/// The platform is probed once, at construction; the bound backend never
/// changes afterwards.
#[derive(Debug)]
pub struct AudioDeviceFacade {
    operating_system: String,
    backend: AudioBackend,
}

impl AudioDeviceFacade {
    /// Probe the running system and bind its backend, configured from the
    /// environment.
    ///
    /// On Windows, COM must already be initialized on the calling thread.
    pub fn new() -> Result<Self, AudioError> {
        Self::with_natives(&SystemProbe, &SystemNatives, ControlConfig::from_env())
    }

    /// Bind a backend using an explicit probe and native stacks.
    pub fn with_natives(
        probe: &dyn PlatformProbe,
        natives: &dyn NativeStack,
        config: ControlConfig,
    ) -> Result<Self, AudioError> {
        let operating_system = probe.operating_system();
        let kind = PlatformKind::from_identifier(&operating_system);

        let backend = match kind {
            PlatformKind::Modern => ModernBackend::new(natives.endpoint_api()?, config)?.into(),
            PlatformKind::Legacy => LegacyBackend::new(natives.mixer_api()?, config)?.into(),
            PlatformKind::Unsupported => UnsupportedBackend::new().into(),
        };

        info!("Platform {:?} bound the {} backend", operating_system, kind);
        Ok(Self {
            operating_system,
            backend,
        })
    }

    /// The bound backend.
    pub fn audio_device_control(&self) -> &AudioBackend {
        &self.backend
    }

    /// Take ownership of the bound backend.
    pub fn into_audio_device_control(self) -> AudioBackend {
        self.backend
    }

    /// Backend family bound at construction.
    pub fn platform(&self) -> PlatformKind {
        self.backend.kind()
    }

    /// Platform identifier reported by the probe.
    pub fn operating_system(&self) -> &str {
        &self.operating_system
    }
}
