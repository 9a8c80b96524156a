//! Windows implementations of the native audio seams.
//!
//! COM must be initialized on every thread that calls into these types; use
//! [`ComGuard`] at the top of each thread.

pub mod dsound;
pub mod endpoints;
pub mod mixer;
pub mod version;

pub use endpoints::WasapiEndpoints;
pub use mixer::WinMmMixers;

use crate::audio::AudioError;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Join the multithreaded apartment on the current thread.
    ///
    /// A thread already in a single-threaded apartment keeps it; COM is
    /// usable either way.
    pub fn new() -> Result<Self, AudioError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { initialized: false });
        }
        hr.ok()?;
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Null-terminated UTF-16 copy of a string.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// String from a fixed-size, null-terminated UTF-16 buffer.
pub(crate) fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}
