//! Platform module: OS identification and the Windows implementations of
//! the native audio seams.

mod probe;

#[cfg(windows)]
pub mod windows;

pub use probe::{windows_release, PlatformKind, PlatformProbe, SystemProbe};
