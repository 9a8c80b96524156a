//! Operating system identification.
//!
//! The probe reports a short release identifier ("XP", "7", "10", ...) that is
//! mapped once to the backend family able to drive that release.

use std::fmt;

pub const WIN_95: &str = "95";
pub const WIN_98: &str = "98";
pub const WIN_98SE: &str = "98SE";
pub const WIN_ME: &str = "Me";
pub const WIN_NT_3_51: &str = "NT 3.51";
pub const WIN_NT_4_0: &str = "NT 4.0";
pub const WIN_2000: &str = "2000";
pub const WIN_XP: &str = "XP";
pub const WIN_VISTA: &str = "Vista";
pub const WIN_7: &str = "7";
pub const WIN_8: &str = "8";
pub const WIN_8_1: &str = "8.1";
pub const WIN_10: &str = "10";
pub const WIN_11: &str = "11";

/// First Windows 11 build; 11 still reports itself as NT 10.0.
const WIN_11_FIRST_BUILD: u32 = 22000;

/// Which backend family a platform binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKind {
    /// Per-endpoint volume and meter APIs
    Modern,

    /// Mixer and raw capture buffer APIs
    Legacy,

    /// No supported audio stack
    Unsupported,
}

impl PlatformKind {
    /// Map a release identifier to its backend family.
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier {
            WIN_XP => PlatformKind::Legacy,
            WIN_VISTA | WIN_7 | WIN_8 | WIN_8_1 | WIN_10 | WIN_11 => PlatformKind::Modern,
            _ => PlatformKind::Unsupported,
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Modern => write!(f, "modern"),
            PlatformKind::Legacy => write!(f, "legacy"),
            PlatformKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Source of the platform identifier.
pub trait PlatformProbe {
    /// Release identifier of the running OS. Unknown systems return any
    /// other string (possibly empty).
    fn operating_system(&self) -> String;
}

/// Release identifier of an NT-family version number.
pub fn windows_release(major: u32, minor: u32, build: u32) -> &'static str {
    match (major, minor) {
        (3, _) => WIN_NT_3_51,
        (4, _) => WIN_NT_4_0,
        (5, 0) => WIN_2000,
        // 5.1 is XP, 5.2 is XP x64 and Server 2003
        (5, _) => WIN_XP,
        (6, 0) => WIN_VISTA,
        (6, 1) => WIN_7,
        (6, 2) => WIN_8,
        (6, _) => WIN_8_1,
        (10, _) if build >= WIN_11_FIRST_BUILD => WIN_11,
        (10, _) => WIN_10,
        _ => "",
    }
}

/// Probe of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

#[cfg(windows)]
impl PlatformProbe for SystemProbe {
    fn operating_system(&self) -> String {
        match super::windows::version::nt_version() {
            Some(version) => windows_release(version.major, version.minor, version.build).to_string(),
            None => {
                tracing::warn!("Could not read the Windows version");
                String::new()
            }
        }
    }
}

#[cfg(not(windows))]
impl PlatformProbe for SystemProbe {
    fn operating_system(&self) -> String {
        std::env::consts::OS.to_string()
    }
}
