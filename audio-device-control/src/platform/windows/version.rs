//! Windows version lookup from the registry.
//!
//! `GetVersionEx` lies to unmanifested processes, so the NT version is read
//! from `HKLM\SOFTWARE\Microsoft\Windows NT\CurrentVersion` instead.

use super::{from_wide, to_wide};
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{
    RegCloseKey, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_LOCAL_MACHINE, KEY_READ,
};

const CURRENT_VERSION_KEY: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion";

/// NT version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

/// An open registry key, closed on drop.
struct RegistryKey {
    hkey: HKEY,
}

impl RegistryKey {
    fn open_local_machine(path: &str) -> Option<Self> {
        let path = to_wide(path);
        let mut hkey = HKEY::default();
        let result = unsafe {
            RegOpenKeyExW(
                HKEY_LOCAL_MACHINE,
                PCWSTR::from_raw(path.as_ptr()),
                0,
                KEY_READ,
                &mut hkey,
            )
        };
        if result.is_err() {
            return None;
        }
        Some(Self { hkey })
    }

    fn read_dword(&self, name: &str) -> Option<u32> {
        let name = to_wide(name);
        let mut data: u32 = 0;
        let mut data_size = std::mem::size_of::<u32>() as u32;

        let result = unsafe {
            RegQueryValueExW(
                self.hkey,
                PCWSTR::from_raw(name.as_ptr()),
                None,
                None,
                Some(&mut data as *mut u32 as *mut u8),
                Some(&mut data_size),
            )
        };

        if result.is_ok() {
            Some(data)
        } else {
            None
        }
    }

    fn read_string(&self, name: &str) -> Option<String> {
        let name = to_wide(name);
        let mut data_size = 0u32;

        unsafe {
            let result = RegQueryValueExW(
                self.hkey,
                PCWSTR::from_raw(name.as_ptr()),
                None,
                None,
                None,
                Some(&mut data_size),
            );
            if result.is_err() || data_size == 0 {
                return None;
            }

            let mut buffer = vec![0u16; (data_size as usize + 1) / 2];
            let result = RegQueryValueExW(
                self.hkey,
                PCWSTR::from_raw(name.as_ptr()),
                None,
                None,
                Some(buffer.as_mut_ptr() as *mut u8),
                Some(&mut data_size),
            );
            if result.is_err() {
                return None;
            }

            Some(from_wide(&buffer))
        }
    }
}

impl Drop for RegistryKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.hkey);
        }
    }
}

/// Version of the running NT kernel, or `None` if the registry can't be read.
pub fn nt_version() -> Option<NtVersion> {
    let key = RegistryKey::open_local_machine(CURRENT_VERSION_KEY)?;

    let build = key
        .read_string("CurrentBuildNumber")
        .and_then(|b| b.trim().parse().ok())
        .unwrap_or(0);

    // Windows 10 and later freeze CurrentVersion at "6.3"
    if let (Some(major), Some(minor)) = (
        key.read_dword("CurrentMajorVersionNumber"),
        key.read_dword("CurrentMinorVersionNumber"),
    ) {
        return Some(NtVersion { major, minor, build });
    }

    parse_version(&key.read_string("CurrentVersion")?, build)
}

fn parse_version(version: &str, build: u32) -> Option<NtVersion> {
    let (major, minor) = version.trim().split_once('.')?;
    Some(NtVersion {
        major: major.parse().ok()?,
        minor: minor.parse().ok()?,
        build,
    })
}
