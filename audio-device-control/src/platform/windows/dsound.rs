//! Raw DirectSound capture buffer used for peak metering on the mixer
//! backend.

use crate::audio::capture::{CaptureFormat, CaptureStream, SampleBuffer, StereoFrame};
use crate::audio::AudioError;
use std::ffi::c_void;
use tracing::debug;
use windows::core::{GUID, PCWSTR};
use windows::Win32::Foundation::{BOOL, TRUE};
use windows::Win32::Media::Audio::DirectSound::{
    DirectSoundCaptureCreate8, DirectSoundCaptureEnumerateW, IDirectSoundCapture,
    IDirectSoundCaptureBuffer, DSCBUFFERDESC,
};
use windows::Win32::Media::Audio::WAVEFORMATEX;

const WAVE_FORMAT_PCM: u16 = 1;
const DSCBSTART_LOOPING: u32 = 0x0000_0001;
const DSCBSTATUS_CAPTURING: u32 = 0x0000_0001;

/// A capture device as reported by DirectSound enumeration.
struct CaptureDevice {
    guid: Option<GUID>,
    description: String,
}

unsafe extern "system" fn collect_device(
    guid: *mut GUID,
    description: PCWSTR,
    _module: PCWSTR,
    context: *mut c_void,
) -> BOOL {
    let devices = &mut *(context as *mut Vec<CaptureDevice>);
    devices.push(CaptureDevice {
        guid: guid.as_ref().copied(),
        description: description.to_string().unwrap_or_default(),
    });
    TRUE
}

fn capture_devices() -> Result<Vec<CaptureDevice>, AudioError> {
    let mut devices: Vec<CaptureDevice> = Vec::new();
    unsafe {
        DirectSoundCaptureEnumerateW(
            Some(collect_device),
            Some(&mut devices as *mut Vec<CaptureDevice> as *const c_void),
        )?;
    }
    Ok(devices)
}

/// A looping capture buffer holding exactly one metering block.
pub struct DirectSoundBuffer {
    // Keeps the capture device alive for the buffer's lifetime
    _capture: IDirectSoundCapture,
    buffer: IDirectSoundCaptureBuffer,
    buffer_bytes: u32,
    block_align: u32,
    capturing: bool,
}

// SAFETY: the buffer is only touched while the owning backend's peak lock is
// held, so at most one thread uses it at a time.
unsafe impl Send for DirectSoundBuffer {}

impl DirectSoundBuffer {
    /// Open and start a buffer on the capture device whose description is
    /// `device_name`. `None` if no such device exists.
    pub fn open(device_name: &str, format: &CaptureFormat) -> Result<Option<Self>, AudioError> {
        let Some(device) = capture_devices()?
            .into_iter()
            .find(|d| d.description == device_name)
        else {
            debug!("No capture device named {}", device_name);
            return Ok(None);
        };

        let mut wave_format = WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_PCM,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.average_bytes_per_second(),
            nBlockAlign: format.block_align(),
            wBitsPerSample: format.bits_per_sample,
            cbSize: 0,
        };
        let description = DSCBUFFERDESC {
            dwSize: std::mem::size_of::<DSCBUFFERDESC>() as u32,
            dwBufferBytes: format.buffer_bytes(),
            lpwfxFormat: &mut wave_format,
            ..Default::default()
        };

        unsafe {
            let mut capture: Option<IDirectSoundCapture> = None;
            DirectSoundCaptureCreate8(
                device.guid.as_ref().map(|g| g as *const GUID),
                &mut capture,
                None,
            )?;
            let capture = capture
                .ok_or_else(|| AudioError::Native("DirectSoundCaptureCreate8 returned no device".into()))?;

            let mut buffer: Option<IDirectSoundCaptureBuffer> = None;
            capture.CreateCaptureBuffer(&description, &mut buffer, None)?;
            let buffer = buffer
                .ok_or_else(|| AudioError::Native("CreateCaptureBuffer returned no buffer".into()))?;

            buffer.Start(DSCBSTART_LOOPING)?;
            debug!("Capture buffer started on {} ({})", device.description, format);

            Ok(Some(Self {
                _capture: capture,
                buffer,
                buffer_bytes: format.buffer_bytes(),
                block_align: u32::from(format.block_align()),
                capturing: true,
            }))
        }
    }

    fn copy_frames(bytes: &[u8], block_align: usize, frames: &mut [StereoFrame], start: usize) -> usize {
        let mut written = 0;
        for (chunk, frame) in bytes
            .chunks_exact(block_align)
            .zip(frames.iter_mut().skip(start))
        {
            let left = i16::from_le_bytes([chunk[0], chunk[1]]);
            let right = if block_align >= 4 {
                i16::from_le_bytes([chunk[2], chunk[3]])
            } else {
                left
            };
            *frame = StereoFrame::new(left, right);
            written += 1;
        }
        written
    }
}

impl CaptureStream for DirectSoundBuffer {
    fn is_capturing(&self) -> bool {
        self.capturing
            && unsafe { self.buffer.GetStatus() }
                .map(|status| status & DSCBSTATUS_CAPTURING != 0)
                .unwrap_or(false)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        unsafe { self.buffer.Stop()? };
        self.capturing = false;
        Ok(())
    }
}

impl SampleBuffer for DirectSoundBuffer {
    fn read_latest(&mut self, frames: &mut [StereoFrame]) -> Result<(), AudioError> {
        let mut read_position = 0u32;
        unsafe {
            self.buffer
                .GetCurrentPosition(None, Some(&mut read_position))?;
        }

        let wanted = (frames.len() as u32 * self.block_align).min(self.buffer_bytes);
        let offset = (read_position + self.buffer_bytes - wanted) % self.buffer_bytes;

        let mut first: *mut c_void = std::ptr::null_mut();
        let mut first_len = 0u32;
        let mut second: *mut c_void = std::ptr::null_mut();
        let mut second_len = 0u32;

        unsafe {
            self.buffer.Lock(
                offset,
                wanted,
                &mut first,
                &mut first_len,
                Some(&mut second),
                Some(&mut second_len),
                0,
            )?;

            let block_align = self.block_align as usize;
            let mut written = 0;
            if !first.is_null() {
                let bytes = std::slice::from_raw_parts(first as *const u8, first_len as usize);
                written += Self::copy_frames(bytes, block_align, frames, 0);
            }
            if !second.is_null() {
                let bytes = std::slice::from_raw_parts(second as *const u8, second_len as usize);
                Self::copy_frames(bytes, block_align, frames, written);
            }

            self.buffer.Unlock(
                first as *const c_void,
                first_len,
                Some(second as *const c_void),
                second_len,
            )?;
        }
        Ok(())
    }
}
