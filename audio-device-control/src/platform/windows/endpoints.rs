//! Endpoint seam over the MMDevice, EndpointVolume and WASAPI client APIs.

use crate::audio::capture::CaptureStream;
use crate::audio::endpoint::{AudioEndpoint, EndpointApi};
use crate::audio::{AudioError, DataFlow};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use windows::core::GUID;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioMeterInformation};
use windows::Win32::Media::Audio::{
    eCapture, eMultimedia, eRender, EDataFlow, IAudioClient, IMMDevice, IMMDeviceEnumerator,
    MMDeviceEnumerator, AUDCLNT_SHAREMODE_SHARED, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Friendly name of the device interface (adapter) exposing an endpoint.
const PKEY_DEVICE_INTERFACE_NAME: PROPERTYKEY = PROPERTYKEY {
    fmtid: GUID::from_u128(0xb3f8fa53_0004_438e_9003_51a46e139bfc),
    pid: 6,
};

/// Reference time units (100 ns) per millisecond.
const REFTIMES_PER_MILLISEC: i64 = 10_000;

fn native_flow(flow: DataFlow) -> EDataFlow {
    match flow {
        DataFlow::Capture => eCapture,
        DataFlow::Render => eRender,
    }
}

/// Endpoint enumeration over `IMMDeviceEnumerator`.
pub struct WasapiEndpoints {
    enumerator: IMMDeviceEnumerator,
}

// SAFETY: created in the multithreaded apartment; the MMDevice enumerator
// and the endpoint interfaces it hands out are free-threaded proxies.
unsafe impl Send for WasapiEndpoints {}
unsafe impl Sync for WasapiEndpoints {}

impl WasapiEndpoints {
    /// Create the enumerator. COM must be initialized on this thread.
    pub fn new() -> Result<Self, AudioError> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)? };
        Ok(Self { enumerator })
    }

    fn device_at(&self, index: usize) -> Result<IMMDevice, AudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)?;
            Ok(collection.Item(index as u32)?)
        }
    }
}

impl EndpointApi for WasapiEndpoints {
    fn enumerate(&self, flow: DataFlow) -> Result<Vec<Arc<dyn AudioEndpoint>>, AudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(native_flow(flow), DEVICE_STATE_ACTIVE)?;
            let count = collection.GetCount()?;

            let mut endpoints: Vec<Arc<dyn AudioEndpoint>> = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection.Item(i)?;
                endpoints.push(Arc::new(WasapiEndpoint::new(device)?));
            }
            Ok(endpoints)
        }
    }

    fn default_endpoint(&self, flow: DataFlow) -> Result<Option<Arc<dyn AudioEndpoint>>, AudioError> {
        let device = match unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(native_flow(flow), eMultimedia)
        } {
            Ok(device) => device,
            // No endpoint of this direction is active
            Err(_) => return Ok(None),
        };
        Ok(Some(Arc::new(WasapiEndpoint::new(device)?)))
    }

    fn open_capture_stream(
        &self,
        device_index: Option<usize>,
        buffer: Duration,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let device = match device_index {
            Some(index) => self.device_at(index)?,
            None => unsafe {
                self.enumerator
                    .GetDefaultAudioEndpoint(eCapture, eMultimedia)?
            },
        };
        Ok(Box::new(WasapiCaptureStream::open(&device, buffer)?))
    }
}

/// An active endpoint with its volume and meter interfaces activated.
pub struct WasapiEndpoint {
    device: IMMDevice,
    volume: IAudioEndpointVolume,
    meter: IAudioMeterInformation,
}

// SAFETY: see `WasapiEndpoints`.
unsafe impl Send for WasapiEndpoint {}
unsafe impl Sync for WasapiEndpoint {}

impl WasapiEndpoint {
    fn new(device: IMMDevice) -> Result<Self, AudioError> {
        unsafe {
            let volume: IAudioEndpointVolume = device.Activate(CLSCTX_ALL, None)?;
            let meter: IAudioMeterInformation = device.Activate(CLSCTX_ALL, None)?;
            Ok(Self {
                device,
                volume,
                meter,
            })
        }
    }

    fn property(&self, key: &PROPERTYKEY) -> Result<String, AudioError> {
        unsafe {
            let props: IPropertyStore = self.device.OpenPropertyStore(STGM(0))?;
            let value = props.GetValue(key)?;
            Ok(value.to_string())
        }
    }
}

impl AudioEndpoint for WasapiEndpoint {
    fn line_name(&self) -> Result<String, AudioError> {
        let key = PROPERTYKEY {
            fmtid: DEVPKEY_Device_FriendlyName.fmtid,
            pid: DEVPKEY_Device_FriendlyName.pid,
        };
        self.property(&key)
    }

    fn interface_name(&self) -> Result<String, AudioError> {
        self.property(&PKEY_DEVICE_INTERFACE_NAME)
    }

    fn volume_scalar(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.volume.GetMasterVolumeLevelScalar()? })
    }

    fn set_volume_scalar(&self, level: f32) -> Result<(), AudioError> {
        let level = level.clamp(0.0, 1.0);
        unsafe {
            self.volume
                .SetMasterVolumeLevelScalar(level, std::ptr::null())?;
        }
        Ok(())
    }

    fn volume_step_up(&self) -> Result<(), AudioError> {
        unsafe { self.volume.VolumeStepUp(std::ptr::null())? };
        Ok(())
    }

    fn volume_step_down(&self) -> Result<(), AudioError> {
        unsafe { self.volume.VolumeStepDown(std::ptr::null())? };
        Ok(())
    }

    fn mute(&self) -> Result<bool, AudioError> {
        Ok(unsafe { self.volume.GetMute()? }.as_bool())
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        unsafe { self.volume.SetMute(muted, std::ptr::null())? };
        Ok(())
    }

    fn peak_value(&self) -> Result<f32, AudioError> {
        Ok(unsafe { self.meter.GetPeakValue()? })
    }
}

/// A shared-mode capture stream. While it runs the endpoint meter reports
/// live input.
pub struct WasapiCaptureStream {
    client: IAudioClient,
    capturing: bool,
}

// SAFETY: see `WasapiEndpoints`.
unsafe impl Send for WasapiCaptureStream {}

impl WasapiCaptureStream {
    fn open(device: &IMMDevice, buffer: Duration) -> Result<Self, AudioError> {
        unsafe {
            let client: IAudioClient = device.Activate(CLSCTX_ALL, None)?;

            let format = client.GetMixFormat()?;
            let duration = buffer.as_millis() as i64 * REFTIMES_PER_MILLISEC;
            let result = client.Initialize(AUDCLNT_SHAREMODE_SHARED, 0, duration, 0, format, None);
            CoTaskMemFree(Some(format as *const _));
            result?;

            client.Start()?;
            debug!("Capture stream started ({} ms buffer)", buffer.as_millis());

            Ok(Self {
                client,
                capturing: true,
            })
        }
    }
}

impl CaptureStream for WasapiCaptureStream {
    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        unsafe { self.client.Stop()? };
        self.capturing = false;
        Ok(())
    }
}
