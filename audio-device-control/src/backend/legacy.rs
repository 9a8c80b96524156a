//! Mixer backend (XP).
//!
//! A device interface is a mixer device and its lines are the mixer's user
//! lines. The mixer itself reports which recording line is active, so the
//! bound line is re-resolved against the hardware on every call. Peak
//! metering samples a raw capture buffer opened on the capture device that
//! shares the mixer's name.
//!
//! Render volume, mute and metering are not available on this backend.

use crate::audio::capture::{block_peak_percent, PeakSession, SampleBuffer, StereoFrame};
use crate::audio::mixer::{MixerApi, MixerDevice, MixerLine};
use crate::audio::volume::{native_to_percent, percent_to_native, step_percent, MAX_PERCENT, MIN_PERCENT};
use crate::audio::{AudioDeviceControl, AudioError, DataFlow, DeviceLine, DeviceRegistry, DeviceSelection};
use crate::config::ControlConfig;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A bound mixer.
#[derive(Debug)]
struct MixerBinding {
    device: MixerDevice,
    /// Line requested at selection time; reported when it can't be resolved
    line: String,
    /// A line without a select control that is treated as the active one
    unselectable_line: Option<String>,
}

/// Backend over the mixer and raw capture buffer APIs.
pub struct LegacyBackend {
    api: Box<dyn MixerApi>,
    config: ControlConfig,
    volume_unit: AtomicI32,
    capture: RwLock<Option<Arc<MixerBinding>>>,
    render: RwLock<Option<Arc<MixerBinding>>>,
    /// Serializes capture-device switching against the peak session.
    peak: Mutex<PeakSession<dyn SampleBuffer>>,
}

impl LegacyBackend {
    /// Create the backend, bound to the default recording mixer if there is
    /// one. Its first user line is remembered as the implicitly active line
    /// for hardware without a select control.
    pub fn new(api: Box<dyn MixerApi>, config: ControlConfig) -> Result<Self, AudioError> {
        let config = config.sanitized();
        let capture = match api.default_device(DataFlow::Capture)? {
            Some(device) => Some(Arc::new(Self::initial_binding(api.as_ref(), device)?)),
            None => None,
        };

        if let Some(binding) = &capture {
            info!("Capture device: {} - {}", binding.device.name, binding.line);
        }

        Ok(Self {
            api,
            volume_unit: AtomicI32::new(config.volume_unit),
            config,
            capture: RwLock::new(capture),
            render: RwLock::new(None),
            peak: Mutex::new(PeakSession::new()),
        })
    }

    fn initial_binding(api: &dyn MixerApi, device: MixerDevice) -> Result<MixerBinding, AudioError> {
        let lines = api.lines(DataFlow::Capture, device.id)?;
        let first = match lines.first() {
            Some(line) => line.name().to_string(),
            None => {
                return Err(AudioError::NoDeviceLines {
                    interface: device.name,
                })
            }
        };

        let active = active_line(&lines, Some(first.as_str()))?
            .ok_or_else(|| AudioError::line_unselectable(&device.name, ""))?;
        let line = lines[active].name().to_string();

        Ok(MixerBinding {
            device,
            line,
            unselectable_line: Some(first),
        })
    }

    /// Step used by increment/decrement, in percent.
    pub fn volume_unit(&self) -> i32 {
        self.volume_unit.load(Ordering::Relaxed)
    }

    /// Change the increment/decrement step. Clamped to 1-100.
    pub fn set_volume_unit(&self, unit: i32) {
        self.volume_unit
            .store(unit.clamp(1, MAX_PERCENT), Ordering::Relaxed);
    }

    /// Render mixer and line chosen with `set_render_device`, if any.
    pub fn selected_render_device(&self) -> DeviceSelection {
        self.render
            .read()
            .as_ref()
            .map(|b| DeviceSelection::new(b.device.name.clone(), b.line.clone()))
            .unwrap_or_default()
    }

    /// Whether a raw capture buffer is currently held for metering.
    pub fn has_peak_session(&self) -> bool {
        self.peak.lock().is_active()
    }

    fn slot(&self, flow: DataFlow) -> &RwLock<Option<Arc<MixerBinding>>> {
        match flow {
            DataFlow::Capture => &self.capture,
            DataFlow::Render => &self.render,
        }
    }

    fn binding(&self, flow: DataFlow) -> Result<Arc<MixerBinding>, AudioError> {
        self.slot(flow)
            .read()
            .clone()
            .ok_or(AudioError::NoDeviceSelected { flow })
    }

    /// The line the bound mixer currently treats as active.
    fn selected_line(&self, flow: DataFlow) -> Result<(Arc<MixerBinding>, Box<dyn MixerLine>), AudioError> {
        let binding = self.binding(flow)?;
        let mut lines = self.api.lines(flow, binding.device.id)?;
        let index = active_line(&lines, binding.unselectable_line.as_deref())?
            .ok_or_else(|| AudioError::line_unselectable(&binding.device.name, &binding.line))?;
        Ok((binding, lines.swap_remove(index)))
    }

    fn devices_info(&self, flow: DataFlow) -> Result<DeviceRegistry, AudioError> {
        let mut registry = DeviceRegistry::new();

        for device in self.api.devices(flow)? {
            registry.add_interface(&device.name);
            for line in self.api.lines(flow, device.id)? {
                // Mixer and interface names coincide on this stack
                registry.add_line(
                    &device.name,
                    DeviceLine::new(line.name(), device.name.clone(), line.contains_mute()),
                );
            }
        }

        debug!("Enumerated {} {} mixers", registry.len(), flow);
        Ok(registry)
    }

    fn bind(&self, flow: DataFlow, interface: &str, line: &str) -> Result<MixerBinding, AudioError> {
        let device = self
            .api
            .devices(flow)?
            .into_iter()
            .find(|d| d.name == interface)
            .ok_or_else(|| AudioError::interface_not_found(interface))?;

        let lines = self.api.lines(flow, device.id)?;
        let target = lines
            .iter()
            .find(|l| l.name() == line)
            .ok_or_else(|| AudioError::line_not_found(interface, line))?;

        let unselectable_line = if target.contains_selected() {
            if !target.is_selected()? {
                target.select().map_err(|e| {
                    warn!("Mixer rejected selecting {} on {}: {}", line, interface, e);
                    AudioError::line_unselectable(interface, line)
                })?;
            }
            None
        } else {
            debug!("{} on {} has no select control", line, interface);
            Some(line.to_string())
        };

        Ok(MixerBinding {
            device,
            line: line.to_string(),
            unselectable_line,
        })
    }

    fn capture_volume(&self) -> Result<i32, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        Ok(native_to_percent(line.volume()?, line.volume_max()))
    }

    fn apply_capture_volume(&self, volume: i32) -> Result<i32, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        let max = line.volume_max();
        line.set_volume(percent_to_native(volume, max))?;
        Ok(native_to_percent(line.volume()?, max))
    }

    /// Step the capture volume by `delta` percent, moving at least one native
    /// unit so coarse lines still reach the ends of the range.
    fn step_capture_volume(&self, delta: i32) -> Result<i32, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        let max = line.volume_max();
        let native = line.volume()?;
        let volume = native_to_percent(native, max);

        if delta > 0 && volume >= MAX_PERCENT {
            return Ok(MAX_PERCENT);
        }
        if delta < 0 && volume <= MIN_PERCENT {
            return Ok(MIN_PERCENT);
        }

        let mut target = percent_to_native(step_percent(volume, delta), max);
        if target == native {
            target = if delta > 0 {
                native.saturating_add(1).min(max)
            } else {
                native.saturating_sub(1)
            };
        }
        line.set_volume(target)?;
        Ok(native_to_percent(line.volume()?, max))
    }

    fn not_implemented<T>(operation: &'static str) -> Result<T, AudioError> {
        Err(AudioError::NotImplemented { operation })
    }
}

/// Position of the first line that is selected, or that matches the
/// remembered unselectable line.
fn active_line(lines: &[Box<dyn MixerLine>], unselectable: Option<&str>) -> Result<Option<usize>, AudioError> {
    for (index, line) in lines.iter().enumerate() {
        if line.contains_selected() {
            if line.is_selected()? {
                return Ok(Some(index));
            }
        } else if unselectable == Some(line.name()) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

impl AudioDeviceControl for LegacyBackend {
    fn get_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        if self.capture.read().is_none() {
            return Ok(DeviceSelection::empty());
        }
        let (binding, line) = self.selected_line(DataFlow::Capture)?;
        Ok(DeviceSelection::new(binding.device.name.clone(), line.name()))
    }

    fn get_windows_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        let Some(device) = self.api.default_device(DataFlow::Capture)? else {
            return Ok(DeviceSelection::empty());
        };

        let current = self.capture.read().clone();
        let unselectable = current.as_ref().and_then(|b| b.unselectable_line.clone());
        let requested = current.as_ref().map(|b| b.line.clone()).unwrap_or_default();

        let lines = self.api.lines(DataFlow::Capture, device.id)?;
        let index = active_line(&lines, unselectable.as_deref())?
            .ok_or_else(|| AudioError::line_unselectable(&device.name, &requested))?;
        Ok(DeviceSelection::new(device.name.clone(), lines[index].name()))
    }

    fn get_capture_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.devices_info(DataFlow::Capture)
    }

    fn get_render_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.devices_info(DataFlow::Render)
    }

    fn set_capture_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        let mut peak = self.peak.lock();

        let binding = self.bind(DataFlow::Capture, interface, line)?;
        peak.dispose();
        info!("Capture device set to {} - {}", interface, line);
        *self.capture.write() = Some(Arc::new(binding));
        Ok(())
    }

    fn set_render_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        let binding = self.bind(DataFlow::Render, interface, line)?;
        info!("Render device set to {} - {}", interface, line);
        *self.render.write() = Some(Arc::new(binding));
        Ok(())
    }

    fn get_capture_volume(&self) -> Result<i32, AudioError> {
        self.capture_volume()
    }

    fn get_render_volume(&self) -> Result<i32, AudioError> {
        Self::not_implemented("get_render_volume")
    }

    fn set_capture_volume(&self, volume: i32) -> Result<i32, AudioError> {
        self.apply_capture_volume(volume)
    }

    fn set_render_volume(&self, _volume: i32) -> Result<i32, AudioError> {
        Self::not_implemented("set_render_volume")
    }

    fn increment_capture_volume(&self) -> Result<i32, AudioError> {
        self.step_capture_volume(self.volume_unit())
    }

    fn increment_render_volume(&self) -> Result<i32, AudioError> {
        Self::not_implemented("increment_render_volume")
    }

    fn decrement_capture_volume(&self) -> Result<i32, AudioError> {
        self.step_capture_volume(-self.volume_unit())
    }

    fn decrement_render_volume(&self) -> Result<i32, AudioError> {
        Self::not_implemented("decrement_render_volume")
    }

    fn toggle_capture_mute(&self) -> Result<bool, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        if line.contains_mute() {
            line.set_mute(!line.mute()?)?;
        }
        line.mute()
    }

    fn toggle_render_mute(&self) -> Result<bool, AudioError> {
        Self::not_implemented("toggle_render_mute")
    }

    fn set_capture_mute(&self, mute: bool) -> Result<bool, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        if line.contains_mute() {
            line.set_mute(mute)?;
        }
        line.mute()
    }

    fn set_render_mute(&self, _mute: bool) -> Result<bool, AudioError> {
        Self::not_implemented("set_render_mute")
    }

    fn get_capture_mute_status(&self) -> Result<bool, AudioError> {
        let (_, line) = self.selected_line(DataFlow::Capture)?;
        line.mute()
    }

    fn get_render_mute_status(&self) -> Result<bool, AudioError> {
        Self::not_implemented("get_render_mute_status")
    }

    fn get_capture_device_master_peak_value(&self) -> Result<i32, AudioError> {
        let mut peak = self.peak.lock();

        let binding = self.binding(DataFlow::Capture)?;
        let format = self.config.capture_format();
        let buffer = peak.get_or_open(|| self.api.open_capture_buffer(&binding.device.name, &format))?;

        // No capture device shares the mixer's name
        let Some(buffer) = buffer else {
            return Ok(0);
        };

        let mut frames = vec![StereoFrame::default(); format.frames];
        buffer.read_latest(&mut frames)?;
        Ok(block_peak_percent(&frames))
    }

    fn dispose_capture_device_master_peak_value(&self) -> Result<(), AudioError> {
        self.peak.lock().dispose();
        Ok(())
    }

    fn get_render_device_master_peak_value(&self) -> Result<i32, AudioError> {
        Self::not_implemented("get_render_device_master_peak_value")
    }
}
