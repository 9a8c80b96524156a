//! Per-endpoint backend (Vista and later).
//!
//! Every capture or render endpoint is one line; its interface is the adapter
//! exposing it. Volume is a native `0.0..=1.0` scalar and the peak meter is
//! read straight from the endpoint, which the audio engine already
//! aggregates. A capture stream is kept open while metering so the meter
//! reports live input.

use crate::audio::capture::{CaptureStream, PeakSession};
use crate::audio::endpoint::{
    interface_name_or_unknown, line_name_or_unknown, winmm_name, AudioEndpoint, EndpointApi,
};
use crate::audio::volume::{percent_to_scalar, scalar_to_percent};
use crate::audio::{AudioDeviceControl, AudioError, DataFlow, DeviceLine, DeviceRegistry, DeviceSelection};
use crate::config::ControlConfig;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// A bound endpoint. Replaced wholesale on every successful selection.
struct SelectedEndpoint {
    interface: String,
    line: String,
    endpoint: Arc<dyn AudioEndpoint>,
    /// Position in the capture enumeration; `None` for the OS default.
    device_index: Option<usize>,
}

impl SelectedEndpoint {
    fn from_default(endpoint: Arc<dyn AudioEndpoint>) -> Self {
        Self {
            interface: interface_name_or_unknown(endpoint.as_ref()),
            line: line_name_or_unknown(endpoint.as_ref()),
            endpoint,
            device_index: None,
        }
    }
}

/// Backend over the per-endpoint volume and meter APIs.
pub struct ModernBackend {
    api: Box<dyn EndpointApi>,
    config: ControlConfig,
    capture: RwLock<Option<Arc<SelectedEndpoint>>>,
    render: RwLock<Option<Arc<SelectedEndpoint>>>,
    /// Serializes capture-device switching against the peak session.
    peak: Mutex<PeakSession<dyn CaptureStream>>,
}

impl ModernBackend {
    /// Create the backend, bound to the OS default capture and render
    /// endpoints when any are active.
    pub fn new(api: Box<dyn EndpointApi>, config: ControlConfig) -> Result<Self, AudioError> {
        let config = config.sanitized();
        let capture = Self::default_selection(api.as_ref(), DataFlow::Capture)?;
        let render = Self::default_selection(api.as_ref(), DataFlow::Render)?;

        if let Some(selected) = &capture {
            info!("Capture device: {} - {}", selected.interface, selected.line);
        }
        if let Some(selected) = &render {
            info!("Render device: {} - {}", selected.interface, selected.line);
        }

        Ok(Self {
            api,
            config,
            capture: RwLock::new(capture),
            render: RwLock::new(render),
            peak: Mutex::new(PeakSession::new()),
        })
    }

    fn default_selection(
        api: &dyn EndpointApi,
        flow: DataFlow,
    ) -> Result<Option<Arc<SelectedEndpoint>>, AudioError> {
        if api.enumerate(flow)?.is_empty() {
            return Ok(None);
        }
        Ok(api
            .default_endpoint(flow)?
            .map(|endpoint| Arc::new(SelectedEndpoint::from_default(endpoint))))
    }

    fn slot(&self, flow: DataFlow) -> &RwLock<Option<Arc<SelectedEndpoint>>> {
        match flow {
            DataFlow::Capture => &self.capture,
            DataFlow::Render => &self.render,
        }
    }

    /// Snapshot of the bound endpoint. The snapshot stays valid even if a
    /// concurrent selection replaces it.
    fn selected(&self, flow: DataFlow) -> Result<Arc<SelectedEndpoint>, AudioError> {
        self.slot(flow)
            .read()
            .clone()
            .ok_or(AudioError::NoDeviceSelected { flow })
    }

    fn endpoint(&self, flow: DataFlow) -> Result<Arc<dyn AudioEndpoint>, AudioError> {
        Ok(Arc::clone(&self.selected(flow)?.endpoint))
    }

    fn devices_info(&self, flow: DataFlow) -> Result<DeviceRegistry, AudioError> {
        let endpoints = self.api.enumerate(flow)?;
        let mut registry = DeviceRegistry::new();

        for endpoint in &endpoints {
            let interface = interface_name_or_unknown(endpoint.as_ref());
            let line_name = line_name_or_unknown(endpoint.as_ref());
            let friendly_name = winmm_name(&line_name);
            // Endpoint volume always exposes mute
            registry.add_line(&interface, DeviceLine::new(line_name, friendly_name, true));
        }

        debug!(
            "Enumerated {} {} endpoints on {} interfaces",
            endpoints.len(),
            flow,
            registry.len()
        );
        Ok(registry)
    }

    /// Linear scan matching interface name, then line name.
    fn find_endpoint(
        &self,
        flow: DataFlow,
        interface: &str,
        line: &str,
    ) -> Result<SelectedEndpoint, AudioError> {
        let endpoints = self.api.enumerate(flow)?;
        let mut interface_found = false;

        for (index, endpoint) in endpoints.into_iter().enumerate() {
            if interface_name_or_unknown(endpoint.as_ref()) != interface {
                continue;
            }
            interface_found = true;
            if line_name_or_unknown(endpoint.as_ref()) == line {
                return Ok(SelectedEndpoint {
                    interface: interface.to_string(),
                    line: line.to_string(),
                    endpoint,
                    device_index: Some(index),
                });
            }
        }

        if interface_found {
            Err(AudioError::line_not_found(interface, line))
        } else {
            Err(AudioError::interface_not_found(interface))
        }
    }

    fn volume(&self, flow: DataFlow) -> Result<i32, AudioError> {
        let endpoint = self.endpoint(flow)?;
        Ok(scalar_to_percent(endpoint.volume_scalar()?))
    }

    fn set_volume(&self, flow: DataFlow, volume: i32) -> Result<i32, AudioError> {
        let endpoint = self.endpoint(flow)?;
        endpoint.set_volume_scalar(percent_to_scalar(volume))?;
        Ok(scalar_to_percent(endpoint.volume_scalar()?))
    }

    fn step_volume(&self, flow: DataFlow, up: bool) -> Result<i32, AudioError> {
        let endpoint = self.endpoint(flow)?;
        if up {
            endpoint.volume_step_up()?;
        } else {
            endpoint.volume_step_down()?;
        }
        Ok(scalar_to_percent(endpoint.volume_scalar()?))
    }

    fn toggle_mute(&self, flow: DataFlow) -> Result<bool, AudioError> {
        let endpoint = self.endpoint(flow)?;
        endpoint.set_mute(!endpoint.mute()?)?;
        endpoint.mute()
    }

    fn set_mute(&self, flow: DataFlow, mute: bool) -> Result<bool, AudioError> {
        let endpoint = self.endpoint(flow)?;
        endpoint.set_mute(mute)?;
        endpoint.mute()
    }

    /// Number of times a capture stream has been opened for metering.
    pub fn peak_session_opens(&self) -> u64 {
        self.peak.lock().open_count()
    }

    /// Whether a capture stream is currently held for metering.
    pub fn has_peak_session(&self) -> bool {
        self.peak.lock().is_active()
    }
}

impl AudioDeviceControl for ModernBackend {
    fn get_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        Ok(self
            .capture
            .read()
            .as_ref()
            .map(|s| DeviceSelection::new(s.interface.clone(), s.line.clone()))
            .unwrap_or_default())
    }

    fn get_windows_selected_capture_device_info(&self) -> Result<DeviceSelection, AudioError> {
        if self.api.enumerate(DataFlow::Capture)?.is_empty() {
            return Ok(DeviceSelection::empty());
        }
        Ok(match self.api.default_endpoint(DataFlow::Capture)? {
            Some(endpoint) => DeviceSelection::new(
                interface_name_or_unknown(endpoint.as_ref()),
                line_name_or_unknown(endpoint.as_ref()),
            ),
            None => DeviceSelection::empty(),
        })
    }

    fn get_capture_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.devices_info(DataFlow::Capture)
    }

    fn get_render_devices_info(&self) -> Result<DeviceRegistry, AudioError> {
        self.devices_info(DataFlow::Render)
    }

    fn set_capture_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        let mut peak = self.peak.lock();

        let selected = self.find_endpoint(DataFlow::Capture, interface, line)?;
        peak.dispose();
        info!(
            "Capture device set to {} - {} (index {:?})",
            interface, line, selected.device_index
        );
        *self.capture.write() = Some(Arc::new(selected));
        Ok(())
    }

    fn set_render_device(&self, interface: &str, line: &str) -> Result<(), AudioError> {
        let selected = self.find_endpoint(DataFlow::Render, interface, line)?;
        info!("Render device set to {} - {}", interface, line);
        *self.render.write() = Some(Arc::new(selected));
        Ok(())
    }

    fn get_capture_volume(&self) -> Result<i32, AudioError> {
        self.volume(DataFlow::Capture)
    }

    fn get_render_volume(&self) -> Result<i32, AudioError> {
        self.volume(DataFlow::Render)
    }

    fn set_capture_volume(&self, volume: i32) -> Result<i32, AudioError> {
        self.set_volume(DataFlow::Capture, volume)
    }

    fn set_render_volume(&self, volume: i32) -> Result<i32, AudioError> {
        self.set_volume(DataFlow::Render, volume)
    }

    fn increment_capture_volume(&self) -> Result<i32, AudioError> {
        self.step_volume(DataFlow::Capture, true)
    }

    fn increment_render_volume(&self) -> Result<i32, AudioError> {
        self.step_volume(DataFlow::Render, true)
    }

    fn decrement_capture_volume(&self) -> Result<i32, AudioError> {
        self.step_volume(DataFlow::Capture, false)
    }

    fn decrement_render_volume(&self) -> Result<i32, AudioError> {
        self.step_volume(DataFlow::Render, false)
    }

    fn toggle_capture_mute(&self) -> Result<bool, AudioError> {
        self.toggle_mute(DataFlow::Capture)
    }

    fn toggle_render_mute(&self) -> Result<bool, AudioError> {
        self.toggle_mute(DataFlow::Render)
    }

    fn set_capture_mute(&self, mute: bool) -> Result<bool, AudioError> {
        self.set_mute(DataFlow::Capture, mute)
    }

    fn set_render_mute(&self, mute: bool) -> Result<bool, AudioError> {
        self.set_mute(DataFlow::Render, mute)
    }

    fn get_capture_mute_status(&self) -> Result<bool, AudioError> {
        self.endpoint(DataFlow::Capture)?.mute()
    }

    fn get_render_mute_status(&self) -> Result<bool, AudioError> {
        self.endpoint(DataFlow::Render)?.mute()
    }

    fn get_capture_device_master_peak_value(&self) -> Result<i32, AudioError> {
        let mut peak = self.peak.lock();

        let selected = self.selected(DataFlow::Capture)?;
        let buffer = self.config.stream_buffer;
        peak.get_or_open(|| self.api.open_capture_stream(selected.device_index, buffer).map(Some))?;

        Ok(scalar_to_percent(selected.endpoint.peak_value()?))
    }

    fn dispose_capture_device_master_peak_value(&self) -> Result<(), AudioError> {
        self.peak.lock().dispose();
        Ok(())
    }

    fn get_render_device_master_peak_value(&self) -> Result<i32, AudioError> {
        let _peak = self.peak.lock();
        let endpoint = self.endpoint(DataFlow::Render)?;
        Ok(scalar_to_percent(endpoint.peak_value()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEndpoint, FakeEndpoints};
    use std::thread;
    use std::time::Duration;

    fn hardware() -> FakeEndpoints {
        let api = FakeEndpoints::new();
        api.add_capture(FakeEndpoint::new("Realtek Audio", "Microphone (Realtek Audio)"));
        api.add_capture(FakeEndpoint::new("Realtek Audio", "Line In (Realtek Audio)"));
        api.add_capture(FakeEndpoint::new("USB Audio", "Headset Microphone (USB Audio)"));
        api.add_render(FakeEndpoint::new("Realtek Audio", "Speakers (Realtek Audio)"));
        api.set_default(DataFlow::Capture, 0);
        api.set_default(DataFlow::Render, 0);
        api
    }

    fn backend(api: &FakeEndpoints) -> ModernBackend {
        ModernBackend::new(Box::new(api.clone()), ControlConfig::default()).unwrap()
    }

    #[test]
    fn test_seeds_default_devices() {
        let api = hardware();
        let backend = backend(&api);

        assert_eq!(
            backend.get_selected_capture_device_info().unwrap(),
            DeviceSelection::new("Realtek Audio", "Microphone (Realtek Audio)")
        );
        assert_eq!(backend.get_render_volume().unwrap(), 100);
    }

    #[test]
    fn test_no_active_endpoints() {
        let api = FakeEndpoints::new();
        let backend = backend(&api);

        assert!(backend.get_selected_capture_device_info().unwrap().is_empty());
        assert!(backend
            .get_windows_selected_capture_device_info()
            .unwrap()
            .is_empty());
        assert!(matches!(
            backend.get_capture_volume(),
            Err(AudioError::NoDeviceSelected {
                flow: DataFlow::Capture
            })
        ));
        assert!(matches!(
            backend.get_capture_device_master_peak_value(),
            Err(AudioError::NoDeviceSelected { .. })
        ));
        backend.dispose_capture_device_master_peak_value().unwrap();
    }

    #[test]
    fn test_devices_info_groups_lines_by_interface() {
        let api = hardware();
        let backend = backend(&api);
        let registry = backend.get_capture_devices_info().unwrap();

        assert_eq!(registry.interface_names(), vec!["Realtek Audio", "USB Audio"]);
        let lines = registry.lines("Realtek Audio").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_name, "Microphone (Realtek Audio)");
        assert!(lines.iter().all(|l| l.mutable));

        let usb = &registry.lines("USB Audio").unwrap()[0];
        assert_eq!(usb.friendly_name, "Headset Microphone (USB Audio)");
    }

    #[test]
    fn test_friendly_name_is_truncated() {
        let api = FakeEndpoints::new();
        api.add_capture(FakeEndpoint::new(
            "High Definition Audio Device",
            "Microphone (High Definition Audio Device)",
        ));
        let backend = backend(&api);
        let registry = backend.get_capture_devices_info().unwrap();
        let line = &registry.lines("High Definition Audio Device").unwrap()[0];
        assert_eq!(line.line_name, "Microphone (High Definition Audio Device)");
        assert_eq!(line.friendly_name, "Microphone (High Definition Aud");
    }

    #[test]
    fn test_interface_lookup_failure_uses_placeholder() {
        let api = FakeEndpoints::new();
        let endpoint = FakeEndpoint::new("ignored", "Microphone (Bluetooth)");
        endpoint.fail_interface_lookup();
        api.add_capture(endpoint);
        let backend = backend(&api);

        let registry = backend.get_capture_devices_info().unwrap();
        assert!(registry.contains_interface("Unknown"));
        backend
            .set_capture_device("Unknown", "Microphone (Bluetooth)")
            .unwrap();
    }

    #[test]
    fn test_enumeration_is_stable_and_tracks_hotplug() {
        let api = hardware();
        let backend = backend(&api);

        let first = backend.get_capture_devices_info().unwrap();
        let second = backend.get_capture_devices_info().unwrap();
        assert_eq!(first, second);

        api.remove_capture("Headset Microphone (USB Audio)");
        let third = backend.get_capture_devices_info().unwrap();
        assert!(!third.contains_interface("USB Audio"));
        assert!(first.contains_interface("USB Audio"));
    }

    #[test]
    fn test_set_capture_device_errors() {
        let api = hardware();
        let backend = backend(&api);

        assert!(matches!(
            backend.set_capture_device("Realtek Audio", "Headset Microphone (USB Audio)"),
            Err(AudioError::DeviceLineNotFound { .. })
        ));
        // The line exists, but under another interface
        match backend.set_capture_device("Missing Adapter", "Microphone (Realtek Audio)") {
            Err(AudioError::DeviceInterfaceNotFound { interface }) => {
                assert_eq!(interface, "Missing Adapter")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // Failed selection keeps the previous device
        assert_eq!(
            backend.get_selected_capture_device_info().unwrap().line,
            "Microphone (Realtek Audio)"
        );
    }

    #[test]
    fn test_set_capture_device_switches_volume_target() {
        let api = hardware();
        let backend = backend(&api);

        backend
            .set_capture_device("USB Audio", "Headset Microphone (USB Audio)")
            .unwrap();
        backend.set_capture_volume(30).unwrap();

        let usb = api.capture("Headset Microphone (USB Audio)").unwrap();
        let realtek = api.capture("Microphone (Realtek Audio)").unwrap();
        assert_eq!(scalar_to_percent(usb.scalar()), 30);
        assert_eq!(scalar_to_percent(realtek.scalar()), 100);
    }

    #[test]
    fn test_set_volume_round_trip() {
        let api = hardware();
        let backend = backend(&api);

        for volume in [100, 75, 50, 25, 0] {
            let returned = backend.set_capture_volume(volume).unwrap();
            let actual = backend.get_capture_volume().unwrap();
            assert!((returned - volume).abs() <= 1);
            assert!((actual - volume).abs() <= 1);
        }
    }

    #[test]
    fn test_set_volume_clamps() {
        let api = hardware();
        let backend = backend(&api);

        for (requested, expected) in [(101, 100), (250, 100), (-1, 0), (-250, 0)] {
            let returned = backend.set_capture_volume(requested).unwrap();
            assert!((returned - expected).abs() <= 1);
            assert!((backend.get_capture_volume().unwrap() - expected).abs() <= 1);
        }
    }

    #[test]
    fn test_increment_saturates_at_100() {
        let api = hardware();
        let backend = backend(&api);

        backend.set_capture_volume(99).unwrap();
        let mut last = -1;
        for _ in 0..5 {
            last = backend.increment_capture_volume().unwrap();
            assert!(last <= 100);
        }
        assert_eq!(last, 100);
        assert_eq!(backend.get_capture_volume().unwrap(), 100);
    }

    #[test]
    fn test_decrement_saturates_at_0() {
        let api = hardware();
        let backend = backend(&api);

        backend.set_capture_volume(1).unwrap();
        let mut last = -1;
        for _ in 0..3 {
            last = backend.decrement_capture_volume().unwrap();
        }
        assert_eq!(last, 0);
        assert_eq!(backend.get_capture_volume().unwrap(), 0);
    }

    #[test]
    fn test_increment_from_45() {
        let api = hardware();
        let backend = backend(&api);

        backend.set_capture_volume(45).unwrap();
        let mut last = -1;
        for _ in 0..16 {
            last = backend.increment_capture_volume().unwrap();
        }
        assert_eq!(last, backend.get_capture_volume().unwrap());
        assert!(last <= 100);
    }

    #[test]
    fn test_mute() {
        let api = hardware();
        let backend = backend(&api);

        assert!(!backend.get_capture_mute_status().unwrap());
        assert!(backend.toggle_capture_mute().unwrap());
        assert!(backend.get_capture_mute_status().unwrap());
        assert!(!backend.set_capture_mute(false).unwrap());
        assert!(backend.set_render_mute(true).unwrap());
        assert!(!backend.toggle_render_mute().unwrap());
    }

    #[test]
    fn test_peak_session_is_lazy() {
        let api = hardware();
        let backend = backend(&api);

        backend.dispose_capture_device_master_peak_value().unwrap();
        assert_eq!(api.streams_opened(), 0);

        api.capture("Microphone (Realtek Audio)").unwrap().set_peak(0.42);
        assert_eq!(backend.get_capture_device_master_peak_value().unwrap(), 42);
        assert_eq!(backend.get_capture_device_master_peak_value().unwrap(), 42);
        assert_eq!(api.streams_opened(), 1);
        assert_eq!(api.last_stream_index(), Some(None));
    }

    #[test]
    fn test_device_switch_resets_peak_session() {
        let api = hardware();
        let backend = backend(&api);

        backend.get_capture_device_master_peak_value().unwrap();
        assert!(backend.has_peak_session());

        backend
            .set_capture_device("USB Audio", "Headset Microphone (USB Audio)")
            .unwrap();
        assert!(!backend.has_peak_session());
        assert_eq!(api.streams_stopped(), 1);

        api.capture("Headset Microphone (USB Audio)")
            .unwrap()
            .set_peak(0.9);
        assert_eq!(backend.get_capture_device_master_peak_value().unwrap(), 90);
        assert_eq!(backend.peak_session_opens(), 2);
        assert_eq!(api.last_stream_index(), Some(Some(2)));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let api = hardware();
        let backend = backend(&api);

        backend.get_capture_device_master_peak_value().unwrap();
        backend.dispose_capture_device_master_peak_value().unwrap();
        backend.dispose_capture_device_master_peak_value().unwrap();
        assert_eq!(api.streams_stopped(), 1);

        backend.get_capture_device_master_peak_value().unwrap();
        assert_eq!(api.streams_opened(), 2);
    }

    #[test]
    fn test_render_peak() {
        let api = hardware();
        let backend = backend(&api);
        api.render("Speakers (Realtek Audio)").unwrap().set_peak(0.25);
        assert_eq!(backend.get_render_device_master_peak_value().unwrap(), 25);
        assert_eq!(api.streams_opened(), 0);
    }

    #[test]
    fn test_windows_selection_follows_os_default() {
        let api = hardware();
        let backend = backend(&api);

        api.set_default(DataFlow::Capture, 2);
        assert_eq!(
            backend.get_windows_selected_capture_device_info().unwrap(),
            DeviceSelection::new("USB Audio", "Headset Microphone (USB Audio)")
        );
        // Our own selection is untouched
        assert_eq!(
            backend.get_selected_capture_device_info().unwrap().interface,
            "Realtek Audio"
        );
    }

    #[test]
    fn test_device_switch_and_peak_reads_do_not_interleave() {
        let api = hardware();
        api.set_stream_read_delay(Duration::from_millis(1));
        let backend = Arc::new(backend(&api));

        let switcher = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                let targets = [
                    ("Realtek Audio", "Microphone (Realtek Audio)"),
                    ("Realtek Audio", "Line In (Realtek Audio)"),
                    ("USB Audio", "Headset Microphone (USB Audio)"),
                ];
                for i in 0..60 {
                    let (interface, line) = targets[i % targets.len()];
                    backend.set_capture_device(interface, line).unwrap();
                }
            })
        };

        let poller = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                for _ in 0..200 {
                    let peak = backend.get_capture_device_master_peak_value().unwrap();
                    assert!((0..=100).contains(&peak));
                }
                backend.dispose_capture_device_master_peak_value().unwrap();
            })
        };

        switcher.join().unwrap();
        poller.join().unwrap();

        assert_eq!(api.stop_during_read(), 0);
        assert_eq!(api.streams_opened(), api.streams_stopped());
    }
}
