//! In-memory native stacks for tests.
//!
//! Handles are cheap clones over shared state so a test keeps a handle to
//! the "hardware" it gave a backend and can inspect or change it afterwards.

use crate::audio::capture::{CaptureFormat, CaptureStream, SampleBuffer, StereoFrame};
use crate::audio::endpoint::{AudioEndpoint, EndpointApi};
use crate::audio::mixer::{MixerApi, MixerDevice, MixerLine};
use crate::audio::{AudioError, DataFlow};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Tracks reads of a metering resource against its teardown.
#[derive(Default)]
pub(crate) struct ReadMonitor {
    reading: AtomicUsize,
    stop_during_read: AtomicUsize,
    delay: Mutex<Duration>,
}

impl ReadMonitor {
    fn read<T>(&self, read: impl FnOnce() -> T) -> T {
        self.reading.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let value = read();
        self.reading.fetch_sub(1, Ordering::SeqCst);
        value
    }

    fn stopping(&self) {
        if self.reading.load(Ordering::SeqCst) > 0 {
            self.stop_during_read.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Open/stop bookkeeping shared by a fake stack and its streams.
#[derive(Default)]
struct StreamStats {
    opened: AtomicUsize,
    stopped: AtomicUsize,
    monitor: ReadMonitor,
}

struct FakeStream {
    capturing: bool,
    stats: Arc<StreamStats>,
    frames: Vec<StereoFrame>,
}

impl CaptureStream for FakeStream {
    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.stats.monitor.stopping();
        self.capturing = false;
        self.stats.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SampleBuffer for FakeStream {
    fn read_latest(&mut self, frames: &mut [StereoFrame]) -> Result<(), AudioError> {
        if !self.capturing {
            return Err(AudioError::Native("capture buffer is stopped".into()));
        }
        let source = &self.frames;
        self.stats.monitor.read(|| {
            for (i, frame) in frames.iter_mut().enumerate() {
                *frame = source.get(i % source.len().max(1)).copied().unwrap_or_default();
            }
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

const ENDPOINT_STEPS: f32 = 50.0;

struct EndpointState {
    interface: String,
    line: String,
    interface_fails: AtomicBool,
    volume: Mutex<f32>,
    muted: AtomicBool,
    peak: Mutex<f32>,
    stats: Mutex<Option<Arc<StreamStats>>>,
}

/// A fake endpoint. Starts at full volume, unmuted, silent.
#[derive(Clone)]
pub(crate) struct FakeEndpoint {
    state: Arc<EndpointState>,
}

impl FakeEndpoint {
    pub fn new(interface: &str, line: &str) -> Self {
        Self {
            state: Arc::new(EndpointState {
                interface: interface.to_string(),
                line: line.to_string(),
                interface_fails: AtomicBool::new(false),
                volume: Mutex::new(1.0),
                muted: AtomicBool::new(false),
                peak: Mutex::new(0.0),
                stats: Mutex::new(None),
            }),
        }
    }

    pub fn fail_interface_lookup(&self) {
        self.state.interface_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_peak(&self, peak: f32) {
        *self.state.peak.lock() = peak;
    }

    pub fn scalar(&self) -> f32 {
        *self.state.volume.lock()
    }

    fn attach(&self, stats: &Arc<StreamStats>) {
        *self.state.stats.lock() = Some(Arc::clone(stats));
    }

    fn step(&self, direction: f32) {
        let mut volume = self.state.volume.lock();
        let steps = (*volume * ENDPOINT_STEPS).round() + direction;
        *volume = (steps / ENDPOINT_STEPS).clamp(0.0, 1.0);
    }
}

impl AudioEndpoint for FakeEndpoint {
    fn line_name(&self) -> Result<String, AudioError> {
        Ok(self.state.line.clone())
    }

    fn interface_name(&self) -> Result<String, AudioError> {
        if self.state.interface_fails.load(Ordering::SeqCst) {
            return Err(AudioError::Native("property not found".into()));
        }
        Ok(self.state.interface.clone())
    }

    fn volume_scalar(&self) -> Result<f32, AudioError> {
        Ok(self.scalar())
    }

    fn set_volume_scalar(&self, level: f32) -> Result<(), AudioError> {
        *self.state.volume.lock() = level.clamp(0.0, 1.0);
        Ok(())
    }

    fn volume_step_up(&self) -> Result<(), AudioError> {
        self.step(1.0);
        Ok(())
    }

    fn volume_step_down(&self) -> Result<(), AudioError> {
        self.step(-1.0);
        Ok(())
    }

    fn mute(&self) -> Result<bool, AudioError> {
        Ok(self.state.muted.load(Ordering::SeqCst))
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.state.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn peak_value(&self) -> Result<f32, AudioError> {
        let peak = *self.state.peak.lock();
        let stats = self.state.stats.lock().clone();
        Ok(match stats {
            Some(stats) => stats.monitor.read(|| peak),
            None => peak,
        })
    }
}

#[derive(Default)]
struct EndpointsState {
    capture: Mutex<Vec<FakeEndpoint>>,
    render: Mutex<Vec<FakeEndpoint>>,
    default_capture: Mutex<Option<usize>>,
    default_render: Mutex<Option<usize>>,
    last_stream_index: Mutex<Option<Option<usize>>>,
    stats: Arc<StreamStats>,
}

/// A fake endpoint stack.
#[derive(Clone, Default)]
pub(crate) struct FakeEndpoints {
    state: Arc<EndpointsState>,
}

impl FakeEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, flow: DataFlow) -> &Mutex<Vec<FakeEndpoint>> {
        match flow {
            DataFlow::Capture => &self.state.capture,
            DataFlow::Render => &self.state.render,
        }
    }

    fn default_slot(&self, flow: DataFlow) -> &Mutex<Option<usize>> {
        match flow {
            DataFlow::Capture => &self.state.default_capture,
            DataFlow::Render => &self.state.default_render,
        }
    }

    pub fn add_capture(&self, endpoint: FakeEndpoint) {
        endpoint.attach(&self.state.stats);
        self.state.capture.lock().push(endpoint);
    }

    pub fn add_render(&self, endpoint: FakeEndpoint) {
        endpoint.attach(&self.state.stats);
        self.state.render.lock().push(endpoint);
    }

    /// Unplug a capture endpoint by line name.
    pub fn remove_capture(&self, line: &str) {
        self.state.capture.lock().retain(|e| e.state.line != line);
    }

    pub fn set_default(&self, flow: DataFlow, index: usize) {
        *self.default_slot(flow).lock() = Some(index);
    }

    pub fn capture(&self, line: &str) -> Option<FakeEndpoint> {
        self.find(DataFlow::Capture, line)
    }

    pub fn render(&self, line: &str) -> Option<FakeEndpoint> {
        self.find(DataFlow::Render, line)
    }

    fn find(&self, flow: DataFlow, line: &str) -> Option<FakeEndpoint> {
        self.list(flow)
            .lock()
            .iter()
            .find(|e| e.state.line == line)
            .cloned()
    }

    /// Slow down every meter read so concurrent calls overlap.
    pub fn set_stream_read_delay(&self, delay: Duration) {
        *self.state.stats.monitor.delay.lock() = delay;
    }

    pub fn streams_opened(&self) -> usize {
        self.state.stats.opened.load(Ordering::SeqCst)
    }

    pub fn streams_stopped(&self) -> usize {
        self.state.stats.stopped.load(Ordering::SeqCst)
    }

    /// Times a stream was stopped while a meter read was in progress.
    pub fn stop_during_read(&self) -> usize {
        self.state.stats.monitor.stop_during_read.load(Ordering::SeqCst)
    }

    /// Device index passed to the most recent stream open.
    pub fn last_stream_index(&self) -> Option<Option<usize>> {
        *self.state.last_stream_index.lock()
    }
}

impl EndpointApi for FakeEndpoints {
    fn enumerate(&self, flow: DataFlow) -> Result<Vec<Arc<dyn AudioEndpoint>>, AudioError> {
        Ok(self
            .list(flow)
            .lock()
            .iter()
            .map(|e| Arc::new(e.clone()) as Arc<dyn AudioEndpoint>)
            .collect())
    }

    fn default_endpoint(&self, flow: DataFlow) -> Result<Option<Arc<dyn AudioEndpoint>>, AudioError> {
        let index = *self.default_slot(flow).lock();
        let list = self.list(flow).lock();
        Ok(index
            .and_then(|i| list.get(i))
            .map(|e| Arc::new(e.clone()) as Arc<dyn AudioEndpoint>))
    }

    fn open_capture_stream(
        &self,
        device_index: Option<usize>,
        _buffer: Duration,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        *self.state.last_stream_index.lock() = Some(device_index);
        self.state.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            capturing: true,
            stats: Arc::clone(&self.state.stats),
            frames: Vec::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Mixers
// ---------------------------------------------------------------------------

struct LineState {
    name: String,
    has_select: bool,
    has_mute: bool,
    muted: AtomicBool,
    volume: AtomicU32,
    volume_max: u32,
    /// Mixer refuses to make this line active
    reject_select: AtomicBool,
    /// Active line of the owning mixer, shared by its lines.
    selected: Mutex<Option<Arc<Mutex<Option<String>>>>>,
}

/// A fake mixer line. Defaults to selectable, with mute, native range 0-65535.
#[derive(Clone)]
pub(crate) struct FakeLine {
    state: Arc<LineState>,
}

impl FakeLine {
    pub fn new(name: &str) -> Self {
        Self::with_controls(name, true, true, 65535)
    }

    pub fn with_controls(name: &str, has_select: bool, has_mute: bool, volume_max: u32) -> Self {
        Self {
            state: Arc::new(LineState {
                name: name.to_string(),
                has_select,
                has_mute,
                muted: AtomicBool::new(false),
                volume: AtomicU32::new(volume_max),
                volume_max,
                reject_select: AtomicBool::new(false),
                selected: Mutex::new(None),
            }),
        }
    }

    pub fn native_volume(&self) -> u32 {
        self.state.volume.load(Ordering::SeqCst)
    }

    pub fn set_native_volume(&self, value: u32) {
        self.state.volume.store(value, Ordering::SeqCst);
    }

    /// Make the mixer refuse to select this line.
    pub fn reject_select(&self) {
        self.state.reject_select.store(true, Ordering::SeqCst);
    }

    fn group(&self) -> Option<Arc<Mutex<Option<String>>>> {
        self.state.selected.lock().clone()
    }
}

impl MixerLine for FakeLine {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn contains_selected(&self) -> bool {
        self.state.has_select
    }

    fn is_selected(&self) -> Result<bool, AudioError> {
        if !self.state.has_select {
            return Ok(false);
        }
        Ok(self
            .group()
            .map(|g| g.lock().as_deref() == Some(self.state.name.as_str()))
            .unwrap_or(false))
    }

    fn select(&self) -> Result<(), AudioError> {
        if !self.state.has_select {
            return Err(AudioError::Native("line has no select control".into()));
        }
        if self.state.reject_select.load(Ordering::SeqCst) {
            return Err(AudioError::Native("MMRESULT 11".into()));
        }
        if let Some(group) = self.group() {
            *group.lock() = Some(self.state.name.clone());
        }
        Ok(())
    }

    fn contains_mute(&self) -> bool {
        self.state.has_mute
    }

    fn mute(&self) -> Result<bool, AudioError> {
        Ok(self.state.has_mute && self.state.muted.load(Ordering::SeqCst))
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        if !self.state.has_mute {
            return Err(AudioError::Native("line has no mute control".into()));
        }
        self.state.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn volume(&self) -> Result<u32, AudioError> {
        Ok(self.native_volume())
    }

    fn volume_max(&self) -> u32 {
        self.state.volume_max
    }

    fn set_volume(&self, value: u32) -> Result<(), AudioError> {
        self.set_native_volume(value.min(self.state.volume_max));
        Ok(())
    }
}

struct FakeMixer {
    device: MixerDevice,
    lines: Vec<FakeLine>,
    selected: Arc<Mutex<Option<String>>>,
    /// Frames served by the capture buffer opened on this mixer
    frames: Vec<StereoFrame>,
    has_capture_buffer: bool,
}

#[derive(Default)]
struct MixersState {
    recording: Mutex<Vec<FakeMixer>>,
    playback: Mutex<Vec<FakeMixer>>,
    default_recording: Mutex<Option<u32>>,
    default_playback: Mutex<Option<u32>>,
    last_format: Mutex<Option<CaptureFormat>>,
    stats: Arc<StreamStats>,
}

/// A fake mixer stack.
#[derive(Clone, Default)]
pub(crate) struct FakeMixers {
    state: Arc<MixersState>,
}

impl FakeMixers {
    pub fn new() -> Self {
        Self::default()
    }

    fn mixers(&self, flow: DataFlow) -> &Mutex<Vec<FakeMixer>> {
        match flow {
            DataFlow::Capture => &self.state.recording,
            DataFlow::Render => &self.state.playback,
        }
    }

    fn default_slot(&self, flow: DataFlow) -> &Mutex<Option<u32>> {
        match flow {
            DataFlow::Capture => &self.state.default_recording,
            DataFlow::Render => &self.state.default_playback,
        }
    }

    /// Add a mixer; the first one of each direction becomes the default.
    pub fn add_mixer(&self, flow: DataFlow, id: u32, name: &str) {
        self.mixers(flow).lock().push(FakeMixer {
            device: MixerDevice::new(id, name),
            lines: Vec::new(),
            selected: Arc::new(Mutex::new(None)),
            frames: Vec::new(),
            has_capture_buffer: flow == DataFlow::Capture,
        });
        self.default_slot(flow).lock().get_or_insert(id);
    }

    /// Add a line; the first selectable line of a mixer starts out selected.
    pub fn add_line(&self, flow: DataFlow, id: u32, line: FakeLine) {
        let mut mixers = self.mixers(flow).lock();
        if let Some(mixer) = mixers.iter_mut().find(|m| m.device.id == id) {
            *line.state.selected.lock() = Some(Arc::clone(&mixer.selected));
            if line.state.has_select {
                mixer
                    .selected
                    .lock()
                    .get_or_insert_with(|| line.state.name.clone());
            }
            mixer.lines.push(line);
        }
    }

    pub fn line(&self, flow: DataFlow, id: u32, name: &str) -> Option<FakeLine> {
        self.mixers(flow)
            .lock()
            .iter()
            .find(|m| m.device.id == id)
            .and_then(|m| m.lines.iter().find(|l| l.state.name == name).cloned())
    }

    /// Name of the active line of a mixer, as the hardware sees it.
    pub fn selected_line(&self, flow: DataFlow, id: u32) -> Option<String> {
        self.mixers(flow)
            .lock()
            .iter()
            .find(|m| m.device.id == id)
            .and_then(|m| m.selected.lock().clone())
    }

    pub fn set_capture_frames(&self, id: u32, frames: Vec<StereoFrame>) {
        if let Some(mixer) = self.state.recording.lock().iter_mut().find(|m| m.device.id == id) {
            mixer.frames = frames;
        }
    }

    /// Make the raw capture device of a recording mixer disappear.
    pub fn remove_capture_buffer(&self, id: u32) {
        if let Some(mixer) = self.state.recording.lock().iter_mut().find(|m| m.device.id == id) {
            mixer.has_capture_buffer = false;
        }
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.state.stats.monitor.delay.lock() = delay;
    }

    pub fn buffers_opened(&self) -> usize {
        self.state.stats.opened.load(Ordering::SeqCst)
    }

    pub fn buffers_stopped(&self) -> usize {
        self.state.stats.stopped.load(Ordering::SeqCst)
    }

    pub fn stop_during_read(&self) -> usize {
        self.state.stats.monitor.stop_during_read.load(Ordering::SeqCst)
    }

    pub fn last_format(&self) -> Option<CaptureFormat> {
        *self.state.last_format.lock()
    }
}

impl MixerApi for FakeMixers {
    fn devices(&self, flow: DataFlow) -> Result<Vec<MixerDevice>, AudioError> {
        Ok(self
            .mixers(flow)
            .lock()
            .iter()
            .map(|m| m.device.clone())
            .collect())
    }

    fn default_device(&self, flow: DataFlow) -> Result<Option<MixerDevice>, AudioError> {
        let id = *self.default_slot(flow).lock();
        Ok(id.and_then(|id| {
            self.mixers(flow)
                .lock()
                .iter()
                .find(|m| m.device.id == id)
                .map(|m| m.device.clone())
        }))
    }

    fn lines(&self, flow: DataFlow, device_id: u32) -> Result<Vec<Box<dyn MixerLine>>, AudioError> {
        let mixers = self.mixers(flow).lock();
        let mixer = mixers
            .iter()
            .find(|m| m.device.id == device_id)
            .ok_or_else(|| AudioError::Native(format!("bad mixer id {}", device_id)))?;
        Ok(mixer
            .lines
            .iter()
            .map(|l| Box::new(l.clone()) as Box<dyn MixerLine>)
            .collect())
    }

    fn open_capture_buffer(
        &self,
        device_name: &str,
        format: &CaptureFormat,
    ) -> Result<Option<Box<dyn SampleBuffer>>, AudioError> {
        let mixers = self.state.recording.lock();
        let Some(mixer) = mixers
            .iter()
            .find(|m| m.device.name == device_name && m.has_capture_buffer)
        else {
            return Ok(None);
        };

        *self.state.last_format.lock() = Some(*format);
        self.state.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Box::new(FakeStream {
            capturing: true,
            stats: Arc::clone(&self.state.stats),
            frames: mixer.frames.clone(),
        })))
    }
}
