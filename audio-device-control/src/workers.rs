//! Stress workers for the console harness.
//!
//! Each worker drives one part of the capability interface from its own
//! thread at its own interval until the shared [`ShutdownSignal`] fires.

use audio_device_control::{AudioDeviceControl, DeviceRegistry, DeviceSelection};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Capture volumes the volume changer cycles through.
pub const VOLUME_STEPS: [i32; 5] = [0, 25, 50, 75, 100];

/// Poll intervals of the stress workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub device_switch_interval: Duration,
    pub peak_interval: Duration,
    pub volume_interval: Duration,
    pub mute_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            device_switch_interval: Duration::from_millis(7000),
            peak_interval: Duration::from_millis(100),
            volume_interval: Duration::from_millis(2000),
            mute_interval: Duration::from_millis(3000),
        }
    }
}

/// Cancellation shared by every worker of a run.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stop every worker and wake the sleeping ones.
    pub fn shutdown(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    /// Sleep for `interval` or until shutdown. Returns true once shut down.
    pub fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Every (interface, line) pair of a registry, interfaces in name order and
/// lines in enumeration order.
pub fn line_choices(registry: &DeviceRegistry) -> Vec<DeviceSelection> {
    registry
        .interface_names()
        .into_iter()
        .flat_map(|interface| {
            registry
                .lines(interface)
                .unwrap_or_default()
                .iter()
                .map(move |line| DeviceSelection::new(interface, line.line_name.as_str()))
        })
        .collect()
}

/// Volume set on the `round`th pass of the volume changer.
pub fn volume_step(round: usize) -> i32 {
    VOLUME_STEPS[round % VOLUME_STEPS.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    /// Cycles the capture selection over every enumerated line.
    DeviceChanger,
    /// Polls the capture peak meter and disposes the session on shutdown.
    PeakFeeder,
    /// Cycles the capture volume over [`VOLUME_STEPS`].
    VolumeChanger,
    /// Toggles capture mute.
    MuteToggler,
}

impl Worker {
    pub fn name(self) -> &'static str {
        match self {
            Worker::DeviceChanger => "device-changer",
            Worker::PeakFeeder => "peak-feeder",
            Worker::VolumeChanger => "volume-changer",
            Worker::MuteToggler => "mute-toggler",
        }
    }

    /// Interval of this worker in the default configuration.
    pub fn interval(self, config: &HarnessConfig) -> Duration {
        match self {
            Worker::DeviceChanger => config.device_switch_interval,
            Worker::PeakFeeder => config.peak_interval,
            Worker::VolumeChanger => config.volume_interval,
            Worker::MuteToggler => config.mute_interval,
        }
    }

    fn run(self, control: &dyn AudioDeviceControl, signal: &ShutdownSignal, interval: Duration) {
        match self {
            Worker::DeviceChanger => change_devices(control, signal, interval),
            Worker::PeakFeeder => feed_peaks(control, signal, interval),
            Worker::VolumeChanger => change_volume(control, signal, interval),
            Worker::MuteToggler => toggle_mute(control, signal, interval),
        }
    }
}

fn change_devices(control: &dyn AudioDeviceControl, signal: &ShutdownSignal, interval: Duration) {
    let choices = match control.get_capture_devices_info() {
        Ok(registry) => line_choices(&registry),
        Err(e) => {
            error!("Failed to enumerate capture devices: {}", e);
            return;
        }
    };
    if choices.is_empty() {
        warn!("No capture lines to switch between");
        return;
    }

    for choice in choices.iter().cycle() {
        println!("\tChanging device to {} - {}", choice.interface, choice.line);
        if let Err(e) = control.set_capture_device(&choice.interface, &choice.line) {
            warn!("Device switch failed: {}", e);
        }
        if signal.wait(interval) {
            break;
        }
    }
}

fn feed_peaks(control: &dyn AudioDeviceControl, signal: &ShutdownSignal, interval: Duration) {
    loop {
        match control.get_capture_device_master_peak_value() {
            Ok(peak) => println!("{}", peak),
            Err(e) => warn!("Peak read failed: {}", e),
        }
        if signal.wait(interval) {
            break;
        }
    }

    if let Err(e) = control.dispose_capture_device_master_peak_value() {
        warn!("Failed to dispose the peak session: {}", e);
    }
}

fn change_volume(control: &dyn AudioDeviceControl, signal: &ShutdownSignal, interval: Duration) {
    for round in 0.. {
        let result = control
            .get_capture_volume()
            .and_then(|old| Ok((old, control.set_capture_volume(volume_step(round))?)));
        match result {
            Ok((old, new)) => println!("\tSetting Volume: {} -> {}.", old, new),
            Err(e) => warn!("Volume change failed: {}", e),
        }
        if signal.wait(interval) {
            break;
        }
    }
}

fn toggle_mute(control: &dyn AudioDeviceControl, signal: &ShutdownSignal, interval: Duration) {
    loop {
        match control.toggle_capture_mute() {
            Ok(muted) => println!("\tMute: {}", muted),
            Err(e) => warn!("Mute toggle failed: {}", e),
        }
        if signal.wait(interval) {
            break;
        }
    }
}

/// Workers running against one control, stopped together.
pub struct WorkerSet {
    control: Arc<dyn AudioDeviceControl>,
    signal: Arc<ShutdownSignal>,
    handles: Vec<(Worker, JoinHandle<()>)>,
}

impl WorkerSet {
    pub fn new(control: Arc<dyn AudioDeviceControl>) -> Self {
        Self {
            control,
            signal: ShutdownSignal::new(),
            handles: Vec::new(),
        }
    }

    /// Start `worker` on its own thread.
    pub fn spawn(&mut self, worker: Worker, interval: Duration) -> io::Result<()> {
        let control = Arc::clone(&self.control);
        let signal = Arc::clone(&self.signal);

        let handle = thread::Builder::new()
            .name(worker.name().to_string())
            .spawn(move || {
                #[cfg(windows)]
                let _com = match audio_device_control::platform::windows::ComGuard::new() {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!("COM initialization failed on {}: {}", worker.name(), e);
                        return;
                    }
                };

                debug!("{} started ({} ms)", worker.name(), interval.as_millis());
                worker.run(control.as_ref(), &signal, interval);
                debug!("{} stopped", worker.name());
            })?;

        self.handles.push((worker, handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Signal shutdown and join every worker.
    pub fn stop(self) {
        self.signal.shutdown();
        for (worker, handle) in self.handles {
            if handle.join().is_err() {
                error!("{} panicked", worker.name());
            }
        }
    }
}
