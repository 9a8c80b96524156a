//! Audio Device Console
//!
//! Interactive and multi-threaded exerciser for the audio device control
//! library.

mod workers;

use anyhow::{Context, Result};
use audio_device_control::{AudioDeviceControl, AudioDeviceFacade, AudioError, DeviceSelection};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workers::{line_choices, HarnessConfig, Worker, WorkerSet};

/// Number of meter reads taken by the interactive peak feed.
const PEAK_FEED_READS: usize = 100;

/// Interval of the device switcher when it runs alone.
const FAST_SWITCH_INTERVAL: Duration = Duration::from_millis(500);

/// Interval of the device switcher when it races the peak feeder alone.
const PEAK_RACE_SWITCH_INTERVAL: Duration = Duration::from_millis(2000);

/// Top-level programs of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Program {
    /// Drive one selected capture device by hand.
    Interactive,
    /// Switch between capture devices.
    DeviceSwitching,
    /// Peak feeding against device switching.
    PeakAndSwitching,
    /// Peak feeding against device switching and volume setting.
    PeakSwitchingAndVolume,
    /// Peak feeding against mute toggling.
    PeakAndMute,
    Exit,
}

impl Program {
    fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Program::Interactive),
            "2" => Some(Program::DeviceSwitching),
            "3" => Some(Program::PeakAndSwitching),
            "4" => Some(Program::PeakSwitchingAndVolume),
            "5" => Some(Program::PeakAndMute),
            "6" => Some(Program::Exit),
            _ => None,
        }
    }

    /// Workers of a concurrent program and their intervals.
    fn workers(self, config: &HarnessConfig) -> Vec<(Worker, Duration)> {
        let default = |worker: Worker| (worker, worker.interval(config));
        match self {
            Program::DeviceSwitching => vec![(Worker::DeviceChanger, FAST_SWITCH_INTERVAL)],
            Program::PeakAndSwitching => vec![
                (Worker::DeviceChanger, PEAK_RACE_SWITCH_INTERVAL),
                default(Worker::PeakFeeder),
            ],
            Program::PeakSwitchingAndVolume => vec![
                default(Worker::DeviceChanger),
                default(Worker::PeakFeeder),
                default(Worker::VolumeChanger),
            ],
            Program::PeakAndMute => vec![default(Worker::PeakFeeder), default(Worker::MuteToggler)],
            Program::Interactive | Program::Exit => Vec::new(),
        }
    }
}

/// Commands of the interactive program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    VolumeUp,
    VolumeDown,
    /// Show the volume, or set it when a level is given.
    Volume(Option<i32>),
    ToggleMute,
    PeakFeed,
    Display,
    List,
    NewDevice,
    Help,
    Exit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let command = match parts.next()? {
            "+" => Command::VolumeUp,
            "-" => Command::VolumeDown,
            "v" => match parts.next() {
                Some(level) => Command::Volume(Some(level.parse().ok()?)),
                None => Command::Volume(None),
            },
            "m" => Command::ToggleMute,
            "p" => Command::PeakFeed,
            "d" => Command::Display,
            "l" => Command::List,
            "n" => Command::NewDevice,
            "?" => Command::Help,
            "x" => Command::Exit,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(command)
    }
}

/// Line-oriented console input.
struct Console<I> {
    lines: I,
}

impl<I: Iterator<Item = io::Result<String>>> Console<I> {
    /// Next input line, `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        io::stdout().flush()?;
        Ok(self.lines.next().transpose()?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    #[cfg(windows)]
    let _com = audio_device_control::platform::windows::ComGuard::new()
        .context("COM initialization failed")?;

    let facade = AudioDeviceFacade::new().context("Failed to bind an audio backend")?;
    info!(
        "Running on {:?} with the {} backend",
        facade.operating_system(),
        facade.platform()
    );

    let control: Arc<dyn AudioDeviceControl> = Arc::new(facade.into_audio_device_control());
    let config = HarnessConfig::default();
    let mut console = Console {
        lines: io::stdin().lines(),
    };

    loop {
        print_programs();
        let Some(choice) = console.read_line()? else {
            break;
        };

        match Program::from_choice(&choice) {
            Some(Program::Exit) => break,
            Some(Program::Interactive) => {
                if !run_interactive(control.as_ref(), &config, &mut console)? {
                    break;
                }
            }
            Some(program) => run_concurrent(program, &control, &config, &mut console)?,
            None => println!("Invalid choice. Try again."),
        }
    }

    Ok(())
}

fn print_programs() {
    println!("\n\nWhat do you want to do?");
    println!("\t1. Test audio device control on a selected device.");
    println!("\t2. Test switching between devices.");
    println!("\t3. Concurrency Test:\n\t\t - Peak feeding.\n\t\t - Device switching.");
    println!(
        "\t4. Concurrency Test:\n\t\t - Peak feeding.\n\t\t - Device switching.\n\t\t - Volume setting."
    );
    println!("\t5. Concurrency Test:\n\t\t - Mute toggling.\n\t\t - Peak feeding.");
    println!("\t6. Exit.");
}

/// Run the workers of `program` until the user presses enter.
fn run_concurrent<I: Iterator<Item = io::Result<String>>>(
    program: Program,
    control: &Arc<dyn AudioDeviceControl>,
    config: &HarnessConfig,
    console: &mut Console<I>,
) -> Result<()> {
    if program == Program::PeakAndMute {
        report(control.set_capture_mute(true).map(|muted| println!("Mute: {}", muted)));
    }

    let mut workers = WorkerSet::new(Arc::clone(control));
    for (worker, interval) in program.workers(config) {
        workers
            .spawn(worker, interval)
            .with_context(|| format!("Failed to start {}", worker.name()))?;
    }
    info!("Started {} worker(s); press enter to stop", workers.len());

    console.read_line()?;
    println!("\nStopping program...");
    workers.stop();
    Ok(())
}

/// Drive a selected capture device by hand. Returns false when the user asked
/// to leave the console.
fn run_interactive<I: Iterator<Item = io::Result<String>>>(
    control: &dyn AudioDeviceControl,
    config: &HarnessConfig,
    console: &mut Console<I>,
) -> Result<bool> {
    if !select_device(control, console)? {
        return Ok(false);
    }
    print_help();

    while let Some(input) = console.read_line()? {
        let Some(command) = Command::parse(&input) else {
            println!("Invalid choice. Try again.");
            continue;
        };

        match command {
            Command::VolumeUp => report(
                control
                    .increment_capture_volume()
                    .map(|v| println!("Volume: {}", v)),
            ),
            Command::VolumeDown => report(
                control
                    .decrement_capture_volume()
                    .map(|v| println!("Volume: {}", v)),
            ),
            Command::Volume(None) => report(
                control
                    .get_capture_volume()
                    .map(|v| println!("Volume: {}", v)),
            ),
            Command::Volume(Some(level)) => report(
                control
                    .set_capture_volume(level)
                    .map(|v| println!("Volume: {}", v)),
            ),
            Command::ToggleMute => report(
                control
                    .toggle_capture_mute()
                    .map(|muted| println!("Mute: {}", muted)),
            ),
            Command::PeakFeed => report(peak_feed(control, config.peak_interval)),
            Command::Display => report(display_selected_device(control)),
            Command::List => report(list_devices(control)),
            Command::NewDevice => {
                if !select_device(control, console)? {
                    return Ok(false);
                }
            }
            Command::Help => print_help(),
            Command::Exit => return Ok(false),
        }
    }

    Ok(false)
}

/// Prompt for a capture line until one is selected. Returns false when the
/// user asked to leave.
fn select_device<I: Iterator<Item = io::Result<String>>>(
    control: &dyn AudioDeviceControl,
    console: &mut Console<I>,
) -> Result<bool> {
    let choices = match print_capture_choices(control) {
        Ok(choices) => choices,
        Err(e) => {
            println!("Error: {}", e);
            return Ok(false);
        }
    };

    while let Some(input) = console.read_line()? {
        let input = input.trim();
        if input == "x" {
            return Ok(false);
        }

        let choice = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| choices.get(i));
        let Some(choice) = choice else {
            println!("Invalid choice. Try again.");
            continue;
        };

        match control.set_capture_device(&choice.interface, &choice.line) {
            Ok(()) => {
                report(display_selected_device(control));
                return Ok(true);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(false)
}

fn print_capture_choices(control: &dyn AudioDeviceControl) -> Result<Vec<DeviceSelection>, AudioError> {
    println!("Select one of the available capture lines:\n");

    let choices = line_choices(&control.get_capture_devices_info()?);
    let mut current = "";
    for (i, choice) in choices.iter().enumerate() {
        if choice.interface != current {
            current = choice.interface.as_str();
            println!("\tDevice Interface: {}", choice.interface);
            println!("\tDevice Line(s): ");
        }
        println!("\t\t{} - {}", i + 1, choice.line);
    }
    println!("\n\t\tx - Exit.");

    Ok(choices)
}

fn list_devices(control: &dyn AudioDeviceControl) -> Result<(), AudioError> {
    for (title, registry) in [
        ("Capture", control.get_capture_devices_info()?),
        ("Render", control.get_render_devices_info()?),
    ] {
        println!("{} devices:", title);
        for interface in registry.interface_names() {
            println!("\t{}", interface);
            for line in registry.lines(interface).unwrap_or_default() {
                let mute = if line.mutable { "" } else { " (no mute)" };
                println!("\t\t{} [{}]{}", line.line_name, line.friendly_name, mute);
            }
        }
    }
    Ok(())
}

fn peak_feed(control: &dyn AudioDeviceControl, interval: Duration) -> Result<(), AudioError> {
    for _ in 0..PEAK_FEED_READS {
        println!("Peak Feed: {}", control.get_capture_device_master_peak_value()?);
        std::thread::sleep(interval);
    }
    control.dispose_capture_device_master_peak_value()
}

fn display_selected_device(control: &dyn AudioDeviceControl) -> Result<(), AudioError> {
    let selected = control.get_selected_capture_device_info()?;
    println!("You have selected: {} - {}\n", selected.interface, selected.line);

    let os_default = control.get_windows_selected_capture_device_info()?;
    if !os_default.is_empty() && os_default != selected {
        println!("System default: {} - {}\n", os_default.interface, os_default.line);
    }
    Ok(())
}

fn print_help() {
    println!("Input Instructions to send to this capture line:\n");
    println!("\t+ Volume Up.");
    println!("\t- Volume Down.");
    println!("\tv [level] Show or set volume.");
    println!("\tm Mute.");
    println!("\tp Peak Feed.");
    println!("\td Display selected device.");
    println!("\tl List all devices.");
    println!("\tn Select new device.");
    println!("\t? Help.");
    println!("\tx Exit.");
    println!();
}

/// Print a failed operation and carry on.
fn report(result: Result<(), AudioError>) {
    if let Err(e) = result {
        println!("Error: {}", e);
    }
}
