//! Mixer seam over the WinMM mixer API.
//!
//! A recording mixer's user lines are the sources of its wave-in
//! destination; the active one is chosen by the destination's MUX (exactly
//! one source) or MIXER (any number of sources) control. A playback mixer's
//! user lines are the sources of its speaker destination.

use super::dsound;
use super::from_wide;
use crate::audio::capture::{CaptureFormat, SampleBuffer};
use crate::audio::mixer::{MixerApi, MixerDevice, MixerLine};
use crate::audio::{AudioError, DataFlow};
use std::ffi::c_void;
use tracing::debug;
use windows::Win32::Media::Audio::{
    mixerGetControlDetailsW, mixerGetDevCapsW, mixerGetID, mixerGetLineControlsW,
    mixerGetLineInfoW, mixerGetNumDevs, mixerSetControlDetails, HMIXEROBJ, MIXERCAPSW,
    MIXERCONTROLDETAILS, MIXERCONTROLDETAILS_0, MIXERCONTROLDETAILS_BOOLEAN,
    MIXERCONTROLDETAILS_LISTTEXTW, MIXERCONTROLDETAILS_UNSIGNED, MIXERCONTROLW,
    MIXERLINECONTROLSW, MIXERLINECONTROLSW_0, MIXERLINEW, MIXERLINE_COMPONENTTYPE_DST_SPEAKERS,
    MIXERLINE_COMPONENTTYPE_DST_WAVEIN,
};

// mmsystem.h
const MMSYSERR_NOERROR: u32 = 0;
const MIXER_OBJECTF_MIXER: u32 = 0x0000_0000;
const MIXER_OBJECTF_WAVEOUT: u32 = 0x1000_0000;
const MIXER_OBJECTF_WAVEIN: u32 = 0x2000_0000;
const MIXER_GETLINEINFOF_DESTINATION: u32 = 0x0000_0000;
const MIXER_GETLINEINFOF_SOURCE: u32 = 0x0000_0001;
const MIXER_GETLINECONTROLSF_ONEBYTYPE: u32 = 0x0000_0002;
const MIXER_GETCONTROLDETAILSF_VALUE: u32 = 0x0000_0000;
const MIXER_GETCONTROLDETAILSF_LISTTEXT: u32 = 0x0000_0001;
const MIXER_SETCONTROLDETAILSF_VALUE: u32 = 0x0000_0000;
const MIXERCONTROL_CONTROLTYPE_VOLUME: u32 = 0x5003_0001;
const MIXERCONTROL_CONTROLTYPE_MUTE: u32 = 0x2001_0002;
const MIXERCONTROL_CONTROLTYPE_MUX: u32 = 0x7001_0001;
const MIXERCONTROL_CONTROLTYPE_MIXER: u32 = 0x7101_0001;

fn check(call: &str, result: u32) -> Result<(), AudioError> {
    if result == MMSYSERR_NOERROR {
        Ok(())
    } else {
        Err(AudioError::Native(format!("{} failed with MMRESULT {}", call, result)))
    }
}

fn handle(id: u32) -> HMIXEROBJ {
    HMIXEROBJ(id as _)
}

fn mixer_caps(id: u32) -> Result<MIXERCAPSW, AudioError> {
    let mut caps = MIXERCAPSW::default();
    let result = unsafe {
        mixerGetDevCapsW(id as usize, &mut caps, std::mem::size_of::<MIXERCAPSW>() as u32)
    };
    check("mixerGetDevCaps", result)?;
    Ok(caps)
}

fn line_info(id: u32, line: &mut MIXERLINEW, flags: u32) -> Result<(), AudioError> {
    line.cbStruct = std::mem::size_of::<MIXERLINEW>() as u32;
    let result = unsafe { mixerGetLineInfoW(handle(id), line, MIXER_OBJECTF_MIXER | flags) };
    check("mixerGetLineInfo", result)
}

/// The destination line carrying the given direction, if the mixer has one.
fn destination(id: u32, flow: DataFlow) -> Result<Option<MIXERLINEW>, AudioError> {
    let wanted = match flow {
        DataFlow::Capture => MIXERLINE_COMPONENTTYPE_DST_WAVEIN,
        DataFlow::Render => MIXERLINE_COMPONENTTYPE_DST_SPEAKERS,
    };

    let caps = mixer_caps(id)?;
    for index in 0..caps.cDestinations {
        let mut line = MIXERLINEW {
            dwDestination: index,
            ..Default::default()
        };
        line_info(id, &mut line, MIXER_GETLINEINFOF_DESTINATION)?;
        if line.dwComponentType == wanted {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

fn find_control(id: u32, line_id: u32, control_type: u32) -> Option<MIXERCONTROLW> {
    let mut control = MIXERCONTROLW {
        cbStruct: std::mem::size_of::<MIXERCONTROLW>() as u32,
        ..Default::default()
    };
    let mut controls = MIXERLINECONTROLSW {
        cbStruct: std::mem::size_of::<MIXERLINECONTROLSW>() as u32,
        dwLineID: line_id,
        Anonymous: MIXERLINECONTROLSW_0 {
            dwControlType: control_type,
        },
        cControls: 1,
        cbmxctrl: std::mem::size_of::<MIXERCONTROLW>() as u32,
        pamxctrl: &mut control,
    };

    let result = unsafe {
        mixerGetLineControlsW(
            handle(id),
            &mut controls,
            MIXER_OBJECTF_MIXER | MIXER_GETLINECONTROLSF_ONEBYTYPE,
        )
    };
    (result == MMSYSERR_NOERROR).then_some(control)
}

/// Read or write `items` detail records of one control, applied uniformly
/// to all channels.
fn control_details<T: Default + Clone>(
    id: u32,
    control_id: u32,
    items: u32,
    flags: u32,
    values: Option<&[T]>,
) -> Result<Vec<T>, AudioError> {
    let mut buffer = match values {
        Some(values) => values.to_vec(),
        None => vec![T::default(); items.max(1) as usize],
    };
    let mut details = MIXERCONTROLDETAILS {
        cbStruct: std::mem::size_of::<MIXERCONTROLDETAILS>() as u32,
        dwControlID: control_id,
        cChannels: 1,
        Anonymous: MIXERCONTROLDETAILS_0 {
            cMultipleItems: items,
        },
        cbDetails: std::mem::size_of::<T>() as u32,
        paDetails: buffer.as_mut_ptr() as *mut c_void,
    };

    unsafe {
        if values.is_some() {
            check(
                "mixerSetControlDetails",
                mixerSetControlDetails(handle(id), &details, MIXER_OBJECTF_MIXER | flags),
            )?;
        } else {
            check(
                "mixerGetControlDetails",
                mixerGetControlDetailsW(handle(id), &mut details, MIXER_OBJECTF_MIXER | flags),
            )?;
        }
    }
    Ok(buffer)
}

/// The MUX or MIXER control choosing the active recording source.
#[derive(Debug, Clone, Copy)]
struct SelectControl {
    control_id: u32,
    items: u32,
    exclusive: bool,
}

/// Position of a source line within its select control's item list.
#[derive(Debug, Clone, Copy)]
struct SelectItem {
    control: SelectControl,
    index: usize,
}

/// A user line of a WinMM mixer.
pub struct WinMmLine {
    mixer_id: u32,
    name: String,
    volume: Option<(u32, u32)>,
    mute: Option<u32>,
    select: Option<SelectItem>,
}

impl WinMmLine {
    fn read_select(&self, item: SelectItem) -> Result<Vec<MIXERCONTROLDETAILS_BOOLEAN>, AudioError> {
        control_details(
            self.mixer_id,
            item.control.control_id,
            item.control.items,
            MIXER_GETCONTROLDETAILSF_VALUE,
            None,
        )
    }
}

impl MixerLine for WinMmLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn contains_selected(&self) -> bool {
        self.select.is_some()
    }

    fn is_selected(&self) -> Result<bool, AudioError> {
        let Some(item) = self.select else {
            return Ok(false);
        };
        let values = self.read_select(item)?;
        Ok(values.get(item.index).map(|v| v.fValue != 0).unwrap_or(false))
    }

    fn select(&self) -> Result<(), AudioError> {
        let Some(item) = self.select else {
            return Err(AudioError::Native(format!("{} has no select control", self.name)));
        };
        let mut values = if item.control.exclusive {
            vec![MIXERCONTROLDETAILS_BOOLEAN::default(); item.control.items as usize]
        } else {
            self.read_select(item)?
        };
        if let Some(value) = values.get_mut(item.index) {
            value.fValue = 1;
        }
        control_details(
            self.mixer_id,
            item.control.control_id,
            item.control.items,
            MIXER_SETCONTROLDETAILSF_VALUE,
            Some(&values),
        )?;
        Ok(())
    }

    fn contains_mute(&self) -> bool {
        self.mute.is_some()
    }

    fn mute(&self) -> Result<bool, AudioError> {
        let Some(control_id) = self.mute else {
            return Ok(false);
        };
        let values: Vec<MIXERCONTROLDETAILS_BOOLEAN> =
            control_details(self.mixer_id, control_id, 0, MIXER_GETCONTROLDETAILSF_VALUE, None)?;
        Ok(values[0].fValue != 0)
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        let Some(control_id) = self.mute else {
            return Err(AudioError::Native(format!("{} has no mute control", self.name)));
        };
        let value = MIXERCONTROLDETAILS_BOOLEAN {
            fValue: muted as i32,
        };
        control_details(
            self.mixer_id,
            control_id,
            0,
            MIXER_SETCONTROLDETAILSF_VALUE,
            Some(&[value]),
        )?;
        Ok(())
    }

    fn volume(&self) -> Result<u32, AudioError> {
        let Some((control_id, _)) = self.volume else {
            return Ok(0);
        };
        let values: Vec<MIXERCONTROLDETAILS_UNSIGNED> =
            control_details(self.mixer_id, control_id, 0, MIXER_GETCONTROLDETAILSF_VALUE, None)?;
        Ok(values[0].dwValue)
    }

    fn volume_max(&self) -> u32 {
        self.volume.map(|(_, max)| max).unwrap_or(0)
    }

    fn set_volume(&self, value: u32) -> Result<(), AudioError> {
        let Some((control_id, max)) = self.volume else {
            return Err(AudioError::Native(format!("{} has no volume control", self.name)));
        };
        let value = MIXERCONTROLDETAILS_UNSIGNED {
            dwValue: value.min(max),
        };
        control_details(
            self.mixer_id,
            control_id,
            0,
            MIXER_SETCONTROLDETAILSF_VALUE,
            Some(&[value]),
        )?;
        Ok(())
    }
}

/// The WinMM mixer devices of the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinMmMixers;

impl WinMmMixers {
    pub fn new() -> Self {
        Self
    }

    fn select_control(id: u32, destination: &MIXERLINEW) -> Option<(SelectControl, Vec<u32>)> {
        let line_id = destination.dwLineID;
        let items = destination.cConnections;

        let (control, exclusive) = match find_control(id, line_id, MIXERCONTROL_CONTROLTYPE_MUX) {
            Some(control) => (control, true),
            None => (find_control(id, line_id, MIXERCONTROL_CONTROLTYPE_MIXER)?, false),
        };
        let select = SelectControl {
            control_id: control.dwControlID,
            items: control.cMultipleItems.max(items),
            exclusive,
        };

        // Each item names a source by its line id
        let texts: Vec<MIXERCONTROLDETAILS_LISTTEXTW> = control_details(
            id,
            select.control_id,
            select.items,
            MIXER_GETCONTROLDETAILSF_LISTTEXT,
            None,
        )
        .ok()?;
        let line_ids = texts.iter().map(|t| t.dwParam1).collect();
        Some((select, line_ids))
    }
}

impl MixerApi for WinMmMixers {
    fn devices(&self, flow: DataFlow) -> Result<Vec<MixerDevice>, AudioError> {
        let count = unsafe { mixerGetNumDevs() };
        let mut devices = Vec::new();

        for id in 0..count {
            if destination(id, flow)?.is_none() {
                continue;
            }
            let caps = mixer_caps(id)?;
            let name = caps.szPname;
            devices.push(MixerDevice::new(id, from_wide(&name)));
        }
        Ok(devices)
    }

    fn default_device(&self, flow: DataFlow) -> Result<Option<MixerDevice>, AudioError> {
        let object = match flow {
            DataFlow::Capture => MIXER_OBJECTF_WAVEIN,
            DataFlow::Render => MIXER_OBJECTF_WAVEOUT,
        };

        // Mixer of the first wave device of this direction
        let mut id = 0u32;
        let result = unsafe { mixerGetID(handle(0), &mut id, object) };
        if result != MMSYSERR_NOERROR {
            return Ok(self.devices(flow)?.into_iter().next());
        }

        let caps = mixer_caps(id)?;
        let name = caps.szPname;
        Ok(Some(MixerDevice::new(id, from_wide(&name))))
    }

    fn lines(&self, flow: DataFlow, device_id: u32) -> Result<Vec<Box<dyn MixerLine>>, AudioError> {
        let Some(destination) = destination(device_id, flow)? else {
            return Ok(Vec::new());
        };
        let select = match flow {
            DataFlow::Capture => Self::select_control(device_id, &destination),
            DataFlow::Render => None,
        };

        let mut lines: Vec<Box<dyn MixerLine>> = Vec::new();
        for source in 0..destination.cConnections {
            let mut line = MIXERLINEW {
                dwDestination: destination.dwDestination,
                dwSource: source,
                ..Default::default()
            };
            line_info(device_id, &mut line, MIXER_GETLINEINFOF_SOURCE)?;

            let line_id = line.dwLineID;
            let name = line.szName;
            let volume = find_control(device_id, line_id, MIXERCONTROL_CONTROLTYPE_VOLUME).map(|c| {
                let bounds = c.Bounds;
                (c.dwControlID, unsafe { bounds.Anonymous2.dwMaximum })
            });
            let mute = find_control(device_id, line_id, MIXERCONTROL_CONTROLTYPE_MUTE).map(|c| c.dwControlID);
            let select = select.as_ref().and_then(|(control, ids)| {
                ids.iter().position(|&id| id == line_id).map(|index| SelectItem {
                    control: *control,
                    index,
                })
            });

            lines.push(Box::new(WinMmLine {
                mixer_id: device_id,
                name: from_wide(&name),
                volume,
                mute,
                select,
            }));
        }

        debug!("Mixer {} exposes {} {} lines", device_id, lines.len(), flow);
        Ok(lines)
    }

    fn open_capture_buffer(
        &self,
        device_name: &str,
        format: &CaptureFormat,
    ) -> Result<Option<Box<dyn SampleBuffer>>, AudioError> {
        Ok(dsound::DirectSoundBuffer::open(device_name, format)?
            .map(|buffer| Box::new(buffer) as Box<dyn SampleBuffer>))
    }
}
