// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::io;
use std::path::Path;
use uinput_ioctls::codes::*;

use super::uinput_device::{AbsAxis, DeviceSetup, UinputDevice};
use super::{invalid_slot, EventEmitter, InputSink, SinkError};
use crate::report::{FINGER_COUNT, PANEL_HEIGHT, PANEL_WIDTH};

pub const DEVICE_NAME: &str = "Waveshare multitouch screen";

const ABS_AXES: [AbsAxis; 2] = [
    AbsAxis {
        code: ABS_MT_POSITION_X,
        minimum: 0,
        maximum: PANEL_WIDTH as i32,
    },
    AbsAxis {
        code: ABS_MT_POSITION_Y,
        minimum: 0,
        maximum: PANEL_HEIGHT as i32,
    },
];

/// Anonymous contact (type-A) sink.
///
/// Every pressed slot becomes one X/Y pair closed by SYN_MT_REPORT. Released
/// slots are simply left out; a frame without any contact gets a lone
/// SYN_MT_REPORT so that consumers see all fingers lifted. The slot number
/// itself never reaches the consumer, which may therefore reassign finger
/// identities between frames.
#[derive(Debug)]
pub struct LegacyMtSink<E: EventEmitter> {
    emitter: E,
    contacts_in_frame: usize,
}

impl LegacyMtSink<UinputDevice> {
    pub fn create(uinput_path: &Path) -> Result<Self, SinkError> {
        let device = UinputDevice::create(
            uinput_path,
            &DeviceSetup {
                name: DEVICE_NAME,
                abs_axes: &ABS_AXES,
                keys: &[],
                props: &[],
            },
        )?;
        Ok(Self::new(device))
    }
}

impl<E: EventEmitter> LegacyMtSink<E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            contacts_in_frame: 0,
        }
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }
}

impl<E: EventEmitter> InputSink for LegacyMtSink<E> {
    fn set_slot(&mut self, slot: u8, x: u16, y: u16, pressed: bool) -> io::Result<()> {
        if usize::from(slot) >= FINGER_COUNT {
            return Err(invalid_slot(slot));
        }
        if !pressed {
            return Ok(());
        }
        self.emitter.emit(EV_ABS, ABS_MT_POSITION_X, x.into())?;
        self.emitter.emit(EV_ABS, ABS_MT_POSITION_Y, y.into())?;
        self.emitter.emit(EV_SYN, SYN_MT_REPORT, 0)?;
        self.contacts_in_frame += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.contacts_in_frame == 0 {
            self.emitter.emit(EV_SYN, SYN_MT_REPORT, 0)?;
        }
        self.contacts_in_frame = 0;
        self.emitter.emit(EV_SYN, SYN_REPORT, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_are_reported_in_order() {
        let mut sink = LegacyMtSink::new(Vec::new());

        sink.set_slot(0, 100, 50, true).unwrap();
        sink.set_slot(1, 0, 0, false).unwrap();
        sink.set_slot(3, 300, 200, true).unwrap();
        sink.sync().unwrap();

        assert_eq!(
            sink.emitter().as_slice(),
            &[
                (EV_ABS, ABS_MT_POSITION_X, 100),
                (EV_ABS, ABS_MT_POSITION_Y, 50),
                (EV_SYN, SYN_MT_REPORT, 0),
                (EV_ABS, ABS_MT_POSITION_X, 300),
                (EV_ABS, ABS_MT_POSITION_Y, 200),
                (EV_SYN, SYN_MT_REPORT, 0),
                (EV_SYN, SYN_REPORT, 0),
            ]
        );
    }

    #[test]
    fn frame_without_contacts_marks_lift() {
        let mut sink = LegacyMtSink::new(Vec::new());

        sink.set_slot(0, 1, 1, true).unwrap();
        sink.sync().unwrap();
        sink.set_slot(0, 0, 0, false).unwrap();
        sink.sync().unwrap();

        assert_eq!(
            &sink.emitter()[4..],
            &[(EV_SYN, SYN_MT_REPORT, 0), (EV_SYN, SYN_REPORT, 0)]
        );
    }
}
