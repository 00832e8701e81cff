// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::io;
use std::path::Path;
use uinput_ioctls::codes::*;

use super::uinput_device::{AbsAxis, DeviceSetup, UinputDevice};
use super::{invalid_slot, EventEmitter, InputSink, SinkError};
use crate::report::{FINGER_COUNT, PANEL_HEIGHT, PANEL_WIDTH};

pub const DEVICE_NAME: &str = "Waveshare 7inch HDMI LCD (B)";

const TRACKING_ID_MAX: i32 = 0xffff;

const ABS_AXES: [AbsAxis; 4] = [
    AbsAxis {
        code: ABS_MT_SLOT,
        minimum: 0,
        maximum: FINGER_COUNT as i32 - 1,
    },
    AbsAxis {
        code: ABS_MT_TRACKING_ID,
        minimum: 0,
        maximum: TRACKING_ID_MAX,
    },
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

/// Slot based (type-B) sink. Mirrors input_mt_slot /
/// input_mt_report_slot_state / input_mt_sync_frame of the kernel.
#[derive(Debug)]
pub struct MtSlotSink<E: EventEmitter> {
    emitter: E,
    tracking_ids: [Option<i32>; FINGER_COUNT],
    next_tracking_id: i32,
}

impl MtSlotSink<UinputDevice> {
    pub fn create(uinput_path: &Path) -> Result<Self, SinkError> {
        let device = UinputDevice::create(
            uinput_path,
            &DeviceSetup {
                name: DEVICE_NAME,
                abs_axes: &ABS_AXES,
                keys: &[BTN_TOUCH],
                props: &[INPUT_PROP_DIRECT],
            },
        )?;
        Ok(Self::new(device))
    }
}

impl<E: EventEmitter> MtSlotSink<E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            tracking_ids: [None; FINGER_COUNT],
            next_tracking_id: 0,
        }
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    fn fresh_tracking_id(&mut self) -> i32 {
        let id = self.next_tracking_id;
        self.next_tracking_id = (self.next_tracking_id + 1) & TRACKING_ID_MAX;
        id
    }
}

impl<E: EventEmitter> InputSink for MtSlotSink<E> {
    fn set_slot(&mut self, slot: u8, x: u16, y: u16, pressed: bool) -> io::Result<()> {
        let index = usize::from(slot);
        if index >= FINGER_COUNT {
            return Err(invalid_slot(slot));
        }

        self.emitter.emit(EV_ABS, ABS_MT_SLOT, slot.into())?;
        if pressed {
            if self.tracking_ids[index].is_none() {
                let id = self.fresh_tracking_id();
                self.tracking_ids[index] = Some(id);
                self.emitter.emit(EV_ABS, ABS_MT_TRACKING_ID, id)?;
            }
            self.emitter.emit(EV_ABS, ABS_MT_POSITION_X, x.into())?;
            self.emitter.emit(EV_ABS, ABS_MT_POSITION_Y, y.into())?;
        } else {
            self.tracking_ids[index] = None;
            self.emitter.emit(EV_ABS, ABS_MT_TRACKING_ID, -1)?;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        let touching = self.tracking_ids.iter().any(Option::is_some);
        self.emitter.emit(EV_KEY, BTN_TOUCH, touching.into())?;
        self.emitter.emit(EV_SYN, SYN_REPORT, 0)
    }
}
