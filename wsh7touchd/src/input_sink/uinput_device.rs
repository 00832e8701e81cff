// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use libc::{input_event, uinput_abs_setup, uinput_setup, O_CLOEXEC, O_NONBLOCK};
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::mem::{size_of, zeroed};
use std::os::fd::AsRawFd;
use std::os::raw::c_char;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use uinput_ioctls::codes::{BUS_USB, EV_ABS, EV_KEY, EV_SYN};
use uinput_ioctls::*;

use super::{EventEmitter, SinkError};
use crate::hotplug::{DEVICE_ID_PRODUCT, DEVICE_ID_VENDOR};

#[derive(Debug, Clone, Copy)]
pub struct AbsAxis {
    pub code: u16,
    pub minimum: i32,
    pub maximum: i32,
}

/// Everything uinput needs to know before UI_DEV_CREATE.
#[derive(Debug)]
pub struct DeviceSetup<'a> {
    pub name: &'a str,
    pub abs_axes: &'a [AbsAxis],
    pub keys: &'a [u16],
    pub props: &'a [u16],
}

/// A created uinput device. Dropping it destroys the device and closes the
/// file.
#[derive(Debug)]
pub struct UinputDevice {
    file: File,
    name: String,
}

fn registration(step: &'static str) -> impl FnOnce(nix::errno::Errno) -> SinkError {
    move |source| SinkError::Registration { step, source }
}

impl UinputDevice {
    pub fn create(uinput_path: &Path, setup: &DeviceSetup) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(O_CLOEXEC | O_NONBLOCK)
            .open(uinput_path)
            .map_err(|source| SinkError::Creation {
                path: uinput_path.display().to_string(),
                source,
            })?;
        let fd = file.as_raw_fd();

        let mut usetup: uinput_setup = unsafe { zeroed() };
        usetup.id.bustype = BUS_USB;
        usetup.id.vendor = DEVICE_ID_VENDOR;
        usetup.id.product = DEVICE_ID_PRODUCT;
        usetup.id.version = 1;
        // keep the terminating zero from zeroed()
        let max_len = usetup.name.len() - 1;
        for (dst, src) in usetup.name.iter_mut().zip(setup.name.bytes().take(max_len)) {
            *dst = src as c_char;
        }

        unsafe {
            ui_set_evbit(fd, EV_SYN.into()).map_err(registration("EV_SYN"))?;
            ui_set_evbit(fd, EV_ABS.into()).map_err(registration("EV_ABS"))?;
            if !setup.keys.is_empty() {
                ui_set_evbit(fd, EV_KEY.into()).map_err(registration("EV_KEY"))?;
            }
            for key in setup.keys {
                ui_set_keybit(fd, (*key).into()).map_err(registration("key bit"))?;
            }
            for prop in setup.props {
                ui_set_propbit(fd, (*prop).into()).map_err(registration("property bit"))?;
            }
            for axis in setup.abs_axes {
                ui_set_absbit(fd, axis.code.into()).map_err(registration("abs bit"))?;

                let mut abs_setup: uinput_abs_setup = zeroed();
                abs_setup.code = axis.code;
                abs_setup.absinfo.minimum = axis.minimum;
                abs_setup.absinfo.maximum = axis.maximum;
                ui_abs_setup(fd, &abs_setup as *const uinput_abs_setup)
                    .map_err(registration("UI_ABS_SETUP"))?;
            }

            ui_dev_setup(fd, &usetup as *const uinput_setup)
                .map_err(registration("UI_DEV_SETUP"))?;
            ui_dev_create(fd).map_err(registration("UI_DEV_CREATE"))?;
        }

        debug!("created uinput device \"{}\"", setup.name);
        Ok(Self {
            file,
            name: setup.name.to_string(),
        })
    }
}

impl EventEmitter for UinputDevice {
    fn emit(&mut self, type_: u16, code: u16, value: i32) -> io::Result<()> {
        // time fields are ignored by kernel for synthetic events
        let mut ie: input_event = unsafe { zeroed() };
        ie.type_ = type_;
        ie.code = code;
        ie.value = value;

        let bytes = unsafe {
            std::slice::from_raw_parts(
                &ie as *const input_event as *const u8,
                size_of::<input_event>(),
            )
        };
        self.file.write_all(bytes)
    }
}

impl Drop for UinputDevice {
    fn drop(&mut self) {
        if let Err(e) = unsafe { ui_dev_destroy(self.file.as_raw_fd()) } {
            warn!("ui_dev_destroy failed for \"{}\": {e}", self.name);
        } else {
            debug!("destroyed uinput device \"{}\"", self.name);
        }
        // the file is closed when it is dropped after this
    }
}
