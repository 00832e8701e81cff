// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use libc::uinput_abs_setup;
use libc::uinput_setup;

use nix::{ioctl_none, ioctl_write_int, ioctl_write_ptr, request_code_none, request_code_write};

pub const UI_DEV_CREATE: u64 = request_code_none!(b'U', 1);
pub const UI_DEV_DESTROY: u64 = request_code_none!(b'U', 2);
pub const UI_DEV_SETUP: u64 = request_code_write!(b'U', 3, ::std::mem::size_of::<uinput_setup>());
pub const UI_ABS_SETUP: u64 =
    request_code_write!(b'U', 4, ::std::mem::size_of::<uinput_abs_setup>());

ioctl_none!(ui_dev_create, b'U', 1);
ioctl_none!(ui_dev_destroy, b'U', 2);
ioctl_write_ptr! {ui_dev_setup, b'U', 3, uinput_setup}
ioctl_write_ptr! { ui_abs_setup, b'U', 4, uinput_abs_setup}

ioctl_write_int!(ui_set_evbit, b'U', 100);
ioctl_write_int!(ui_set_keybit, b'U', 101);
ioctl_write_int!(ui_set_absbit, b'U', 103);
ioctl_write_int!(ui_set_propbit, b'U', 110);

/// Event codes from include/uapi/linux/input-event-codes.h that the
/// touch sinks need. Same numeric values as in the linux headers.
pub mod codes {
    pub const EV_SYN: u16 = 0x00;
    pub const EV_KEY: u16 = 0x01;
    pub const EV_ABS: u16 = 0x03;

    pub const SYN_REPORT: u16 = 0;
    /// Separates anonymous contacts in the type-A multitouch protocol.
    pub const SYN_MT_REPORT: u16 = 2;

    pub const BTN_TOUCH: u16 = 0x14a;

    pub const ABS_MT_SLOT: u16 = 0x2f;
    pub const ABS_MT_POSITION_X: u16 = 0x35;
    pub const ABS_MT_POSITION_Y: u16 = 0x36;
    pub const ABS_MT_TRACKING_ID: u16 = 0x39;

    pub const INPUT_PROP_DIRECT: u16 = 0x01;

    pub const BUS_USB: u16 = 0x03;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes_match_linux_headers() {
        // _IO('U', 1) and _IO('U', 2)
        assert_eq!(UI_DEV_CREATE, 0x5501);
        assert_eq!(UI_DEV_DESTROY, 0x5502);
        // _IOW('U', 3, struct uinput_setup), sizeof == 92
        assert_eq!(UI_DEV_SETUP, 0x405c5503);
        // _IOW('U', 4, struct uinput_abs_setup), sizeof == 28
        assert_eq!(UI_ABS_SETUP, 0x401c5504);
    }
}
