// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use log::{debug, info, warn};

use crate::device_pool::{DevicePool, PoolError, SessionLauncher};

pub mod udev_monitor;

pub const DEVICE_ID_VENDOR: u16 = 0x0eef;
pub const DEVICE_ID_PRODUCT: u16 = 0x0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
    Other,
}

/// A device notification, independent of where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub subsystem: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub device_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSignature {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Waveshare 7inch HDMI LCD (B)
pub const WAVESHARE_7INCH: DeviceSignature = DeviceSignature {
    vendor_id: DEVICE_ID_VENDOR,
    product_id: DEVICE_ID_PRODUCT,
};

impl DeviceSignature {
    pub fn matches(&self, event: &HotplugEvent) -> bool {
        event.vendor_id == Some(self.vendor_id) && event.product_id == Some(self.product_id)
    }
}

/// Parses a sysfs id attribute like "0eef".
pub fn parse_usb_id(value: &str) -> Option<u16> {
    u16::from_str_radix(value.trim(), 16).ok()
}

/// Starts a session for every added device that carries `signature`.
/// Returns the claimed pool slot, if any. Nothing here is fatal.
pub fn handle_hotplug_event<L: SessionLauncher>(
    pool: &DevicePool<L>,
    signature: &DeviceSignature,
    event: &HotplugEvent,
) -> Option<usize> {
    if event.action != HotplugAction::Add || !signature.matches(event) {
        return None;
    }
    let Some(device_path) = event.device_path.as_deref() else {
        debug!("matching {} device without device node, ignoring", event.subsystem);
        return None;
    };

    match pool.try_start(device_path) {
        Ok(slot) => {
            info!("{}: session started in slot {}", device_path, slot);
            Some(slot)
        }
        Err(e @ PoolError::AlreadyRunning { .. }) => {
            debug!("{e}");
            None
        }
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}
