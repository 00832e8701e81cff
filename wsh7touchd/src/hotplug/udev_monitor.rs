// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::{
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_io::{Async, Timer};
use futures::FutureExt;
use libudev::{Device, EventType, Monitor};
use log::{debug, trace};
use thiserror::Error;

use super::{handle_hotplug_event, parse_usb_id, DeviceSignature, HotplugAction, HotplugEvent};
use crate::device_pool::{DevicePool, SessionLauncher};

pub const SUBSYSTEM: &str = "hidraw";

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("udev: {0}")]
    Udev(#[from] libudev::Error),
    #[error("udev monitor socket: {0}")]
    Io(#[from] io::Error),
}

/// Vendor and product id of the device or its closest USB ancestor.
fn usb_identity(device: &Device) -> (Option<u16>, Option<u16>) {
    if let (Some(vendor), Some(product)) = (
        device.attribute_value("idVendor"),
        device.attribute_value("idProduct"),
    ) {
        return (
            parse_usb_id(&vendor.to_string_lossy()),
            parse_usb_id(&product.to_string_lossy()),
        );
    }
    match device.parent() {
        Some(parent) => usb_identity(&parent),
        None => (None, None),
    }
}

fn hotplug_event(device: &Device, action: HotplugAction) -> HotplugEvent {
    let (vendor_id, product_id) = usb_identity(device);
    HotplugEvent {
        action,
        subsystem: device
            .subsystem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        vendor_id,
        product_id,
        device_path: device
            .devnode()
            .map(|path| path.to_string_lossy().to_string()),
    }
}

/// hidraw nodes that already exist, reported as if they had just been added.
pub fn enumerate_hidraw(context: &libudev::Context) -> Result<Vec<HotplugEvent>, MonitorError> {
    let mut enumerator = libudev::Enumerator::new(context)?;
    enumerator.match_subsystem(SUBSYSTEM)?;
    Ok(enumerator
        .scan_devices()?
        .map(|device| hotplug_event(&device, HotplugAction::Add))
        .collect())
}

// Wrap the monitor in a small AsFd adapter
struct FdWrap(RawFd);
impl AsRawFd for FdWrap {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}
impl AsFd for FdWrap {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the monitor socket outlives the wrapper
        unsafe { BorrowedFd::borrow_raw(self.0) }
    }
}

/// Feeds hidraw hot-plug events into the pool until `cancel_token` is set.
///
/// Devices present at start-up are handled first. Each iteration waits for
/// the udev socket at most `poll_timeout`, so cancellation is noticed even
/// when no device ever shows up.
pub async fn hotplug_monitor_loop<L: SessionLauncher>(
    pool: DevicePool<L>,
    signature: DeviceSignature,
    poll_timeout: Duration,
    cancel_token: Arc<AtomicBool>,
) -> Result<(), MonitorError> {
    let context = libudev::Context::new()?;
    let mut monitor = Monitor::new(&context)?;
    monitor.match_subsystem(SUBSYSTEM)?;
    // listen before enumerating, so a device plugged in between is not lost
    let mut monitor_socket = monitor.listen()?;

    for event in enumerate_hidraw(&context)? {
        debug!("found {:?}", event);
        handle_hotplug_event(&pool, &signature, &event);
    }

    let async_monitor = Async::new(FdWrap(monitor_socket.as_raw_fd()))?;
    debug!("Monitor started");

    loop {
        // check cancel token first
        if cancel_token.load(Ordering::Relaxed) {
            debug!("Cancellation requested, shutting down hot-plug monitor.");
            break;
        }

        let readiness = futures::select! {
            ready = async_monitor.readable().fuse() => Some(ready),
            _ = Timer::after(poll_timeout).fuse() => None,
        };
        match readiness {
            None => continue,
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(())) => trace!("Event registered"),
        }

        while let Some(event) = monitor_socket.receive_event() {
            let action = match event.event_type() {
                EventType::Add => HotplugAction::Add,
                EventType::Remove => HotplugAction::Remove,
                _ => HotplugAction::Other,
            };
            let event = hotplug_event(event.device(), action);
            debug!("udev event {:?}", event);
            handle_hotplug_event(&pool, &signature, &event);
        }
    }

    debug!("hot-plug monitor exiting.");
    Ok(())
}
