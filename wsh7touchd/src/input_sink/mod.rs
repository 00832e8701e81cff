// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

//! Destinations for decoded touch events.
//!
//! Both sinks turn slot updates into input events for a uinput device.
//! [`MtSlotSink`] speaks the slot based (type-B) multitouch protocol, the way
//! the in-kernel hid driver reports the panel. [`LegacyMtSink`] speaks the
//! anonymous contact (type-A) protocol. The latter has no notion of a slot,
//! so a consumer only sees the contacts in report order.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::config::SinkProtocol;

pub mod legacy_mt;
pub mod mt_slots;
pub mod uinput_device;

#[cfg(test)]
pub mod recording;

pub use legacy_mt::LegacyMtSink;
pub use mt_slots::MtSlotSink;
pub use uinput_device::UinputDevice;

pub trait InputSink {
    fn set_slot(&mut self, slot: u8, x: u16, y: u16, pressed: bool) -> io::Result<()>;

    /// Marks the end of the updates belonging to one report.
    fn sync(&mut self) -> io::Result<()>;
}

/// Writes single input events. Implemented by the uinput device and by
/// in-memory buffers.
pub trait EventEmitter {
    fn emit(&mut self, type_: u16, code: u16, value: i32) -> io::Result<()>;
}

impl EventEmitter for Vec<(u16, u16, i32)> {
    fn emit(&mut self, type_: u16, code: u16, value: i32) -> io::Result<()> {
        self.push((type_, code, value));
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not open {path}: {source}")]
    Creation {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("uinput rejected {step}: {source}")]
    Registration {
        step: &'static str,
        #[source]
        source: nix::errno::Errno,
    },
}

/// Creates a uinput backed sink for the given protocol.
pub fn create_sink(
    protocol: SinkProtocol,
    uinput_path: &Path,
) -> Result<Box<dyn InputSink>, SinkError> {
    match protocol {
        SinkProtocol::Legacy => Ok(Box::new(LegacyMtSink::create(uinput_path)?)),
        SinkProtocol::Slots => Ok(Box::new(MtSlotSink::create(uinput_path)?)),
    }
}

pub(crate) fn invalid_slot(slot: u8) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("slot {slot} out of range"),
    )
}
