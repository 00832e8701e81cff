// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::InputSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Slot {
        slot: u8,
        x: u16,
        y: u16,
        pressed: bool,
    },
    Sync,
}

/// Sink that keeps everything in memory. Clones share the same log, so a
/// test can keep one clone while a session owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<Recorded>>>,
    released: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    /// Every call after the first `calls` fails with a broken pipe.
    pub fn failing_after(calls: usize) -> Self {
        let mut sink = Self::default();
        sink.fail_after = Some(calls);
        sink
    }

    pub fn log(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    /// How many clones have been dropped.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn record(&mut self, entry: Recorded) -> io::Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_after.is_some_and(|limit| log.len() >= limit) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        log.push(entry);
        Ok(())
    }
}

impl InputSink for RecordingSink {
    fn set_slot(&mut self, slot: u8, x: u16, y: u16, pressed: bool) -> io::Result<()> {
        self.record(Recorded::Slot {
            slot,
            x,
            y,
            pressed,
        })
    }

    fn sync(&mut self) -> io::Result<()> {
        self.record(Recorded::Sync)
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
