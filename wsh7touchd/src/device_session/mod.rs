// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

//! One panel from open to close.
//!
//!   Opening ──(stream + sink acquired)──> Streaming ──(read fails)──> Closed
//!      └──────────────(open or sink fails)──────────────────────────────┘
//!
//! A session never restarts itself. Whoever started it decides whether the
//! device deserves another session.

use async_io::Async;
use futures::{AsyncRead, AsyncReadExt};
use libc::O_CLOEXEC;
use log::{debug, info, trace, warn};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::SinkProtocol;
use crate::input_sink::{self, InputSink, SinkError};
use crate::report::{parse_report, REPORT_LENGTH};
use crate::slot_tracker::{self, SlotTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Streaming,
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not open {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("no input sink for {device}: {source}")]
    Sink {
        device: String,
        #[source]
        source: SinkError,
    },
    #[error("reading from {device} failed: {source}")]
    Read {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("emitting events for {device} failed: {source}")]
    Emit {
        device: String,
        #[source]
        source: io::Error,
    },
}

/// Where a session gets its report stream and its sink from.
pub trait DeviceBackend {
    type Stream: AsyncRead + Unpin;

    fn open_stream(&self, device: &str) -> io::Result<Self::Stream>;

    fn create_sink(&self, device: &str) -> Result<Box<dyn InputSink>, SinkError>;
}

/// hidraw node in, uinput device out.
#[derive(Debug, Clone)]
pub struct HidrawBackend {
    pub protocol: SinkProtocol,
    pub uinput_path: PathBuf,
}

impl DeviceBackend for HidrawBackend {
    type Stream = Async<File>;

    fn open_stream(&self, device: &str) -> io::Result<Self::Stream> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(O_CLOEXEC)
            .open(device)?;
        Async::new(file)
    }

    fn create_sink(&self, _device: &str) -> Result<Box<dyn InputSink>, SinkError> {
        input_sink::create_sink(self.protocol, &self.uinput_path)
    }
}

/// Parser, tracker and sink of one device.
pub struct ReportPipeline {
    tracker: SlotTracker,
    sink: Box<dyn InputSink>,
}

impl ReportPipeline {
    pub fn new(sink: Box<dyn InputSink>) -> Self {
        Self {
            tracker: SlotTracker::new(),
            sink,
        }
    }

    /// Processes one raw report and returns the number of slot events it
    /// produced. Buffers of the wrong length are dropped without touching
    /// the slot history.
    pub fn handle_report(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let frame = match parse_report(buffer, self.tracker.history()) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("discarding buffer: {e}");
                return Ok(0);
            }
        };
        let events = self.tracker.update(&frame);
        trace!(
            "press flag {}, mask {:#07b} -> {:?}",
            frame.press_flag,
            frame.pressed_mask,
            events
        );
        slot_tracker::apply(&events, self.sink.as_mut())?;
        Ok(events.len())
    }
}

#[derive(Debug)]
pub struct SessionSummary {
    pub device: String,
    pub reports: u64,
    pub cause: SessionError,
}

pub struct DeviceSession<B: DeviceBackend> {
    device: String,
    backend: B,
}

impl<B: DeviceBackend> DeviceSession<B> {
    pub fn new(device: impl Into<String>, backend: B) -> Self {
        Self {
            device: device.into(),
            backend,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Runs the session to its end. `on_state` sees every transition, the
    /// last one is always [`SessionState::Closed`]. The sink has been
    /// released by the time `Closed` is reported.
    pub async fn run(self, mut on_state: impl FnMut(SessionState)) -> SessionSummary {
        on_state(SessionState::Opening);
        let mut reports = 0;
        let cause = self.stream(&mut on_state, &mut reports).await;
        on_state(SessionState::Closed);

        match &cause {
            SessionError::Read { .. } => {
                info!("{}: closed after {} reports ({})", self.device, reports, cause)
            }
            _ => warn!(
                "{}: closed after {} reports ({})",
                self.device, reports, cause
            ),
        }

        SessionSummary {
            device: self.device,
            reports,
            cause,
        }
    }

    async fn stream(
        &self,
        on_state: &mut impl FnMut(SessionState),
        reports: &mut u64,
    ) -> SessionError {
        let device = self.device.clone();

        let mut stream = match self.backend.open_stream(&device) {
            Ok(stream) => stream,
            Err(source) => return SessionError::DeviceOpen { device, source },
        };
        let sink = match self.backend.create_sink(&device) {
            Ok(sink) => sink,
            Err(source) => return SessionError::Sink { device, source },
        };
        let mut pipeline = ReportPipeline::new(sink);

        on_state(SessionState::Streaming);
        info!("{}: streaming touch reports", device);

        // hidraw hands out exactly one report per read
        let mut buffer = [0u8; REPORT_LENGTH];
        loop {
            let length = match stream.read(&mut buffer).await {
                Ok(length) => length,
                Err(source) => return SessionError::Read { device, source },
            };
            if length < REPORT_LENGTH {
                let source = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short read of {length} bytes"),
                );
                return SessionError::Read { device, source };
            }
            *reports += 1;
            match pipeline.handle_report(&buffer[..length]) {
                Ok(0) => {}
                Ok(events) => debug!(
                    "{}: report {} emitted {} slot events",
                    device, reports, events
                ),
                Err(source) => return SessionError::Emit { device, source },
            }
        }
    }
}
