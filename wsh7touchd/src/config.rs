// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Number of panels that are serviced at the same time.
pub const DEFAULT_MAX_DEVICES: usize = 4;
pub const MAX_DEVICES_LIMIT: usize = 16;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_UINPUT_PATH: &str = "/dev/uinput";

/// Which multitouch protocol the virtual device speaks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum SinkProtocol {
    #[default]
    /// Anonymous contacts (type A): X/Y pairs separated by SYN_MT_REPORT
    Legacy,
    /// Slot based (type B): five slots with tracking ids, like the kernel driver
    Slots,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub protocol: SinkProtocol,
    pub max_devices: usize,
    pub poll_timeout: Duration,
    pub uinput_path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            protocol: SinkProtocol::default(),
            max_devices: DEFAULT_MAX_DEVICES,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            uinput_path: PathBuf::from(DEFAULT_UINPUT_PATH),
        }
    }
}
