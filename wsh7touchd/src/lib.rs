// SPDX-License-Identifier: MIT
// wsh7touchd: userspace driver for the Waveshare 7inch HDMI LCD (B) touch panel
//
// - Finds the panel's hidraw nodes through udev, also when plugged in later.
// - Decodes the 25 byte touch reports into five finger slots.
// - Injects the fingers through /dev/uinput as a multitouch device.
//
// Author: Johannes Leupolz <dev@leupolz.eu>

pub mod config;
pub mod device_pool;
pub mod device_session;
pub mod hotplug;
pub mod input_sink;
pub mod job_engine;
pub mod jobs;
pub mod report;
pub mod slot_tracker;
