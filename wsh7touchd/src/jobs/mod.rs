// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

pub mod device_session_job;
pub mod monitor_hotplug_job;
