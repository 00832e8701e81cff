// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use log::error;

use crate::{
    device_pool::{DevicePool, SessionLauncher},
    hotplug::{udev_monitor::hotplug_monitor_loop, DeviceSignature},
    job_engine::{closure_job::ClosureJob, job::JobTarget},
};

/// Background job that owns the pool and feeds it from udev.
pub fn monitor_hotplug_job<L>(
    pool: DevicePool<L>,
    signature: DeviceSignature,
    poll_timeout: Duration,
    cancel_token: Arc<AtomicBool>,
) -> ClosureJob
where
    L: SessionLauncher + Send + 'static,
{
    ClosureJob::new(
        "Monitor hidraw hot-plug events",
        JobTarget::BackgroundLoop,
        Box::new(move || {
            Box::pin(async move {
                if let Err(e) =
                    hotplug_monitor_loop(pool, signature, poll_timeout, cancel_token).await
                {
                    error!("hot-plug monitor stopped: {e}");
                }
            })
        }),
    )
}
