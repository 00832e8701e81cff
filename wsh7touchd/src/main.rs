// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use wsh7touchd::config::{
    DaemonConfig, SinkProtocol, DEFAULT_MAX_DEVICES, DEFAULT_UINPUT_PATH, MAX_DEVICES_LIMIT,
};
use wsh7touchd::device_pool::DevicePool;
use wsh7touchd::device_session::HidrawBackend;
use wsh7touchd::hotplug::WAVESHARE_7INCH;
use wsh7touchd::job_engine::job::Dispatcher;
use wsh7touchd::jobs::device_session_job::DispatchLauncher;
use wsh7touchd::jobs::monitor_hotplug_job::monitor_hotplug_job;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Multitouch protocol of the virtual device
    #[arg(long, value_enum, default_value_t)]
    protocol: SinkProtocol,

    /// Number of panels serviced at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_DEVICES)]
    max_devices: usize,

    /// Upper bound for one wait on the udev monitor, in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_timeout_ms: u64,

    /// Path of the uinput device
    #[arg(long = "uinput", value_name = "PATH", default_value = DEFAULT_UINPUT_PATH)]
    uinput_path: PathBuf,

    /// Service this hidraw node (with /dev/) directly instead of watching udev
    #[arg(long, value_name = "HIDRAW")]
    device: Option<String>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.max_devices == 0 || args.max_devices > MAX_DEVICES_LIMIT {
        return Err(format!(
            "--max-devices must be between 1 and {}",
            MAX_DEVICES_LIMIT
        ));
    }
    if args.poll_timeout_ms == 0 {
        return Err("--poll-timeout-ms must be greater than 0".into());
    }
    if let Some(device) = &args.device {
        if !device.starts_with("/dev/") {
            return Err("--device must be an absolute path below /dev/".into());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    let config = DaemonConfig {
        protocol: args.protocol,
        max_devices: args.max_devices,
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
        uinput_path: args.uinput_path,
    };
    info!("Starting wsh7touchd ({:?} protocol)", config.protocol);

    let mut dispatcher = Dispatcher::new();
    let handle = dispatcher
        .handle()
        .context("the job dispatcher is not running")?;
    let backend = HidrawBackend {
        protocol: config.protocol,
        uinput_path: config.uinput_path.clone(),
    };
    let pool = DevicePool::new(config.max_devices, DispatchLauncher::new(handle, backend));

    match args.device {
        Some(device) => {
            let slot = pool
                .try_start(&device)
                .with_context(|| format!("could not start a session for {device}"))?;
            info!("{}: session started in slot {}", device, slot);
            // the launcher holds a dispatch handle; the dispatcher only winds
            // down once it is gone and the session has ended
            drop(pool);
            dispatcher.wait_until_finished();
        }
        None => {
            let cancel_token = Arc::new(AtomicBool::new(false));
            dispatcher
                .dispatch(Box::new(monitor_hotplug_job(
                    pool,
                    WAVESHARE_7INCH,
                    config.poll_timeout,
                    cancel_token,
                )))
                .context("failed to start the hot-plug monitor")?;
            dispatcher.wait_until_finished();
        }
    }

    warn!("Stopping wsh7touchd");
    Ok(())
}
