// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::{future::Future, pin::Pin};

use log::debug;

use crate::{
    device_pool::{SessionLauncher, SlotTicket},
    device_session::{DeviceBackend, DeviceSession},
    job_engine::job::{DispatchHandle, Job, JobTarget},
};

/// Runs one device session on behalf of a pool slot.
pub struct DeviceSessionJob<B: DeviceBackend> {
    ticket: SlotTicket,
    backend: B,
    desc: String,
}

impl<B: DeviceBackend> DeviceSessionJob<B> {
    pub fn new(ticket: SlotTicket, backend: B) -> Self {
        let desc = format!("Service touch panel {}", ticket.device());
        Self {
            ticket,
            backend,
            desc,
        }
    }
}

impl<B> Job for DeviceSessionJob<B>
where
    B: DeviceBackend + Send + 'static,
{
    fn desc(&self) -> &str {
        &self.desc
    }

    fn create_task(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()>>> {
        let DeviceSessionJob { ticket, backend, .. } = *self;
        Box::pin(async move {
            let session = DeviceSession::new(ticket.device(), backend);
            let summary = session
                .run(|state| ticket.set_session_state(state))
                .await;
            debug!("{}: {} reports processed", summary.device, summary.reports);
            // the ticket is dropped here, at the latest
        })
    }

    fn job_target(&self) -> JobTarget {
        JobTarget::Device(self.ticket.device().to_string())
    }
}

/// Launches pool sessions as jobs on the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchLauncher<B> {
    dispatcher: DispatchHandle,
    backend: B,
}

impl<B> DispatchLauncher<B> {
    pub fn new(dispatcher: DispatchHandle, backend: B) -> Self {
        Self {
            dispatcher,
            backend,
        }
    }
}

impl<B> SessionLauncher for DispatchLauncher<B>
where
    B: DeviceBackend + Clone + Send + 'static,
{
    fn launch(&self, ticket: SlotTicket) -> Result<(), String> {
        self.dispatcher
            .dispatch(Box::new(DeviceSessionJob::new(ticket, self.backend.clone())))
            .map_err(|e| e.to_string())
    }
}
