// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use async_channel::{Receiver, Sender};
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::RemoteHandle;
use futures::task::LocalSpawnExt;
use log::debug;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
use thiserror::Error;

/// Represents where a job should run.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum JobTarget {
    /// Runs in parallel to everything else, e.g. the hot-plug monitor.
    BackgroundLoop,
    /// Jobs for the same device node run one after another.
    Device(String),
}

pub trait Job: Send + 'static {
    /// Free-form description, used for logging or debugging
    fn desc(&self) -> &str;

    /// Job Target
    fn job_target(&self) -> JobTarget;

    /// Consumes the job and creates the future that executes it
    fn create_task(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()>>>;
}

impl std::fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("target", &self.job_target())
            .field("desc", &self.desc())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher already closed, dropping job \"{0}\"")]
    Closed(String),
}

/// Cheap handle for sending jobs to a running [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: Sender<Box<dyn Job>>,
}

impl DispatchHandle {
    pub fn dispatch(&self, job: Box<dyn Job>) -> Result<(), DispatchError> {
        let desc = job.desc().to_string();
        self.tx
            .send_blocking(job)
            .map_err(|_| DispatchError::Closed(desc))
    }
}

/// Central dispatcher that manages per-target async loops.
///
/// All jobs run on one dedicated thread driving a local future pool. Jobs
/// must therefore never block that thread for long; device reads are
/// awaited through async-io.
#[derive(Debug)]
pub struct Dispatcher {
    thread_handle: Option<JoinHandle<()>>,
    tx: Option<Sender<Box<dyn Job>>>,
    future_handles: Arc<Mutex<Vec<RemoteHandle<()>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();

        // Map of active per-target senders.
        let targets: Arc<Mutex<HashMap<JobTarget, Sender<Box<dyn Job>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let rx_in_thread: Receiver<Box<dyn Job>> = rx.clone();
        let future_handles: Arc<Mutex<Vec<RemoteHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let future_handles_for_thread = future_handles.clone();
        // run dispatcher in a dedicated thread
        let thread_handle = thread::spawn(move || {
            let mut pool = LocalPool::new();
            let spawner = pool.spawner();

            match spawner.spawn_local_with_handle(spawn_dispatcher_loop(
                spawner.clone(),
                targets,
                rx_in_thread,
                future_handles_for_thread.clone(),
            )) {
                Ok(handle) => future_handles_for_thread.lock().unwrap().push(handle),
                Err(e) => {
                    log::error!("could not spawn the dispatcher loop: {e}");
                    return;
                }
            }
            pool.run(); // blocks until all tasks complete
        });

        Self {
            thread_handle: Some(thread_handle),
            tx: Some(tx),
            future_handles,
        }
    }

    pub fn handle(&self) -> Option<DispatchHandle> {
        self.tx.as_ref().map(|tx| DispatchHandle { tx: tx.clone() })
    }

    pub fn dispatch(&mut self, job: Box<dyn Job>) -> Result<(), DispatchError> {
        match self.handle() {
            Some(handle) => handle.dispatch(job),
            None => Err(DispatchError::Closed(job.desc().to_string())),
        }
    }

    /// Stops accepting jobs and cancels everything that is still running.
    pub fn close(&mut self) {
        self.tx = None;
        debug!("Checking for running jobs before shutdown");
        self.future_handles.lock().unwrap().clear();
        debug!("Pending jobs canceled");
    }

    /// Lets all queued jobs run to completion, then joins the thread.
    pub fn wait_until_finished(&mut self) {
        self.tx = None;
        let handles: Vec<RemoteHandle<()>> =
            self.future_handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            handle.forget();
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("dispatcher thread panicked");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the dispatcher: listen for incoming jobs and route them to the right loop.
async fn spawn_dispatcher_loop(
    spawner: LocalSpawner,
    targets: Arc<Mutex<HashMap<JobTarget, Sender<Box<dyn Job>>>>>,
    rx: Receiver<Box<dyn Job>>,
    future_handles: Arc<Mutex<Vec<RemoteHandle<()>>>>,
) {
    while let Ok(job) = rx.recv().await {
        if job.job_target() == JobTarget::BackgroundLoop {
            // runs in parallel to everything else, no ordered queue needed
            let desc = job.desc().to_string();
            match spawner.spawn_local_with_handle(job.create_task()) {
                Ok(handle) => {
                    future_handles.lock().unwrap().push(handle);
                    log::info!("Spawned new background loop for {:?}", desc);
                }
                Err(e) => log::warn!("Failed to spawn background loop {:?}: {e}", desc),
            }
        } else {
            let target = job.job_target();
            let tx = get_or_spawn_target_loop(&spawner, &targets, &target, &future_handles);
            if let Err(e) = tx.send(job).await {
                log::warn!("Failed to enqueue job: {e}");
            }
        }
    }
    // all senders are gone
    log::info!("Global dispatcher shutting down gracefully");
    // dropping the per-target senders lets their loops drain and end
    targets.lock().unwrap().clear();
}

/// Get or lazily create a target-specific queue and loop.
fn get_or_spawn_target_loop(
    spawner: &LocalSpawner,
    targets: &Arc<Mutex<HashMap<JobTarget, Sender<Box<dyn Job>>>>>,
    target: &JobTarget,
    future_handles: &Arc<Mutex<Vec<RemoteHandle<()>>>>,
) -> Sender<Box<dyn Job>> {
    let mut map = targets.lock().unwrap();
    if let Some(tx) = map.get(target) {
        return tx.clone();
    }

    let (tx, rx) = async_channel::unbounded();
    map.insert(target.clone(), tx.clone());
    drop(map); // release lock before spawning

    match spawner.spawn_local_with_handle(job_target_loop(target.clone(), rx)) {
        Ok(handle) => {
            future_handles.lock().unwrap().push(handle);
            log::info!("Spawned new loop for {:?}", target);
        }
        Err(e) => log::warn!("Failed to spawn loop for {:?}: {e}", target),
    }

    tx
}

/// The main loop for a single job target.
async fn job_target_loop(target: JobTarget, rx: Receiver<Box<dyn Job>>) {
    log::debug!("Starting loop for {:?}", target);
    while let Ok(job) = rx.recv().await {
        log::debug!("Executing job: {}", job.desc());
        job.create_task().await;
    }
    log::debug!("Loop for {:?} ended, channel closed", target);
}
