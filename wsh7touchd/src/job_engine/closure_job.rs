// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::future::Future;
use std::pin::Pin;

use crate::job_engine::job::{Job, JobTarget};

pub type TaskCreator = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()>>> + Send + 'static>;

/// A job whose body is a closure. The closure runs on the dispatcher thread,
/// so the future it returns does not need to be `Send`.
pub struct ClosureJob {
    desc: String,
    target: JobTarget,
    task_creator: TaskCreator,
}

impl ClosureJob {
    pub fn new(desc: impl Into<String>, target: JobTarget, f: TaskCreator) -> Self {
        Self {
            desc: desc.into(),
            target,
            task_creator: f,
        }
    }
}

impl Job for ClosureJob {
    fn desc(&self) -> &str {
        &self.desc
    }

    fn create_task(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()>>> {
        (self.task_creator)()
    }

    fn job_target(&self) -> JobTarget {
        self.target.clone()
    }
}
