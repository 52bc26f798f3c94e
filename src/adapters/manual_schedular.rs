use crate::{
    models::TimerEvent,
    ports::{JobId, JobSchedular},
};
use async_trait::async_trait;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: JobId,
    pub delay: Duration,
    pub event: TimerEvent,
}

#[derive(Debug, Default)]
struct Jobs {
    pending: Vec<ScheduledJob>,
    cancelled: Vec<JobId>,
}

/// Records timers instead of running them; the caller decides when one fires.
#[derive(Debug, Clone, Default)]
pub struct ManualSchedular {
    jobs: Arc<Mutex<Jobs>>,
    fail: bool,
}

#[derive(Error, Debug)]
pub enum ManualSchedularError {
    #[error("failed to schedule job")]
    ScheduleError,
}

impl ManualSchedular {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            jobs: Arc::default(),
            fail: true,
        }
    }

    pub fn pending(&self) -> Vec<ScheduledJob> {
        self.lock().pending.clone()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.lock().cancelled.clone()
    }

    /// Removes the oldest pending job so the caller can deliver its event.
    pub fn fire_next(&self) -> Option<ScheduledJob> {
        let mut jobs = self.lock();
        if jobs.pending.is_empty() {
            None
        } else {
            Some(jobs.pending.remove(0))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Jobs> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobSchedular for ManualSchedular {
    type Error = ManualSchedularError;

    async fn schedule(&self, delay: Duration, event: TimerEvent) -> Result<JobId, Self::Error> {
        if self.fail {
            return Err(ManualSchedularError::ScheduleError);
        }

        let id = uuid::Uuid::new_v4();
        self.lock().pending.push(ScheduledJob { id, delay, event });
        Ok(id)
    }

    async fn cancel(&self, job: JobId) -> Result<(), Self::Error> {
        let mut jobs = self.lock();
        jobs.pending.retain(|scheduled| scheduled.id != job);
        jobs.cancelled.push(job);
        Ok(())
    }
}
