use crate::{
    models::{EngineEvent, EngineHandle, TimerEvent},
    ports::{JobId, JobSchedular},
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};

/// One-shot timers backed by `tokio-cron-scheduler`, firing into the engine queue.
#[derive(Clone)]
pub struct Schedular {
    schedular: JobScheduler,
    engine: EngineHandle,
}

#[derive(Debug, Error)]
pub enum SchedularError {
    #[error("error while scheduling job: {0}")]
    JobSchedularError(#[from] tokio_cron_scheduler::JobSchedulerError),
}

impl Schedular {
    pub async fn new(engine: EngineHandle) -> Result<Self, SchedularError> {
        let schedular = JobScheduler::new().await?;
        schedular.start().await?;

        Ok(Schedular { schedular, engine })
    }
}

async fn timer_callback(engine: EngineHandle, event: TimerEvent) {
    let match_id = event.match_id().clone();
    if engine.send(EngineEvent::Timer(event)) {
        log::debug!("timer fired for match {}", match_id);
    } else {
        log::warn!("engine stopped; dropping timer for match {}", match_id);
    }
}

#[async_trait]
impl JobSchedular for Schedular {
    type Error = SchedularError;

    async fn schedule(&self, delay: Duration, event: TimerEvent) -> Result<JobId, Self::Error> {
        let engine = self.engine.clone();
        let job = Job::new_one_shot_async(delay, move |_, _| {
            let engine = engine.clone();
            let event = event.clone();
            Box::pin(timer_callback(engine, event))
        })?;

        let job_id = job.guid();
        self.schedular.add(job).await?;
        Ok(job_id)
    }

    async fn cancel(&self, job: JobId) -> Result<(), Self::Error> {
        self.schedular.remove(&job).await?;
        Ok(())
    }
}
