use crate::models::TimerEvent;
use async_trait::async_trait;
use std::{error::Error, time::Duration};

pub type JobId = uuid::Uuid;

#[async_trait]
pub trait JobSchedular {
    type Error: Error + Send + Sync + 'static;
    /// Delivers `event` back to the engine once `delay` has passed.
    async fn schedule(&self, delay: Duration, event: TimerEvent) -> Result<JobId, Self::Error>;
    async fn cancel(&self, job: JobId) -> Result<(), Self::Error>;
}
