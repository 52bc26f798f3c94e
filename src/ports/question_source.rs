use crate::bank::QuestionBank;
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait QuestionSource {
    type Error: Error + Send + Sync + 'static;
    async fn load(&self) -> Result<QuestionBank, Self::Error>;
}
