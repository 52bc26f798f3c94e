use crate::models::Identity;
use async_trait::async_trait;
use std::error::Error;

/// Turns the token a connection presents into an already validated identity.
#[async_trait]
pub trait IdentityProvider {
    type Error: Error + Send + Sync + 'static;
    async fn identify(&self, token: &str) -> Result<Identity, Self::Error>;
}
