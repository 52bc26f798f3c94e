use crate::models::{ConnectionId, ServerMessage, Tx};
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait ClientsManager {
    type Error: Error + Send + Sync + 'static;
    async fn add_client(&self, tx: Tx) -> ConnectionId;
    async fn send(&self, id: ConnectionId, message: ServerMessage) -> Result<(), Self::Error>;
    async fn is_connected(&self, id: ConnectionId) -> bool;
    async fn remove_client(&self, id: ConnectionId);
}
