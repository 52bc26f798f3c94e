use crate::{
    models::{ConnectionId, ServerMessage, Tx},
    ports::ClientsManager,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use thiserror::Error;

static NEXT_CONNECTION_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Clone, Default)]
pub struct PeerMap {
    clients: Arc<Mutex<HashMap<ConnectionId, Tx>>>,
}

#[derive(Error, Debug)]
pub enum PeerMapError {
    #[error("client {0} is not connected")]
    NotConnected(ConnectionId),
    #[error("client {0} hung up")]
    Closed(ConnectionId),
}

impl PeerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // a poisoned map only means a sender panicked mid-insert; the map itself is still usable
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, Tx>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ClientsManager for PeerMap {
    type Error = PeerMapError;

    async fn add_client(&self, tx: Tx) -> ConnectionId {
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, tx);
        id
    }

    async fn send(&self, id: ConnectionId, message: ServerMessage) -> Result<(), Self::Error> {
        let clients = self.lock();
        let tx = clients.get(&id).ok_or(PeerMapError::NotConnected(id))?;
        tx.send(message).map_err(|_| PeerMapError::Closed(id))
    }

    async fn is_connected(&self, id: ConnectionId) -> bool {
        self.lock().get(&id).is_some_and(|tx| !tx.is_closed())
    }

    async fn remove_client(&self, id: ConnectionId) {
        self.lock().remove(&id);
    }
}
