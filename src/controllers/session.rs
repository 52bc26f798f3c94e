use crate::{
    models::{ClientMessage, ConnectionId, EngineEvent, EngineHandle, Identity, ServerMessage},
    ports::ClientsManager,
};
use futures_util::{future, Sink, Stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::Message;

/// Bridges one websocket to the engine queue for as long as it stays open.
#[derive(Clone)]
pub struct SessionController<CM> {
    clients: CM,
    engine: EngineHandle,
}

impl<CM> SessionController<CM>
where
    CM: ClientsManager + Clone + Send + Sync + 'static,
{
    pub fn new(clients: CM, engine: EngineHandle) -> Self {
        Self { clients, engine }
    }

    pub async fn start<Socket>(self, identity: Identity, ws: Socket)
    where
        Socket: Stream<Item = Result<Message, warp::Error>> + Sink<Message> + Send,
    {
        let (outgoing, incoming) = ws.split();
        let (tx, rx) = unbounded_channel();
        let connection = self.clients.add_client(tx).await;

        log::info!("{} opened a session as {}", connection, identity.display_name);

        if !self.engine.send(EngineEvent::PlayerConnected {
            connection,
            identity,
        }) {
            log::warn!("engine is not running, closing {}", connection);
            self.clients.remove_client(connection).await;
            return;
        }

        let send_to_client = UnboundedReceiverStream::new(rx)
            .filter_map(|message| future::ready(encode(&message)))
            .map(Ok)
            .forward(outgoing);

        let engine = self.engine.clone();
        let receive_from_client = incoming.try_for_each(|frame| {
            if let Some(event) = decode(connection, &frame) {
                engine.send(event);
            }
            future::ok(())
        });

        tokio::select! {
            _ = receive_from_client => {}
            _ = send_to_client => {}
        }

        self.clients.remove_client(connection).await;
        self.engine
            .send(EngineEvent::PlayerDisconnected { connection });
        log::info!("{} closed its session", connection);
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::text(text)),
        Err(err) => {
            log::error!("couldn't encode {:?}: {}", message, err);
            None
        }
    }
}

/// Maps a text frame to the engine event it requests. Anything else is dropped.
pub fn decode(connection: ConnectionId, frame: &Message) -> Option<EngineEvent> {
    let text = frame.to_str().ok()?;

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::FindMatch) => Some(EngineEvent::PlayerRequestsMatch { connection }),
        Ok(ClientMessage::Answer { match_id, answer }) => Some(EngineEvent::AnswerSubmitted {
            connection,
            match_id,
            answer,
        }),
        Err(err) => {
            log::debug!("malformed message from {}: {}", connection, err);
            None
        }
    }
}
