use crate::{
    controllers::SessionController,
    ports::{ClientsManager, IdentityProvider},
};
use warp::{ws::Ws, Filter};

pub fn with_identity_provider<IP: IdentityProvider + Clone + Send + Sync>(
    provider: IP,
) -> impl Filter<Extract = (IP,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || provider.clone())
}

pub fn with_session_controller<CM: ClientsManager + Clone + Send + Sync + 'static>(
    controller: SessionController<CM>,
) -> impl Filter<Extract = (SessionController<CM>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || controller.clone())
}

pub async fn websocket_handler<
    IP: IdentityProvider + Clone + Send + Sync,
    CM: ClientsManager + Clone + Send + Sync + 'static,
>(
    provider: IP,
    controller: SessionController<CM>,
    ws: Ws,
    token: String,
) -> Result<impl warp::Reply, warp::Rejection> {
    match provider.identify(&token).await {
        Ok(identity) => Ok(ws.on_upgrade(move |socket| controller.start(identity, socket))),
        Err(err) => {
            log::warn!("rejected connection: {}", err);
            Err(warp::reject::not_found())
        }
    }
}

/// `GET /game/{token}`, upgraded to a websocket once the token is accepted.
pub fn routes<IP, CM>(
    provider: IP,
    controller: SessionController<CM>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
where
    IP: IdentityProvider + Clone + Send + Sync + 'static,
    CM: ClientsManager + Clone + Send + Sync + 'static,
{
    warp::path("game")
        .and(with_identity_provider(provider))
        .and(with_session_controller(controller))
        .and(warp::ws())
        .and(warp::path::param())
        .and(warp::path::end())
        .and_then(websocket_handler)
}
