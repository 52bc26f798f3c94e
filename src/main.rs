use flag_duel::{
    adapters::{JsonQuestionSource, PeerMap, Schedular, SimpleIdentity, SystemClock, UuidGenerator},
    config::Config,
    controllers::{Catalog, GameController, SessionController},
    handlers::routes,
    models::{EngineEvent, EngineHandle},
    ports::QuestionSource,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(1);
        }
    };

    let (engine, events) = EngineHandle::channel();
    let schedular = match Schedular::new(engine.clone()).await {
        Ok(schedular) => schedular,
        Err(err) => {
            log::error!("couldn't start the timer scheduler: {}", err);
            std::process::exit(1);
        }
    };

    let source = match &config.questions_path {
        Some(path) => JsonQuestionSource::file(path),
        None => JsonQuestionSource::builtin(),
    };
    let catalog = match source.load().await {
        Ok(bank) => {
            log::info!(
                "loaded {} questions in {} confusion groups",
                bank.questions().len(),
                bank.groups().len()
            );
            Catalog::Ready(Arc::new(bank))
        }
        Err(err) => {
            log::error!("question bank unavailable: {}", err);
            Catalog::Unavailable(err.to_string())
        }
    };

    let clients = PeerMap::new();
    let game_controller = GameController::<_, _, _, UuidGenerator>::new(
        clients.clone(),
        schedular,
        SystemClock,
        catalog,
        config.rules.clone(),
    );
    let engine_task = tokio::spawn(game_controller.run(events));

    let session_controller = SessionController::new(clients, engine.clone());

    // GET /game/:token -> websocket upgrade
    let routes = routes(SimpleIdentity, session_controller);

    let (addr, server) = match warp::serve(routes).try_bind_with_graceful_shutdown(
        config.addr,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    ) {
        Ok(bound) => bound,
        Err(err) => {
            log::error!("couldn't bind {}: {}", config.addr, err);
            std::process::exit(1);
        }
    };

    log::info!("listening on {}", addr);
    server.await;

    engine.send(EngineEvent::Shutdown);
    if let Err(err) = engine_task.await {
        log::error!("engine task failed: {}", err);
    }
}
