use crate::{
    bank::QuestionBank,
    controllers::{
        lifecycle::{leader, Decision, GameRules, MatchProgress},
        matchmaking::{MatchRegistry, Pairing},
        options::generate_options,
        round::{Match, PendingTimer, Phase},
    },
    models::{
        millis, ConnectionId, EndReason, EngineEvent, Identity, MatchId, PerSlot, Player,
        ServerMessage, SlotTag, TimerEvent, Winner,
    },
    ports::{ClientsManager, Clock, JobSchedular, MatchIdGenerator},
};
use rand::thread_rng;
use std::{marker::PhantomData, sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;

/// Question data the engine plays with, or why it has none.
#[derive(Debug, Clone)]
pub enum Catalog {
    Ready(Arc<QuestionBank>),
    Unavailable(String),
}

/// Owns all match state and applies engine events one at a time.
pub struct GameController<CM, JS, CL, ID> {
    clients: CM,
    schedular: JS,
    clock: CL,
    catalog: Catalog,
    rules: GameRules,
    registry: MatchRegistry,
    ids: PhantomData<fn() -> ID>,
}

impl<CM, JS, CL, ID> GameController<CM, JS, CL, ID>
where
    CM: ClientsManager + Send + Sync + 'static,
    JS: JobSchedular + Send + Sync + 'static,
    CL: Clock + Send + Sync + 'static,
    ID: MatchIdGenerator + Send + Sync + 'static,
{
    pub fn new(clients: CM, schedular: JS, clock: CL, catalog: Catalog, rules: GameRules) -> Self {
        Self {
            clients,
            schedular,
            clock,
            catalog,
            rules,
            registry: MatchRegistry::new(),
            ids: PhantomData,
        }
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Processes events until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut events: UnboundedReceiver<EngineEvent>) {
        log::info!("game engine started");

        while let Some(event) = events.recv().await {
            if event == EngineEvent::Shutdown {
                break;
            }
            self.handle(event).await;
        }

        self.shutdown().await;
        log::info!("game engine stopped");
    }

    pub async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PlayerConnected {
                connection,
                identity,
            } => self.player_connected(connection, identity).await,
            EngineEvent::PlayerRequestsMatch { connection } => {
                self.player_requests_match(connection).await
            }
            EngineEvent::AnswerSubmitted {
                connection,
                match_id,
                answer,
            } => self.answer_submitted(connection, &match_id, answer).await,
            EngineEvent::PlayerDisconnected { connection } => {
                self.player_disconnected(connection).await
            }
            EngineEvent::Timer(TimerEvent::RoundTimeout { match_id, round }) => {
                self.round_timed_out(&match_id, round).await
            }
            EngineEvent::Timer(TimerEvent::IntermissionElapsed { match_id, round }) => {
                self.intermission_elapsed(&match_id, round).await
            }
            EngineEvent::Shutdown => self.shutdown().await,
        }
    }

    async fn player_connected(&mut self, connection: ConnectionId, identity: Identity) {
        log::info!("{} connected as {}", connection, identity.display_name);
        self.registry.connect(Player {
            connection,
            identity,
        });
        self.player_ready(connection).await;
    }

    async fn player_requests_match(&mut self, connection: ConnectionId) {
        if self.registry.player(connection).is_none() {
            log::debug!("match request from unknown connection {}", connection);
            return;
        }

        if self.registry.is_busy(connection) {
            log::debug!("{} is already searching or playing", connection);
            return;
        }

        self.player_ready(connection).await;
    }

    async fn player_ready(&mut self, connection: ConnectionId) {
        let bank = match &self.catalog {
            Catalog::Ready(bank) => bank.clone(),
            Catalog::Unavailable(reason) => {
                let reason = reason.clone();
                self.notify(connection, ServerMessage::ServiceUnavailable { reason })
                    .await;
                return;
            }
        };

        let Some(player) = self.registry.player(connection).cloned() else {
            return;
        };

        loop {
            match self.registry.pair_or_wait(player.clone()) {
                Pairing::Waiting => {
                    log::info!("{} is searching for an opponent", player.identity.display_name);
                    self.notify(connection, ServerMessage::Searching).await;
                    return;
                }
                Pairing::AlreadyWaiting => {
                    log::debug!("{} is already waiting", connection);
                    return;
                }
                Pairing::Opponent(opponent) => {
                    if self.clients.is_connected(opponent.connection).await {
                        self.create_match(opponent, player, &bank).await;
                        return;
                    }

                    // the slot is empty again, so the next pass parks `player`
                    log::info!(
                        "waiting player {} left before being paired",
                        opponent.connection
                    );
                    self.registry.disconnect(opponent.connection);
                }
            }
        }
    }

    async fn create_match(&mut self, a: Player, b: Player, bank: &QuestionBank) {
        let id = ID::generate().await;
        let questions = bank.draw_sequence(self.rules.questions_per_match, &mut thread_rng());

        log::info!(
            "match {} created: {} vs {}",
            id,
            a.identity.display_name,
            b.identity.display_name
        );

        for (me, opponent, slot) in [(&a, &b, SlotTag::A), (&b, &a, SlotTag::B)] {
            let message = ServerMessage::MatchStarted {
                match_id: id.clone(),
                slot,
                opponent: opponent.identity.id.clone(),
                opponent_name: opponent.identity.display_name.clone(),
            };
            self.notify(me.connection, message).await;
        }

        self.registry.insert(Match::new(id.clone(), a, b, questions));
        self.start_round(&id).await;
    }

    async fn start_round(&mut self, id: &MatchId) {
        let Catalog::Ready(bank) = &self.catalog else {
            return;
        };
        let bank = bank.clone();
        let now = self.clock.now();

        let Some(game) = self.registry.get_mut(id) else {
            log::debug!("not starting a round for finished match {}", id);
            return;
        };

        if matches!(game.phase(), Phase::RoundActive { .. }) {
            log::debug!("match {} already has a round running", id);
            return;
        }

        game.leave_intermission();
        let Some(round) = game.begin_round(now) else {
            self.end_match(id, EndReason::QuestionsExhausted).await;
            return;
        };

        let Some(question) = game.current_question().cloned() else {
            return;
        };
        let options = generate_options(
            &question.answer,
            &bank,
            self.rules.options_per_round,
            &mut thread_rng(),
        );
        let connections = game.connections();
        let scores = game.scores();

        log::info!("match {} round {}: {}", id, round, question.id);

        let message = ServerMessage::RoundStarted {
            match_id: id.clone(),
            round,
            image: question.image,
            options,
            scores,
        };
        self.broadcast(connections, message).await;

        let delay = self.rules.round_time;
        let event = TimerEvent::RoundTimeout {
            match_id: id.clone(),
            round,
        };
        self.arm_timer(id, round, delay, event).await;
    }

    async fn answer_submitted(&mut self, connection: ConnectionId, id: &MatchId, answer: String) {
        let now = self.clock.now();

        let Some(game) = self.registry.get_mut(id) else {
            log::debug!("answer from {} for unknown match {}", connection, id);
            return;
        };

        let Some(slot) = game.slot_of(connection) else {
            log::debug!("{} is not playing in match {}", connection, id);
            return;
        };

        let Some(receipt) = game.record_answer(slot, answer, now) else {
            log::debug!("ignoring answer from {} in match {}", connection, id);
            return;
        };

        let connections = game.connections();
        let resolved = game.all_answered();
        let elapsed_millis = millis(receipt.elapsed);

        self.notify(
            connections[slot],
            ServerMessage::AnswerAcknowledged {
                round: receipt.round,
                correct: receipt.correct,
                correct_answer: receipt.correct_answer,
                elapsed_millis,
            },
        )
        .await;
        self.notify(
            connections[slot.other()],
            ServerMessage::OpponentAnswered {
                round: receipt.round,
                elapsed_millis,
            },
        )
        .await;

        if resolved {
            self.resolve_round(id).await;
        }
    }

    async fn round_timed_out(&mut self, id: &MatchId, round: u32) {
        let Some(game) = self.registry.get_mut(id) else {
            log::debug!("stale round timer for finished match {}", id);
            return;
        };

        let armed = game.timer().map(|timer| timer.round) == Some(round);
        if !armed || !matches!(game.phase(), Phase::RoundActive { .. }) {
            log::debug!("stale round timer for match {} round {}", id, round);
            return;
        }

        // already fired, nothing to cancel
        game.take_timer();
        log::info!("match {} round {} timed out", id, round);
        self.resolve_round(id).await;
    }

    async fn resolve_round(&mut self, id: &MatchId) {
        let Some(game) = self.registry.get_mut(id) else {
            return;
        };

        if !matches!(game.phase(), Phase::RoundActive { .. }) {
            log::debug!("match {} has no round to resolve", id);
            return;
        }

        let timer = game.take_timer();
        let Some(result) = game.score_round() else {
            return;
        };

        let progress = MatchProgress {
            round: result.round,
            scores: result.scores,
            questions_remaining: game.questions_remaining(),
            sudden_death_rounds: game.sudden_death_rounds(),
        };
        let connections = game.connections();
        let winner = result
            .winner
            .map(|tag| game.slot(tag).player.identity.id.clone());

        self.cancel_timer(timer).await;

        log::info!(
            "match {} round {} resolved {}-{}, point to {}",
            id,
            result.round,
            result.scores.a,
            result.scores.b,
            winner.as_deref().unwrap_or("nobody")
        );

        let message = ServerMessage::RoundResolved {
            round: result.round,
            correct_answer: result.correct_answer,
            scores: result.scores,
            elapsed: result.elapsed,
            winner,
        };
        self.broadcast(connections, message).await;

        match self.rules.decide(&progress) {
            Decision::End(reason) => self.end_match(id, reason).await,
            Decision::NextRound { sudden_death } => self.continue_match(id, sudden_death).await,
        }
    }

    async fn continue_match(&mut self, id: &MatchId, sudden_death: bool) {
        let delay = self.rules.intermission;

        let Some(game) = self.registry.get_mut(id) else {
            return;
        };

        if sudden_death {
            game.note_sudden_death_round();
            log::info!("match {} is tied, going to sudden death", id);
        }

        if delay.is_zero() {
            self.start_round(id).await;
            return;
        }

        let next = game.round() + 1;
        game.enter_intermission();
        let event = TimerEvent::IntermissionElapsed {
            match_id: id.clone(),
            round: next,
        };
        self.arm_timer(id, next, delay, event).await;
    }

    async fn intermission_elapsed(&mut self, id: &MatchId, round: u32) {
        let Some(game) = self.registry.get_mut(id) else {
            log::debug!("stale intermission timer for finished match {}", id);
            return;
        };

        let armed = game.timer().map(|timer| timer.round) == Some(round);
        if !armed || *game.phase() != Phase::Intermission {
            log::debug!("stale intermission timer for match {} round {}", id, round);
            return;
        }

        game.take_timer();
        self.start_round(id).await;
    }

    async fn end_match(&mut self, id: &MatchId, reason: EndReason) {
        let Some(mut game) = self.registry.remove(id) else {
            return;
        };
        self.cancel_timer(game.take_timer()).await;

        let scores = game.scores();
        let winner = match leader(&scores) {
            Some(tag) => Winner::Player {
                identity: game.slot(tag).player.identity.id.clone(),
            },
            None => Winner::Tie,
        };

        log::info!(
            "match {} ended ({:?}) {}-{}: {:?}",
            id,
            reason,
            scores.a,
            scores.b,
            winner
        );

        let message = ServerMessage::MatchEnded {
            match_id: id.clone(),
            scores,
            winner,
            reason,
        };
        self.broadcast(game.connections(), message).await;
    }

    async fn player_disconnected(&mut self, connection: ConnectionId) {
        if let Some(player) = self.registry.disconnect(connection) {
            log::info!("{} ({}) disconnected", connection, player.identity.display_name);
        }

        if self.registry.leave_queue(connection) {
            log::info!("{} left the waiting queue", connection);
            return;
        }

        let Some(id) = self.registry.match_of(connection).cloned() else {
            return;
        };
        let Some(mut game) = self.registry.remove(&id) else {
            return;
        };
        self.cancel_timer(game.take_timer()).await;

        let Some(slot) = game.slot_of(connection) else {
            return;
        };
        let remaining = game.slot(slot.other());

        log::info!(
            "match {} forfeited by {}, {} wins",
            id,
            connection,
            remaining.player.identity.display_name
        );

        let message = ServerMessage::MatchEndedByForfeit {
            match_id: id.clone(),
            winner: remaining.player.identity.id.clone(),
            score: remaining.score,
        };
        self.notify(remaining.player.connection, message).await;
    }

    async fn shutdown(&mut self) {
        let waiting = self.registry.waiting().cloned();
        let matches = self.registry.shutdown();
        log::info!("shutting down with {} running matches", matches.len());

        let notice = ServerMessage::ServiceUnavailable {
            reason: "server is shutting down".into(),
        };

        if let Some(player) = waiting {
            self.notify(player.connection, notice.clone()).await;
        }

        for mut game in matches {
            self.cancel_timer(game.take_timer()).await;
            self.broadcast(game.connections(), notice.clone()).await;
        }
    }

    async fn arm_timer(&mut self, id: &MatchId, round: u32, delay: Duration, event: TimerEvent) {
        match self.schedular.schedule(delay, event).await {
            Ok(job) => {
                if let Some(game) = self.registry.get_mut(id) {
                    game.arm_timer(job, round);
                }
            }
            Err(err) => log::error!("couldn't arm timer for match {}: {}", id, err),
        }
    }

    async fn cancel_timer(&self, timer: Option<PendingTimer>) {
        let Some(timer) = timer else {
            return;
        };

        if let Err(err) = self.schedular.cancel(timer.job).await {
            log::debug!("couldn't cancel timer {}: {}", timer.job, err);
        }
    }

    async fn notify(&self, connection: ConnectionId, message: ServerMessage) {
        if let Err(err) = self.clients.send(connection, message).await {
            log::debug!("couldn't notify {}: {}", connection, err);
        }
    }

    async fn broadcast(&self, connections: PerSlot<ConnectionId>, message: ServerMessage) {
        self.notify(connections.a, message.clone()).await;
        self.notify(connections.b, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{ManualClock, ManualSchedular, PeerMap, UuidGenerator},
        models::{Elapsed, Question},
    };
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    type TestController = GameController<PeerMap, ManualSchedular, ManualClock, UuidGenerator>;

    struct Client {
        id: ConnectionId,
        rx: UnboundedReceiver<ServerMessage>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut messages = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                messages.push(message);
            }
            messages
        }
    }

    struct Harness {
        controller: TestController,
        peers: PeerMap,
        schedular: ManualSchedular,
        clock: ManualClock,
    }

    fn bank(size: usize) -> Arc<QuestionBank> {
        let answers = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];
        let questions = answers[..size]
            .iter()
            .map(|answer| Question {
                id: answer.to_lowercase(),
                image: format!("https://img/{answer}.svg"),
                answer: answer.to_string(),
            })
            .collect();
        Arc::new(QuestionBank::new(questions, vec![]).unwrap())
    }

    fn instant_rules() -> GameRules {
        GameRules {
            intermission: Duration::ZERO,
            ..GameRules::default()
        }
    }

    impl Harness {
        fn new(rules: GameRules) -> Self {
            Self::with_catalog(rules, Catalog::Ready(bank(6)))
        }

        fn with_catalog(rules: GameRules, catalog: Catalog) -> Self {
            let peers = PeerMap::new();
            let schedular = ManualSchedular::new();
            let clock = ManualClock::new();
            let controller = GameController::new(
                peers.clone(),
                schedular.clone(),
                clock.clone(),
                catalog,
                rules,
            );
            Self {
                controller,
                peers,
                schedular,
                clock,
            }
        }

        async fn connect(&mut self, name: &str) -> Client {
            let (tx, rx) = unbounded_channel();
            let id = self.peers.add_client(tx).await;
            self.controller
                .handle(EngineEvent::PlayerConnected {
                    connection: id,
                    identity: Identity::new(name, name),
                })
                .await;
            Client { id, rx }
        }

        async fn pair(&mut self) -> (Client, Client, MatchId) {
            let mut ana = self.connect("ana").await;
            let mut ben = self.connect("ben").await;
            let match_id = self
                .controller
                .registry()
                .match_of(ana.id)
                .cloned()
                .expect("players should be paired");
            ana.drain();
            ben.drain();
            (ana, ben, match_id)
        }

        fn correct_answer(&self, match_id: &MatchId) -> String {
            self.controller
                .registry()
                .get(match_id)
                .and_then(Match::current_question)
                .map(|question| question.answer.clone())
                .expect("match should have an active question")
        }

        async fn answer_after(&mut self, client: &Client, match_id: &MatchId, answer: &str, ms: u64) {
            self.clock.advance(Duration::from_millis(ms));
            self.controller
                .handle(EngineEvent::AnswerSubmitted {
                    connection: client.id,
                    match_id: match_id.clone(),
                    answer: answer.into(),
                })
                .await;
        }

        async fn fire_next_timer(&mut self) {
            let job = self.schedular.fire_next().expect("a timer should be pending");
            self.controller.handle(EngineEvent::Timer(job.event)).await;
        }
    }

    fn resolved(messages: &[ServerMessage]) -> Vec<&ServerMessage> {
        messages
            .iter()
            .filter(|m| matches!(m, ServerMessage::RoundResolved { .. }))
            .collect()
    }

    fn started_rounds(messages: &[ServerMessage]) -> Vec<u32> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::RoundStarted { round, .. } => Some(*round),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn first_player_searches_second_starts_a_match() {
        let mut harness = Harness::new(instant_rules());

        let mut ana = harness.connect("ana").await;
        assert_eq!(ana.drain(), vec![ServerMessage::Searching]);

        let mut ben = harness.connect("ben").await;
        let ana_messages = ana.drain();
        let ben_messages = ben.drain();

        match &ana_messages[0] {
            ServerMessage::MatchStarted { slot, opponent, .. } => {
                assert_eq!(*slot, SlotTag::A);
                assert_eq!(opponent, "ben");
            }
            other => panic!("expected MatchStarted, got {other:?}"),
        }
        match &ben_messages[0] {
            ServerMessage::MatchStarted { slot, opponent, .. } => {
                assert_eq!(*slot, SlotTag::B);
                assert_eq!(opponent, "ana");
            }
            other => panic!("expected MatchStarted, got {other:?}"),
        }

        match &ana_messages[1] {
            ServerMessage::RoundStarted {
                round,
                options,
                scores,
                ..
            } => {
                assert_eq!(*round, 1);
                assert_eq!(options.len(), 4);
                assert_eq!(*scores, PerSlot::new(0, 0));
            }
            other => panic!("expected RoundStarted, got {other:?}"),
        }
        assert_eq!(ben_messages[1], ana_messages[1]);

        let pending = harness.schedular.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].delay, Duration::from_secs(10));
        assert!(harness.controller.registry().waiting().is_none());
    }

    #[tokio::test]
    async fn mercy_rule_ends_a_two_nil_match_after_round_two() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, mut ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 500).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 400).await;
        harness.answer_after(&ben, &match_id, &answer, 200).await;

        let messages = ana.drain();
        assert_eq!(started_rounds(&messages), vec![2]);

        let rounds = resolved(&messages);
        assert_eq!(rounds.len(), 2);
        match rounds[1] {
            ServerMessage::RoundResolved {
                scores,
                elapsed,
                winner,
                ..
            } => {
                assert_eq!(*scores, PerSlot::new(2, 0));
                assert_eq!(elapsed.a, Elapsed::Answered { millis: 400 });
                assert_eq!(elapsed.b, Elapsed::Answered { millis: 600 });
                assert_eq!(winner.as_deref(), Some("ana"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let ended = ServerMessage::MatchEnded {
            match_id: match_id.clone(),
            scores: PerSlot::new(2, 0),
            winner: Winner::Player {
                identity: "ana".into(),
            },
            reason: EndReason::Mercy,
        };
        assert_eq!(messages.last(), Some(&ended));
        assert_eq!(ben.drain().last(), Some(&ended));

        assert!(harness.controller.registry().is_empty());
        assert!(harness.schedular.pending().is_empty());
    }

    #[tokio::test]
    async fn faster_correct_answer_takes_the_point() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ben, &match_id, &answer, 900).await;
        harness.answer_after(&ana, &match_id, &answer, 300).await;

        let messages = ana.drain();
        match resolved(&messages)[0] {
            ServerMessage::RoundResolved {
                scores,
                elapsed,
                winner,
                ..
            } => {
                assert_eq!(*scores, PerSlot::new(0, 1));
                assert_eq!(elapsed.a, Elapsed::Answered { millis: 1200 });
                assert_eq!(elapsed.b, Elapsed::Answered { millis: 900 });
                assert_eq!(winner.as_deref(), Some("ben"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unanswered_round_times_out_as_a_miss() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, mut ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 2000).await;

        assert!(matches!(
            ben.drain().as_slice(),
            [ServerMessage::OpponentAnswered {
                round: 1,
                elapsed_millis: 2000
            }]
        ));

        harness.clock.advance(Duration::from_secs(8));
        harness.fire_next_timer().await;

        let messages = ana.drain();
        assert!(matches!(
            messages[0],
            ServerMessage::AnswerAcknowledged {
                correct: true,
                elapsed_millis: 2000,
                ..
            }
        ));
        match resolved(&messages)[0] {
            ServerMessage::RoundResolved {
                scores,
                elapsed,
                winner,
                ..
            } => {
                assert_eq!(*scores, PerSlot::new(1, 0));
                assert_eq!(elapsed.b, Elapsed::Missed);
                assert_eq!(winner.as_deref(), Some("ana"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(started_rounds(&messages), vec![2]);
    }

    #[tokio::test]
    async fn second_submission_in_a_round_is_ignored() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, mut ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, "nobody", 100).await;
        harness.answer_after(&ana, &match_id, &answer, 100).await;

        let acks: Vec<_> = ana
            .drain()
            .into_iter()
            .filter(|m| matches!(m, ServerMessage::AnswerAcknowledged { .. }))
            .collect();
        assert_eq!(acks.len(), 1);
        assert_eq!(ben.drain().len(), 1);

        let game = harness.controller.registry().get(&match_id).unwrap();
        assert_eq!(game.scores(), PerSlot::new(0, 0));
        assert_eq!(
            game.slot(SlotTag::A).answer.as_ref().unwrap().value,
            "nobody"
        );
        assert!(!game.slot(SlotTag::B).has_answered());
    }

    #[tokio::test]
    async fn disconnect_forfeits_the_match() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;
        ana.drain();

        harness.peers.remove_client(ben.id).await;
        harness
            .controller
            .handle(EngineEvent::PlayerDisconnected { connection: ben.id })
            .await;

        assert_eq!(
            ana.drain(),
            vec![ServerMessage::MatchEndedByForfeit {
                match_id: match_id.clone(),
                winner: "ana".into(),
                score: 1,
            }]
        );
        assert!(harness.controller.registry().is_empty());
        assert!(harness.schedular.pending().is_empty());

        harness.answer_after(&ana, &match_id, "Alpha", 100).await;
        assert!(ana.drain().is_empty());
    }

    #[tokio::test]
    async fn stale_round_timer_is_a_no_op() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, ben, match_id) = harness.pair().await;
        let stale = harness.schedular.pending()[0].clone();

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 100).await;
        harness.answer_after(&ben, &match_id, &answer, 100).await;
        assert!(harness.schedular.cancelled().contains(&stale.id));
        ana.drain();

        harness.controller.handle(EngineEvent::Timer(stale.event)).await;

        assert!(ana.drain().is_empty());
        let game = harness.controller.registry().get(&match_id).unwrap();
        assert_eq!(game.round(), 2);
        assert!(matches!(game.phase(), Phase::RoundActive { .. }));
    }

    #[tokio::test]
    async fn tied_regulation_goes_to_sudden_death() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, ben, match_id) = harness.pair().await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ana, &match_id, &answer, 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;

        let answer = harness.correct_answer(&match_id);
        harness.answer_after(&ben, &match_id, &answer, 100).await;
        harness.answer_after(&ana, &match_id, "nobody", 100).await;

        harness.answer_after(&ana, &match_id, "nobody", 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;

        let messages = ana.drain();
        assert_eq!(started_rounds(&messages), vec![2, 3, 4]);
        assert!(!messages
            .iter()
            .any(|m| matches!(m, ServerMessage::MatchEnded { .. })));

        let game = harness.controller.registry().get(&match_id).unwrap();
        assert_eq!(game.round(), 4);
        assert_eq!(game.scores(), PerSlot::new(1, 1));
        assert_eq!(game.sudden_death_rounds(), 1);
    }

    #[tokio::test]
    async fn exhausted_questions_end_in_a_draw() {
        let mut harness = Harness::with_catalog(instant_rules(), Catalog::Ready(bank(3)));
        let (mut ana, ben, match_id) = harness.pair().await;

        for _ in 0..3 {
            harness.answer_after(&ana, &match_id, "nobody", 100).await;
            harness.answer_after(&ben, &match_id, "nobody", 100).await;
        }

        assert_eq!(
            ana.drain().last(),
            Some(&ServerMessage::MatchEnded {
                match_id,
                scores: PerSlot::new(0, 0),
                winner: Winner::Tie,
                reason: EndReason::QuestionsExhausted,
            })
        );
        assert!(harness.controller.registry().is_empty());
    }

    #[tokio::test]
    async fn dead_waiting_player_is_skipped() {
        let mut harness = Harness::new(instant_rules());
        let ana = harness.connect("ana").await;
        drop(ana);

        let mut ben = harness.connect("ben").await;
        assert_eq!(ben.drain(), vec![ServerMessage::Searching]);
        assert_eq!(
            harness.controller.registry().waiting().map(|p| p.connection),
            Some(ben.id)
        );
        assert!(harness.controller.registry().is_empty());
    }

    #[tokio::test]
    async fn waiting_player_disconnect_clears_the_slot() {
        let mut harness = Harness::new(instant_rules());
        let ana = harness.connect("ana").await;

        harness
            .controller
            .handle(EngineEvent::PlayerDisconnected { connection: ana.id })
            .await;

        assert!(harness.controller.registry().waiting().is_none());
    }

    #[tokio::test]
    async fn unavailable_catalog_refuses_matchmaking() {
        let mut harness = Harness::with_catalog(
            instant_rules(),
            Catalog::Unavailable("question bank is empty".into()),
        );

        let mut ana = harness.connect("ana").await;
        assert_eq!(
            ana.drain(),
            vec![ServerMessage::ServiceUnavailable {
                reason: "question bank is empty".into()
            }]
        );
        assert!(harness.controller.registry().waiting().is_none());
    }

    #[tokio::test]
    async fn intermission_delays_the_next_round() {
        let mut harness = Harness::new(GameRules::default());
        let (mut ana, ben, match_id) = harness.pair().await;

        harness.answer_after(&ana, &match_id, "nobody", 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;
        assert!(started_rounds(&ana.drain()).is_empty());

        let pending = harness.schedular.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].delay, Duration::from_secs(3));
        assert_eq!(
            pending[0].event,
            TimerEvent::IntermissionElapsed {
                match_id: match_id.clone(),
                round: 2
            }
        );

        harness.fire_next_timer().await;
        assert_eq!(started_rounds(&ana.drain()), vec![2]);
    }

    #[tokio::test]
    async fn forfeit_during_intermission_cancels_the_timer() {
        let mut harness = Harness::new(GameRules::default());
        let (mut ana, ben, match_id) = harness.pair().await;

        harness.answer_after(&ana, &match_id, "nobody", 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;
        let intermission = harness.schedular.pending()[0].clone();

        harness
            .controller
            .handle(EngineEvent::PlayerDisconnected { connection: ben.id })
            .await;
        assert!(harness.schedular.pending().is_empty());
        assert!(harness.schedular.cancelled().contains(&intermission.id));

        ana.drain();
        harness
            .controller
            .handle(EngineEvent::Timer(intermission.event))
            .await;
        assert!(ana.drain().is_empty());
    }

    #[tokio::test]
    async fn find_match_requeues_only_idle_players() {
        let mut harness = Harness::new(instant_rules());
        let mut ana = harness.connect("ana").await;
        ana.drain();

        harness
            .controller
            .handle(EngineEvent::PlayerRequestsMatch { connection: ana.id })
            .await;
        assert!(ana.drain().is_empty());

        let ben = harness.connect("ben").await;
        let match_id = harness.controller.registry().match_of(ana.id).cloned().unwrap();
        harness
            .controller
            .handle(EngineEvent::PlayerDisconnected { connection: ben.id })
            .await;
        assert!(!harness.controller.registry().contains(&match_id));

        ana.drain();
        harness
            .controller
            .handle(EngineEvent::PlayerRequestsMatch { connection: ana.id })
            .await;
        assert_eq!(ana.drain(), vec![ServerMessage::Searching]);
    }

    #[tokio::test]
    async fn failing_schedular_still_lets_answers_resolve_rounds() {
        let peers = PeerMap::new();
        let mut controller: TestController = GameController::new(
            peers.clone(),
            ManualSchedular::failing(),
            ManualClock::new(),
            Catalog::Ready(bank(6)),
            instant_rules(),
        );

        let mut clients = Vec::new();
        for name in ["ana", "ben"] {
            let (tx, rx) = unbounded_channel();
            let id = peers.add_client(tx).await;
            controller
                .handle(EngineEvent::PlayerConnected {
                    connection: id,
                    identity: Identity::new(name, name),
                })
                .await;
            clients.push(Client { id, rx });
        }

        let match_id = controller.registry().match_of(clients[0].id).cloned().unwrap();
        for client in &clients {
            controller
                .handle(EngineEvent::AnswerSubmitted {
                    connection: client.id,
                    match_id: match_id.clone(),
                    answer: "nobody".into(),
                })
                .await;
        }

        assert_eq!(controller.registry().get(&match_id).unwrap().round(), 2);
        assert_eq!(resolved(&clients[0].drain()).len(), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_matches_and_timers() {
        let mut harness = Harness::new(instant_rules());
        let (mut ana, _ben, _match_id) = harness.pair().await;

        harness.controller.handle(EngineEvent::Shutdown).await;

        assert!(harness.controller.registry().is_empty());
        assert!(harness.schedular.pending().is_empty());
        assert!(matches!(
            ana.drain().as_slice(),
            [ServerMessage::ServiceUnavailable { .. }]
        ));
    }

    #[tokio::test]
    async fn shutdown_tells_the_waiting_player() {
        let mut harness = Harness::new(instant_rules());
        let mut ana = harness.connect("ana").await;
        ana.drain();

        harness.controller.handle(EngineEvent::Shutdown).await;

        assert!(harness.controller.registry().waiting().is_none());
        assert_eq!(
            ana.drain(),
            vec![ServerMessage::ServiceUnavailable {
                reason: "server is shutting down".into()
            }]
        );
    }

    #[tokio::test]
    async fn round_timeout_without_an_armed_timer_is_ignored() {
        let peers = PeerMap::new();
        let mut controller: TestController = GameController::new(
            peers.clone(),
            ManualSchedular::failing(),
            ManualClock::new(),
            Catalog::Ready(bank(6)),
            instant_rules(),
        );

        let mut clients = Vec::new();
        for name in ["ana", "ben"] {
            let (tx, rx) = unbounded_channel();
            let id = peers.add_client(tx).await;
            controller
                .handle(EngineEvent::PlayerConnected {
                    connection: id,
                    identity: Identity::new(name, name),
                })
                .await;
            clients.push(Client { id, rx });
        }
        let match_id = controller.registry().match_of(clients[0].id).cloned().unwrap();
        clients[0].drain();

        controller
            .handle(EngineEvent::Timer(TimerEvent::RoundTimeout {
                match_id: match_id.clone(),
                round: 1,
            }))
            .await;

        assert!(clients[0].drain().is_empty());
        let game = controller.registry().get(&match_id).unwrap();
        assert_eq!(game.round(), 1);
        assert!(matches!(game.phase(), Phase::RoundActive { .. }));
    }

    #[tokio::test]
    async fn intermission_event_for_another_round_is_ignored() {
        let mut harness = Harness::new(GameRules::default());
        let (mut ana, ben, match_id) = harness.pair().await;

        harness.answer_after(&ana, &match_id, "nobody", 100).await;
        harness.answer_after(&ben, &match_id, "nobody", 100).await;
        ana.drain();

        harness
            .controller
            .handle(EngineEvent::Timer(TimerEvent::IntermissionElapsed {
                match_id: match_id.clone(),
                round: 3,
            }))
            .await;
        assert!(ana.drain().is_empty());

        harness.fire_next_timer().await;
        assert_eq!(started_rounds(&ana.drain()), vec![2]);
    }
}
