use crate::{
    controllers::round::Match,
    models::{ConnectionId, MatchId, Player},
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// The player now occupies the waiting slot.
    Waiting,
    /// The player was already the one waiting.
    AlreadyWaiting,
    /// The previous occupant was popped and should become the opponent.
    Opponent(Player),
}

/// Owns every connected player, the single waiting slot and all live matches.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    players: HashMap<ConnectionId, Player>,
    waiting: Option<Player>,
    matches: HashMap<MatchId, Match>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, player: Player) {
        self.players.insert(player.connection, player);
    }

    pub fn player(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.get(&connection)
    }

    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<Player> {
        self.players.remove(&connection)
    }

    pub fn waiting(&self) -> Option<&Player> {
        self.waiting.as_ref()
    }

    /// Parks `player` in the empty waiting slot, or pops a different occupant to pair with.
    pub fn pair_or_wait(&mut self, player: Player) -> Pairing {
        match self.waiting.take() {
            None => {
                self.waiting = Some(player);
                Pairing::Waiting
            }
            Some(waiting) if waiting.connection == player.connection => {
                self.waiting = Some(waiting);
                Pairing::AlreadyWaiting
            }
            Some(waiting) => Pairing::Opponent(waiting),
        }
    }

    /// Empties the waiting slot if `connection` is its occupant.
    pub fn leave_queue(&mut self, connection: ConnectionId) -> bool {
        match &self.waiting {
            Some(waiting) if waiting.connection == connection => {
                self.waiting = None;
                true
            }
            _ => false,
        }
    }

    pub fn insert(&mut self, game: Match) {
        self.matches.insert(game.id().clone(), game);
    }

    pub fn get(&self, id: &MatchId) -> Option<&Match> {
        self.matches.get(id)
    }

    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut Match> {
        self.matches.get_mut(id)
    }

    pub fn remove(&mut self, id: &MatchId) -> Option<Match> {
        self.matches.remove(id)
    }

    pub fn contains(&self, id: &MatchId) -> bool {
        self.matches.contains_key(id)
    }

    pub fn match_of(&self, connection: ConnectionId) -> Option<&MatchId> {
        self.matches
            .values()
            .find(|game| game.slot_of(connection).is_some())
            .map(Match::id)
    }

    pub fn is_busy(&self, connection: ConnectionId) -> bool {
        self.waiting
            .as_ref()
            .is_some_and(|waiting| waiting.connection == connection)
            || self.match_of(connection).is_some()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Empties the registry, handing back the matches that were still running.
    pub fn shutdown(&mut self) -> Vec<Match> {
        self.waiting = None;
        self.players.clear();
        self.matches.drain().map(|(_, game)| game).collect()
    }
}
