use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Index, IndexMut},
    time::Duration,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub image: String,
    pub answer: String,
}

/// Identifiers that are easy to mistake for one another, used as distractors.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ConfusionGroup {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An already validated player identity, as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub connection: ConnectionId,
    pub identity: Identity,
}

/// Seat of a player inside a match, fixed when the match is created.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotTag {
    A,
    B,
}

impl SlotTag {
    pub const BOTH: [SlotTag; 2] = [SlotTag::A, SlotTag::B];

    pub fn other(self) -> Self {
        match self {
            SlotTag::A => SlotTag::B,
            SlotTag::B => SlotTag::A,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerSlot<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerSlot<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> PerSlot<U> {
        PerSlot {
            a: f(&self.a),
            b: f(&self.b),
        }
    }
}

impl<T> Index<SlotTag> for PerSlot<T> {
    type Output = T;

    fn index(&self, slot: SlotTag) -> &T {
        match slot {
            SlotTag::A => &self.a,
            SlotTag::B => &self.b,
        }
    }
}

impl<T> IndexMut<SlotTag> for PerSlot<T> {
    fn index_mut(&mut self, slot: SlotTag) -> &mut T {
        match slot {
            SlotTag::A => &mut self.a,
            SlotTag::B => &mut self.b,
        }
    }
}

/// Time a player took to answer. `Missed` sorts after every answered time.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "status")]
pub enum Elapsed {
    Answered { millis: u64 },
    Missed,
}

impl Elapsed {
    pub fn from_duration(elapsed: Option<Duration>) -> Self {
        match elapsed {
            Some(elapsed) => Elapsed::Answered {
                millis: millis(elapsed),
            },
            None => Elapsed::Missed,
        }
    }
}

pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum Winner {
    Player { identity: String },
    Tie,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Mercy,
    Regulation,
    SuddenDeath,
    QuestionsExhausted,
    SuddenDeathLimit,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Searching,
    ServiceUnavailable {
        reason: String,
    },
    MatchStarted {
        match_id: MatchId,
        slot: SlotTag,
        opponent: String,
        opponent_name: String,
    },
    RoundStarted {
        match_id: MatchId,
        round: u32,
        image: String,
        options: Vec<String>,
        scores: PerSlot<u32>,
    },
    AnswerAcknowledged {
        round: u32,
        correct: bool,
        correct_answer: String,
        elapsed_millis: u64,
    },
    OpponentAnswered {
        round: u32,
        elapsed_millis: u64,
    },
    RoundResolved {
        round: u32,
        correct_answer: String,
        scores: PerSlot<u32>,
        elapsed: PerSlot<Elapsed>,
        winner: Option<String>,
    },
    MatchEnded {
        match_id: MatchId,
        scores: PerSlot<u32>,
        winner: Winner,
        reason: EndReason,
    },
    MatchEndedByForfeit {
        match_id: MatchId,
        winner: String,
        score: u32,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    FindMatch,
    Answer { match_id: MatchId, answer: String },
}

pub type Tx = UnboundedSender<ServerMessage>;

/// Delayed events the engine asks the scheduler to deliver back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    RoundTimeout { match_id: MatchId, round: u32 },
    IntermissionElapsed { match_id: MatchId, round: u32 },
}

impl TimerEvent {
    pub fn match_id(&self) -> &MatchId {
        match self {
            TimerEvent::RoundTimeout { match_id, .. } => match_id,
            TimerEvent::IntermissionElapsed { match_id, .. } => match_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PlayerConnected {
        connection: ConnectionId,
        identity: Identity,
    },
    PlayerRequestsMatch {
        connection: ConnectionId,
    },
    AnswerSubmitted {
        connection: ConnectionId,
        match_id: MatchId,
        answer: String,
    },
    PlayerDisconnected {
        connection: ConnectionId,
    },
    Timer(TimerEvent),
    Shutdown,
}

/// Sending half of the engine's event queue.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn channel() -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` once the engine loop has stopped.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
