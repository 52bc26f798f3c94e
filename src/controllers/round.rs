use crate::{
    models::{ConnectionId, Elapsed, MatchId, PerSlot, Player, Question, SlotTag},
    ports::JobId,
};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub value: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub tag: SlotTag,
    pub player: Player,
    pub score: u32,
    pub answer: Option<SubmittedAnswer>,
}

impl PlayerSlot {
    fn new(tag: SlotTag, player: Player) -> Self {
        Self {
            tag,
            player,
            score: 0,
            answer: None,
        }
    }

    pub fn has_answered(&self) -> bool {
        self.answer.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Created, or between a resolved round and the next one.
    Idle,
    RoundActive { started_at: Instant },
    Intermission,
}

/// A cancellable timer owned by the match; dropped whenever the phase it guards ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub job: JobId,
    pub round: u32,
}

/// What a player learns right after submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReceipt {
    pub slot: SlotTag,
    pub round: u32,
    pub correct: bool,
    pub correct_answer: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    pub round: u32,
    pub correct_answer: String,
    pub scores: PerSlot<u32>,
    pub elapsed: PerSlot<Elapsed>,
    pub winner: Option<SlotTag>,
}

/// Correctness and latency of one slot's answer, `None` latency meaning missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub correct: bool,
    pub elapsed: Option<Duration>,
}

/// Picks the slot that earns this round's point, if any.
pub fn round_winner(attempts: &PerSlot<Attempt>) -> Option<SlotTag> {
    match (attempts.a.correct, attempts.b.correct) {
        (true, true) => match (attempts.a.elapsed, attempts.b.elapsed) {
            (Some(a), Some(b)) if a < b => Some(SlotTag::A),
            (Some(a), Some(b)) if b < a => Some(SlotTag::B),
            _ => None,
        },
        (true, false) => Some(SlotTag::A),
        (false, true) => Some(SlotTag::B),
        (false, false) => None,
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    slots: PerSlot<PlayerSlot>,
    questions: Vec<Question>,
    round: u32,
    phase: Phase,
    timer: Option<PendingTimer>,
    sudden_death_rounds: u32,
}

impl Match {
    pub fn new(id: MatchId, a: Player, b: Player, questions: Vec<Question>) -> Self {
        Self {
            id,
            slots: PerSlot::new(
                PlayerSlot::new(SlotTag::A, a),
                PlayerSlot::new(SlotTag::B, b),
            ),
            questions,
            round: 0,
            phase: Phase::Idle,
            timer: None,
            sudden_death_rounds: 0,
        }
    }

    pub fn id(&self) -> &MatchId {
        &self.id
    }

    pub fn slot(&self, tag: SlotTag) -> &PlayerSlot {
        &self.slots[tag]
    }

    pub fn slot_of(&self, connection: ConnectionId) -> Option<SlotTag> {
        SlotTag::BOTH
            .into_iter()
            .find(|&tag| self.slots[tag].player.connection == connection)
    }

    pub fn connections(&self) -> PerSlot<ConnectionId> {
        self.slots.map(|slot| slot.player.connection)
    }

    pub fn scores(&self) -> PerSlot<u32> {
        self.slots.map(|slot| slot.score)
    }

    /// Number of the current (or last) round, 0 before the first one.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn questions_remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.round as usize)
    }

    pub fn current_question(&self) -> Option<&Question> {
        let index = (self.round as usize).checked_sub(1)?;
        self.questions.get(index)
    }

    pub fn next_question(&self) -> Option<&Question> {
        self.questions.get(self.round as usize)
    }

    pub fn sudden_death_rounds(&self) -> u32 {
        self.sudden_death_rounds
    }

    pub fn note_sudden_death_round(&mut self) {
        self.sudden_death_rounds += 1;
    }

    /// Moves to the next question and opens it for answers. Returns the new
    /// round number, or `None` when the question sequence is used up.
    pub fn begin_round(&mut self, started_at: Instant) -> Option<u32> {
        if matches!(self.phase, Phase::RoundActive { .. }) {
            return None;
        }
        self.next_question()?;

        self.round += 1;
        for tag in SlotTag::BOTH {
            self.slots[tag].answer = None;
        }
        self.phase = Phase::RoundActive { started_at };
        Some(self.round)
    }

    /// Records a slot's first answer of the active round; later ones are ignored.
    pub fn record_answer(
        &mut self,
        slot: SlotTag,
        value: String,
        at: Instant,
    ) -> Option<AnswerReceipt> {
        let Phase::RoundActive { started_at } = self.phase else {
            return None;
        };
        if self.slots[slot].has_answered() {
            return None;
        }
        let correct_answer = self.current_question()?.answer.clone();

        let correct = value == correct_answer;
        self.slots[slot].answer = Some(SubmittedAnswer { value, at });

        Some(AnswerReceipt {
            slot,
            round: self.round,
            correct,
            correct_answer,
            elapsed: at.saturating_duration_since(started_at),
        })
    }

    pub fn all_answered(&self) -> bool {
        SlotTag::BOTH
            .into_iter()
            .all(|tag| self.slots[tag].has_answered())
    }

    /// Closes the active round and awards at most one point.
    pub fn score_round(&mut self) -> Option<RoundResult> {
        let Phase::RoundActive { started_at } = self.phase else {
            return None;
        };
        let correct_answer = self.current_question()?.answer.clone();

        let attempts = self.slots.map(|slot| match &slot.answer {
            Some(answer) => Attempt {
                correct: answer.value == correct_answer,
                elapsed: Some(answer.at.saturating_duration_since(started_at)),
            },
            None => Attempt {
                correct: false,
                elapsed: None,
            },
        });

        let winner = round_winner(&attempts);
        if let Some(tag) = winner {
            self.slots[tag].score += 1;
        }
        self.phase = Phase::Idle;

        Some(RoundResult {
            round: self.round,
            correct_answer,
            scores: self.scores(),
            elapsed: attempts.map(|attempt| Elapsed::from_duration(attempt.elapsed)),
            winner,
        })
    }

    pub fn enter_intermission(&mut self) {
        self.phase = Phase::Intermission;
    }

    pub fn leave_intermission(&mut self) {
        if self.phase == Phase::Intermission {
            self.phase = Phase::Idle;
        }
    }

    pub fn arm_timer(&mut self, job: JobId, round: u32) {
        self.timer = Some(PendingTimer { job, round });
    }

    pub fn take_timer(&mut self) -> Option<PendingTimer> {
        self.timer.take()
    }

    pub fn timer(&self) -> Option<PendingTimer> {
        self.timer
    }
}
