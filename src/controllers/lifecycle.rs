use crate::models::{EndReason, PerSlot, SlotTag};
use std::time::Duration;
use thiserror::Error;

/// Early exit when one player leads by `gap` right after round `after_round`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MercyRule {
    pub after_round: u32,
    pub gap: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub round_time: Duration,
    pub intermission: Duration,
    pub fixed_rounds: u32,
    pub mercy: Option<MercyRule>,
    pub options_per_round: usize,
    pub questions_per_match: Option<usize>,
    pub max_sudden_death_rounds: Option<u32>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            round_time: Duration::from_secs(10),
            intermission: Duration::from_secs(3),
            fixed_rounds: 3,
            mercy: Some(MercyRule {
                after_round: 2,
                gap: 2,
            }),
            options_per_round: 4,
            questions_per_match: None,
            max_sudden_death_rounds: None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RulesError {
    #[error("a match needs at least one regulation round")]
    NoRounds,
    #[error("a round needs at least two options")]
    TooFewOptions,
    #[error("round time must be positive")]
    NoRoundTime,
    #[error("mercy round {0} is past the last regulation round")]
    MercyAfterRegulation(u32),
    #[error("mercy gap must be positive")]
    NoMercyGap,
    #[error("{0} questions per match can't cover the regulation rounds")]
    TooFewQuestions(usize),
}

impl GameRules {
    pub fn validate(&self) -> Result<(), RulesError> {
        use RulesError::*;

        if self.fixed_rounds == 0 {
            return Err(NoRounds);
        }

        if self.options_per_round < 2 {
            return Err(TooFewOptions);
        }

        if self.round_time.is_zero() {
            return Err(NoRoundTime);
        }

        if let Some(limit) = self.questions_per_match {
            if limit < self.fixed_rounds as usize {
                return Err(TooFewQuestions(limit));
            }
        }

        if let Some(mercy) = self.mercy {
            if mercy.after_round > self.fixed_rounds {
                return Err(MercyAfterRegulation(mercy.after_round));
            }
            if mercy.gap == 0 {
                return Err(NoMercyGap);
            }
        }

        Ok(())
    }

    /// Decides what follows the round that was just scored.
    pub fn decide(&self, progress: &MatchProgress) -> Decision {
        let MatchProgress {
            round,
            scores,
            questions_remaining,
            sudden_death_rounds,
        } = *progress;
        let gap = scores.a.abs_diff(scores.b);

        if let Some(mercy) = self.mercy {
            if round == mercy.after_round && gap >= mercy.gap {
                return Decision::End(EndReason::Mercy);
            }
        }

        if round < self.fixed_rounds {
            return if questions_remaining > 0 {
                Decision::NextRound { sudden_death: false }
            } else {
                Decision::End(EndReason::QuestionsExhausted)
            };
        }

        if gap > 0 {
            return Decision::End(if round == self.fixed_rounds {
                EndReason::Regulation
            } else {
                EndReason::SuddenDeath
            });
        }

        if questions_remaining == 0 {
            return Decision::End(EndReason::QuestionsExhausted);
        }

        if let Some(limit) = self.max_sudden_death_rounds {
            if sudden_death_rounds >= limit {
                return Decision::End(EndReason::SuddenDeathLimit);
            }
        }

        Decision::NextRound { sudden_death: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchProgress {
    /// Round just scored, counting from 1.
    pub round: u32,
    pub scores: PerSlot<u32>,
    pub questions_remaining: usize,
    pub sudden_death_rounds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NextRound { sudden_death: bool },
    End(EndReason),
}

pub fn leader(scores: &PerSlot<u32>) -> Option<SlotTag> {
    if scores.a > scores.b {
        Some(SlotTag::A)
    } else if scores.b > scores.a {
        Some(SlotTag::B)
    } else {
        None
    }
}
