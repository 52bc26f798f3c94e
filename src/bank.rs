use crate::models::{ConfusionGroup, Question};
use rand::{seq::SliceRandom, Rng};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BankError {
    #[error("question bank is empty")]
    Empty,
    #[error("question {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
    #[error("duplicate question id `{0}`")]
    DuplicateId(String),
    #[error("confusion group `{0}` has no members")]
    EmptyGroup(String),
}

/// Read-only question data shared by every match.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    identifiers: Vec<String>,
    groups: Vec<ConfusionGroup>,
    group_index: HashMap<String, usize>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>, groups: Vec<ConfusionGroup>) -> Result<Self, BankError> {
        use BankError::*;

        if questions.is_empty() {
            return Err(Empty);
        }

        let mut ids = HashSet::new();
        for (index, question) in questions.iter().enumerate() {
            for (field, value) in [
                ("id", &question.id),
                ("image", &question.image),
                ("answer", &question.answer),
            ] {
                if value.trim().is_empty() {
                    return Err(EmptyField { index, field });
                }
            }

            if !ids.insert(question.id.as_str()) {
                return Err(DuplicateId(question.id.clone()));
            }
        }

        let mut identifiers: Vec<String> = Vec::with_capacity(questions.len());
        for question in &questions {
            if !identifiers.contains(&question.answer) {
                identifiers.push(question.answer.clone());
            }
        }

        // first group listed wins for names that appear in several groups
        let mut group_index = HashMap::new();
        for (index, group) in groups.iter().enumerate() {
            if group.members.is_empty() {
                return Err(EmptyGroup(group.name.clone()));
            }
            for member in &group.members {
                group_index.entry(member.clone()).or_insert(index);
            }
        }

        Ok(Self {
            questions,
            identifiers,
            groups,
            group_index,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Every distinct answer in the bank, in dataset order.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn groups(&self) -> &[ConfusionGroup] {
        &self.groups
    }

    pub fn group_of(&self, identifier: &str) -> Option<&ConfusionGroup> {
        self.group_index
            .get(identifier)
            .map(|&index| &self.groups[index])
    }

    /// Up to `count` distinct members of `correct`'s confusion group, never `correct` itself.
    pub fn pick_distractors<R: Rng + ?Sized>(
        &self,
        correct: &str,
        count: usize,
        rng: &mut R,
    ) -> Vec<String> {
        let Some(group) = self.group_of(correct) else {
            return Vec::new();
        };

        let mut pool: Vec<&String> = Vec::with_capacity(group.members.len());
        for member in &group.members {
            if member != correct && !pool.contains(&member) {
                pool.push(member);
            }
        }

        pool.choose_multiple(rng, count)
            .map(|member| (*member).clone())
            .collect()
    }

    /// A shuffled question sequence without repeats, capped at `limit` when given.
    pub fn draw_sequence<R: Rng + ?Sized>(&self, limit: Option<usize>, rng: &mut R) -> Vec<Question> {
        let mut sequence = self.questions.clone();
        sequence.shuffle(rng);
        if let Some(limit) = limit {
            sequence.truncate(limit);
        }
        sequence
    }
}
