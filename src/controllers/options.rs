use crate::bank::QuestionBank;
use rand::{seq::SliceRandom, Rng};

/// Builds the shuffled answer choices for one round.
///
/// Distractors are drawn from the correct answer's confusion group first and
/// topped up from the whole identifier universe. The result always contains
/// `correct`; it is only shorter than `total` when the bank doesn't hold
/// enough distinct identifiers.
pub fn generate_options<R: Rng + ?Sized>(
    correct: &str,
    bank: &QuestionBank,
    total: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut options = vec![correct.to_string()];
    options.extend(bank.pick_distractors(correct, total.saturating_sub(1), rng));

    if options.len() < total {
        let pool: Vec<&String> = bank
            .identifiers()
            .iter()
            .filter(|id| !options.contains(id))
            .collect();
        let missing = total - options.len();
        let fill: Vec<String> = pool
            .choose_multiple(rng, missing)
            .map(|id| (*id).clone())
            .collect();
        options.extend(fill);
    }

    if options.len() < total {
        log::warn!(
            "only {} options available for `{}` (wanted {})",
            options.len(),
            correct,
            total
        );
    }

    options.shuffle(rng);
    options
}
