//! Finds the cards a learner keeps struggling with.

use log::info;

use crate::models::{Card, DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR};

/// Cards at or above this ease are not considered difficult.
pub const EASE_FACTOR_THRESHOLD: f64 = 1.8;
/// Cards need more than this many repetitions to be considered difficult.
pub const REPETITIONS_THRESHOLD: u32 = 2;

const EASE_RANGE: f64 = 1.7;
const REPETITION_CAP: f64 = 10.0;

/// Difficulty on a 0-10 scale, rounded to one decimal.
///
/// Seventy percent comes from how far the ease factor has fallen below 3.0,
/// thirty percent from the repetition count (capped at ten).
pub fn score(card: &Card) -> f64 {
    let ease = card.ease_or(DEFAULT_EASE_FACTOR);
    let base = ((MAX_EASE_FACTOR - ease) / EASE_RANGE).max(0.0);
    let repetition_factor = (f64::from(card.repetitions) / REPETITION_CAP).min(1.0);

    let raw = (base * 0.7 + repetition_factor * 0.3) * 10.0;
    (raw * 10.0).round() / 10.0
}

pub fn is_difficult(card: &Card) -> bool {
    card.is_reviewed()
        && card.ease_or(DEFAULT_EASE_FACTOR) < EASE_FACTOR_THRESHOLD
        && card.repetitions > REPETITIONS_THRESHOLD
}

/// Difficult cards annotated with their score, hardest first.
///
/// Cards with equal scores keep their input order.
pub fn find_difficult(cards: &[Card]) -> Vec<Card> {
    info!("Analyzing difficulty of {} flashcards", cards.len());

    let mut difficult: Vec<Card> = cards
        .iter()
        .filter(|card| is_difficult(card))
        .map(|card| {
            let mut annotated = card.clone();
            annotated.difficulty_score = Some(score(card));
            annotated
        })
        .collect();

    difficult.sort_by(|a, b| {
        let a = a.difficulty_score.unwrap_or(0.0);
        let b = b.difficulty_score.unwrap_or(0.0);
        b.total_cmp(&a)
    });

    info!("Found {} difficult cards", difficult.len());
    difficult
}
