//! Picks which cards a learner sees next.
//!
//! Due cards (never scheduled, or scheduled at or before `now`) always win
//! over new cards. New cards are those never scheduled *and* created on the
//! same calendar day as `now`.

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Card;
use crate::settings::Settings;

/// Due cards in collection order, truncated to `max` from the front.
pub fn select_due<'a>(cards: &'a [Card], now: DateTime<Local>, max: Option<usize>) -> Vec<&'a Card> {
    let mut due: Vec<&Card> = cards.iter().filter(|card| card.is_due_at(now)).collect();
    if let Some(max) = max {
        due.truncate(max);
    }
    due
}

/// Today's new cards, shuffled with `rng` and then truncated to `max`.
pub fn select_new<'a, R: Rng + ?Sized>(
    cards: &'a [Card],
    now: DateTime<Local>,
    max: Option<usize>,
    rng: &mut R,
) -> Vec<&'a Card> {
    let mut new: Vec<&Card> = cards.iter().filter(|card| card.is_new_on(now)).collect();
    new.shuffle(rng);
    if let Some(max) = max {
        new.truncate(max);
    }
    new
}

/// The next card to study, or `None` when caught up.
///
/// A due card is drawn uniformly from the first `review_cards_per_day` due
/// cards; only when nothing is due is the first of today's shuffled new cards
/// (bounded by `new_cards_per_day`) returned.
pub fn next_card<'a, R: Rng + ?Sized>(
    cards: &'a [Card],
    now: DateTime<Local>,
    settings: &Settings,
    rng: &mut R,
) -> Option<&'a Card> {
    let due = select_due(cards, now, Some(settings.review_cards_per_day as usize));
    if let Some(card) = due.choose(rng) {
        return Some(*card);
    }

    let new = select_new(cards, now, Some(settings.new_cards_per_day as usize), rng);
    new.first().copied()
}
