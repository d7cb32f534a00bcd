//! SM-2 style scheduling.
//!
//! Each grade moves a card's `(interval, ease_factor, repetitions)` to a new
//! state and stamps `last_review = now`, `next_review = now + interval days`:
//!
//! - Again: repetitions reset to 0, interval back to the initial interval.
//! - Hard: ease drops by 0.15 (floor 1.3), interval grows by 1.2x the modifier.
//! - Good: 1 day, then 3 days, then interval x ease x modifier.
//! - Easy: 3 days, then 7 days, then interval x ease x 1.3 x modifier; ease
//!   rises by 0.15 (ceiling 3.0).
//!
//! Intervals never exceed `MAX_INTERVAL_DAYS`.
//!
//! Scheduling is pure: the input card is never touched and `now` is passed in.

use chrono::{DateTime, Duration, Local};

use crate::error::Result;
use crate::models::{clamp_ease, Card, Grade, MAX_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::settings::Settings;

const EASE_STEP: f64 = 0.15;
const HARD_MULTIPLIER: f64 = 1.2;
const EASY_BONUS: f64 = 1.3;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Longest interval the scheduler hands out, about one hundred years.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

/// Scheduling fields of a card after a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewState {
    pub interval: f64,
    pub ease_factor: f64,
    pub repetitions: u32,
}

/// Computes review schedules with the current settings.
#[derive(Debug, Clone)]
pub struct Scheduler {
    settings: Settings,
}

impl Scheduler {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Grade a card with a raw grade value.
    ///
    /// Grades outside 1..=4 fail with `InvalidGrade` before anything is computed.
    pub fn advance(&self, card: &Card, grade: u8, now: DateTime<Local>) -> Result<Card> {
        let grade = Grade::try_from(grade)?;
        Ok(self.review(card, grade, now))
    }

    /// Return a copy of `card` rescheduled for `grade` at `now`.
    pub fn review(&self, card: &Card, grade: Grade, now: DateTime<Local>) -> Card {
        let state = self.next_state(card, grade);

        let mut reviewed = card.clone();
        reviewed.interval = Some(state.interval);
        reviewed.ease_factor = Some(state.ease_factor);
        reviewed.repetitions = state.repetitions;
        reviewed.last_review = Some(now);
        // Only a clock near the end of the representable range can overflow.
        let due = now.checked_add_signed(interval_duration(state.interval));
        reviewed.next_review = Some(due.unwrap_or(now));
        reviewed
    }

    /// The scheduling state a grade would produce, without timestamps.
    pub fn next_state(&self, card: &Card, grade: Grade) -> ReviewState {
        let initial = f64::from(self.settings.initial_interval);
        let modifier = self.settings.interval_modifier;

        let mut interval = match card.interval {
            Some(days) if days.is_finite() && days > 0.0 => days.min(MAX_INTERVAL_DAYS),
            _ => initial,
        };
        let mut ease = card.ease_or(self.settings.ease_factor_default);
        let mut repetitions = card.repetitions;

        match grade {
            Grade::Again => {
                repetitions = 0;
                interval = initial;
            }
            Grade::Hard => {
                ease = (ease - EASE_STEP).max(MIN_EASE_FACTOR);
                interval = if repetitions == 0 {
                    initial
                } else {
                    (interval * HARD_MULTIPLIER * modifier).max(1.0)
                };
                repetitions += 1;
            }
            Grade::Good => {
                interval = match repetitions {
                    0 => 1.0,
                    1 => 3.0,
                    _ => interval * ease * modifier,
                };
                repetitions += 1;
            }
            Grade::Easy => {
                interval = match repetitions {
                    0 => 3.0,
                    1 => 7.0,
                    _ => interval * ease * EASY_BONUS * modifier,
                };
                ease = (ease + EASE_STEP).min(MAX_EASE_FACTOR);
                repetitions += 1;
            }
        }

        ReviewState {
            interval: interval.min(MAX_INTERVAL_DAYS),
            ease_factor: clamp_ease(ease),
            repetitions,
        }
    }

    /// Interval each grade would give `card`, formatted for display.
    pub fn preview_intervals(&self, card: &Card) -> [(Grade, String); 4] {
        Grade::ALL.map(|grade| (grade, format_interval(self.next_state(card, grade).interval)))
    }
}

/// Convert a (possibly fractional) day count to a duration.
pub fn interval_duration(days: f64) -> Duration {
    let days = if days.is_finite() { days.clamp(0.0, MAX_INTERVAL_DAYS) } else { 0.0 };
    Duration::milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

/// Human-readable interval: days under a month, then months, then years.
pub fn format_interval(days: f64) -> String {
    if days < 30.0 {
        let rounded = (days * 10.0).round() / 10.0;
        if rounded.fract() == 0.0 {
            format!("{}d", rounded as i64)
        } else {
            format!("{:.1}d", rounded)
        }
    } else if days < 365.0 {
        format!("{:.1}mo", days / 30.0)
    } else {
        format!("{:.1}y", days / 365.0)
    }
}
