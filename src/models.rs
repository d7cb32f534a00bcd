//! Data models for flashcards.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lower bound of the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Upper bound of the ease factor.
pub const MAX_EASE_FACTOR: f64 = 3.0;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Cards whose interval reaches this many days count as mature.
pub const MATURE_INTERVAL_DAYS: f64 = 21.0;

/// Rating for how well you remembered a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    Again = 1, // Not remembered, start over
    Hard = 2,  // Remembered with difficulty
    Good = 3,  // Remembered with some effort
    Easy = 4,  // Remembered easily
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn from_key(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Again),
            '2' => Some(Self::Hard),
            '3' => Some(Self::Good),
            '4' => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Again => "Again",
            Self::Hard => "Hard",
            Self::Good => "Good",
            Self::Easy => "Easy",
        }
    }

    /// Good and Easy count as a correct answer.
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Good | Self::Easy)
    }
}

impl TryFrom<u8> for Grade {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(Error::InvalidGrade(other)),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Local>>,

    // SM-2 fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease_factor: Option<f64>,
    #[serde(default)]
    pub repetitions: u32,
    /// Days until the next review. Fractional once the ease factor kicks in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_review: Option<DateTime<Local>>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_review: Option<DateTime<Local>>,

    /// Derived from ease factor and repetitions, only set on analysis output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_score: Option<f64>,
    #[serde(default)]
    pub ai_generated: bool,
}

impl Card {
    pub fn new(question: String, answer: String, now: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: String::new(),
            question,
            answer,
            image_url: String::new(),
            tags: BTreeSet::new(),
            created_at: Some(now),
            ease_factor: Some(DEFAULT_EASE_FACTOR),
            repetitions: 0,
            interval: None,
            last_review: None,
            next_review: None,
            difficulty_score: None,
            ai_generated: false,
        }
    }

    /// Build a card from user input. Question and answer must not be blank.
    pub fn from_draft(draft: CardDraft, ease_factor: f64, now: DateTime<Local>) -> Result<Self> {
        validate_content(&draft.question, &draft.answer)?;

        let mut card = Self::new(draft.question, draft.answer, now);
        card.title = draft.title.trim().to_string();
        card.image_url = draft.image_url.trim().to_string();
        card.tags = draft.tags;
        card.ease_factor = Some(clamp_ease(ease_factor));
        Ok(card)
    }

    /// Ease factor, falling back to `default` when absent, clamped to the valid range.
    pub fn ease_or(&self, default: f64) -> f64 {
        clamp_ease(self.ease_factor.unwrap_or(default))
    }

    pub fn is_reviewed(&self) -> bool {
        self.last_review.is_some()
    }

    pub fn is_due_at(&self, now: DateTime<Local>) -> bool {
        match self.next_review {
            None => true,
            Some(next) => next <= now,
        }
    }

    /// Never scheduled and created on the same calendar day as `now`.
    pub fn is_new_on(&self, now: DateTime<Local>) -> bool {
        self.next_review.is_none()
            && self
                .created_at
                .map_or(false, |created| created.date_naive() == now.date_naive())
    }

    /// Apply a content edit. Scheduling state is left alone.
    pub fn apply_edit(&mut self, edit: CardEdit) -> Result<()> {
        let question = edit.question.unwrap_or_else(|| self.question.clone());
        let answer = edit.answer.unwrap_or_else(|| self.answer.clone());
        validate_content(&question, &answer)?;

        self.question = question;
        self.answer = answer;
        if let Some(title) = edit.title {
            self.title = title.trim().to_string();
        }
        if let Some(image_url) = edit.image_url {
            self.image_url = image_url.trim().to_string();
        }
        if let Some(tags) = edit.tags {
            self.tags = tags;
        }
        Ok(())
    }

    /// Title if present, otherwise the question.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.question
        } else {
            &self.title
        }
    }
}

pub(crate) fn clamp_ease(ease: f64) -> f64 {
    if ease.is_nan() {
        return DEFAULT_EASE_FACTOR;
    }
    ease.clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR)
}

fn validate_content(question: &str, answer: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(Error::InvalidCard("question must not be empty".to_string()));
    }
    if answer.trim().is_empty() {
        return Err(Error::InvalidCard("answer must not be empty".to_string()));
    }
    Ok(())
}

/// User input for a new card.
#[derive(Debug, Clone, Default)]
pub struct CardDraft {
    pub title: String,
    pub question: String,
    pub answer: String,
    pub image_url: String,
    pub tags: BTreeSet<String>,
}

/// Changes to a card's content. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct CardEdit {
    pub title: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

/// Which cards to show when browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardFilter {
    #[default]
    All,
    Due,
    New,
    Reviewed,
}

impl FromStr for CardFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "due" => Ok(Self::Due),
            "new" => Ok(Self::New),
            "reviewed" => Ok(Self::Reviewed),
            other => Err(format!(
                "unknown filter '{}' (expected all, due, new or reviewed)",
                other
            )),
        }
    }
}

/// Browse ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardSort {
    #[default]
    Newest,
    Oldest,
    NextReview,
}

impl FromStr for CardSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "next-review" | "next_review" => Ok(Self::NextReview),
            other => Err(format!(
                "unknown sort '{}' (expected newest, oldest or next-review)",
                other
            )),
        }
    }
}

/// Filter and order cards for display.
///
/// `New` here means "never scheduled" regardless of creation day; the study
/// queue applies its own same-day rule.
pub fn browse<'a>(
    cards: &'a [Card],
    filter: CardFilter,
    sort: CardSort,
    now: DateTime<Local>,
) -> Vec<&'a Card> {
    let mut shown: Vec<&Card> = cards
        .iter()
        .filter(|card| match filter {
            CardFilter::All => true,
            CardFilter::Due => card.is_due_at(now),
            CardFilter::New => card.next_review.is_none(),
            CardFilter::Reviewed => card.next_review.is_some(),
        })
        .collect();

    match sort {
        CardSort::Newest => shown.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        CardSort::Oldest => shown.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        // None sorts before Some, so unscheduled cards come first
        CardSort::NextReview => shown.sort_by(|a, b| a.next_review.cmp(&b.next_review)),
    }

    shown
}

/// Statistics for a card collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeckStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub reviewed_cards: usize,
    pub mature_cards: usize,
}

impl DeckStats {
    pub fn collect(cards: &[Card], now: DateTime<Local>) -> Self {
        let mut stats = DeckStats {
            total_cards: cards.len(),
            ..Default::default()
        };

        for card in cards {
            if card.is_due_at(now) {
                stats.due_cards += 1;
            }
            if card.is_new_on(now) {
                stats.new_cards += 1;
            }
            if card.next_review.is_some() {
                stats.reviewed_cards += 1;
                if card.interval.unwrap_or(0.0) >= MATURE_INTERVAL_DAYS {
                    stats.mature_cards += 1;
                }
            }
        }

        stats
    }
}

/// Timestamps are written as RFC 3339 and read either as RFC 3339 or as a
/// naive local ISO-8601 timestamp, which older card files contain.
pub(crate) mod timestamp {
    use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};

    pub fn parse(raw: &str) -> Option<DateTime<Local>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Local));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .and_then(|naive| resolve_local(&Local, naive))
    }

    /// Attach `tz` to a wall-clock time. Ambiguous times take the earlier
    /// instant; times skipped by a daylight-saving jump move past the gap.
    pub(super) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        tz.from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
    }

    pub mod required {
        use chrono::{DateTime, Local};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&value.to_rfc3339())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw)))
        }
    }

    pub mod option {
        use chrono::{DateTime, Local};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Local>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Local>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| {
                super::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", s)))
            })
            .transpose()
        }
    }
}
