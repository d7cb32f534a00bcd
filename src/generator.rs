//! Interface to the external AI card generator.
//!
//! The generator itself lives outside this crate. We only build its request
//! from analyzed cards and turn its output into ordinary new cards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::difficulty;
use crate::models::{Card, DEFAULT_EASE_FACTOR};

pub const AI_GENERATED_TAG: &str = "ai_generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// New cards on related topics.
    #[default]
    Related,
    /// Split hard concepts into simpler cards.
    Breakdown,
    /// Same material, phrased differently.
    Alternative,
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty '{}' (expected easy, medium or hard)", other)),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "related" => Ok(Self::Related),
            "breakdown" => Ok(Self::Breakdown),
            "alternative" => Ok(Self::Alternative),
            other => Err(format!(
                "unknown strategy '{}' (expected related, breakdown or alternative)",
                other
            )),
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Related => "related",
            Self::Breakdown => "breakdown",
            Self::Alternative => "alternative",
        })
    }
}

/// A struggling card as the generator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultCard {
    pub question: String,
    pub answer: String,
    pub difficulty_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub difficult_cards: Vec<DifficultCard>,
    pub count: u32,
    pub difficulty_level: DifficultyLevel,
    pub strategy: Strategy,
}

impl GenerationRequest {
    /// Build a request from analyzed cards. Cards without a score are scored here.
    pub fn from_difficult(
        cards: &[Card],
        count: u32,
        difficulty_level: DifficultyLevel,
        strategy: Strategy,
    ) -> Self {
        let difficult_cards = cards
            .iter()
            .map(|card| DifficultCard {
                question: card.question.clone(),
                answer: card.answer.clone(),
                difficulty_score: card
                    .difficulty_score
                    .unwrap_or_else(|| difficulty::score(card)),
            })
            .collect();

        Self {
            difficult_cards,
            count,
            difficulty_level,
            strategy,
        }
    }
}

/// Card content produced by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCard {
    #[serde(default)]
    pub title: String,
    pub question: String,
    pub answer: String,
}

/// Something that can produce cards for a request, typically over the network.
/// Callers own timeouts and cancellation.
pub trait CardGenerator {
    type Error: std::error::Error;

    fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedCard>, Self::Error>;
}

/// Turn generator output into new, unscheduled cards. Blank entries are dropped.
pub fn into_new_cards(generated: Vec<GeneratedCard>, now: DateTime<Local>) -> Vec<Card> {
    generated
        .into_iter()
        .filter(|g| !g.question.trim().is_empty() && !g.answer.trim().is_empty())
        .map(|g| {
            let mut card = Card::new(g.question.trim().to_string(), g.answer.trim().to_string(), now);
            card.title = g.title.trim().to_string();
            card.ease_factor = Some(DEFAULT_EASE_FACTOR);
            card.repetitions = 0;
            card.tags.insert(AI_GENERATED_TAG.to_string());
            card.ai_generated = true;
            card
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 12, 12, 0, 0).unwrap()
    }

    #[test]
    fn request_uses_wire_field_names() {
        let mut card = Card::new("What is a monad?".into(), "A monoid in the category of endofunctors".into(), now());
        card.difficulty_score = Some(8.4);

        let request = GenerationRequest::from_difficult(&[card], 3, DifficultyLevel::Hard, Strategy::Breakdown);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["count"], 3);
        assert_eq!(json["difficultyLevel"], "hard");
        assert_eq!(json["strategy"], "breakdown");
        assert_eq!(json["difficultCards"][0]["difficultyScore"], 8.4);
        assert_eq!(json["difficultCards"][0]["question"], "What is a monad?");
    }

    #[test]
    fn unscored_cards_are_scored_for_the_request() {
        let mut card = Card::new("Q".into(), "A".into(), now());
        card.ease_factor = Some(1.3);
        card.repetitions = 10;

        let request = GenerationRequest::from_difficult(&[card], 1, DifficultyLevel::default(), Strategy::default());
        assert_eq!(request.difficult_cards[0].difficulty_score, 10.0);
    }

    #[test]
    fn generated_cards_start_unscheduled() {
        let generated = vec![
            GeneratedCard {
                title: String::new(),
                question: " Why do intervals grow? ".into(),
                answer: "Because recall got easier".into(),
            },
            GeneratedCard {
                title: String::new(),
                question: "".into(),
                answer: "orphan".into(),
            },
        ];

        let cards = into_new_cards(generated, now());
        assert_eq!(cards.len(), 1);

        let card = &cards[0];
        assert_eq!(card.question, "Why do intervals grow?");
        assert_eq!(card.repetitions, 0);
        assert_eq!(card.ease_factor, Some(2.5));
        assert!(card.next_review.is_none());
        assert!(card.ai_generated);
        assert!(card.tags.contains(AI_GENERATED_TAG));
    }

    struct CannedGenerator;

    impl CardGenerator for CannedGenerator {
        type Error = std::io::Error;

        fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedCard>, Self::Error> {
            if request.difficult_cards.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "nothing to build on"));
            }
            Ok((0..request.count)
                .map(|i| GeneratedCard {
                    title: String::new(),
                    question: format!("Follow-up {} to: {}", i, request.difficult_cards[0].question),
                    answer: "See notes".into(),
                })
                .collect())
        }
    }

    #[test]
    fn generator_output_round_trips_into_cards() {
        let mut card = Card::new("Q".into(), "A".into(), now());
        card.difficulty_score = Some(6.0);
        let request = GenerationRequest::from_difficult(&[card], 2, DifficultyLevel::Easy, Strategy::Related);

        let generated = CannedGenerator.generate(&request).unwrap();
        let cards = into_new_cards(generated, now());
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.ai_generated && c.is_new_on(now())));

        let empty = GenerationRequest::from_difficult(&[], 2, DifficultyLevel::Easy, Strategy::Related);
        assert!(CannedGenerator.generate(&empty).is_err());
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("Alternative".parse::<Strategy>().unwrap(), Strategy::Alternative);
        assert_eq!("easy".parse::<DifficultyLevel>().unwrap(), DifficultyLevel::Easy);
        assert!("sideways".parse::<Strategy>().is_err());
    }
}
