//! Study session: pick a card, show it, grade it, persist it.

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::difficulty;
use crate::error::{Error, Result};
use crate::generator::{self, GeneratedCard};
use crate::models::{self, Card, CardDraft, CardEdit, CardFilter, CardSort, DeckStats, Grade};
use crate::queue;
use crate::settings::Settings;
use crate::sm2::Scheduler;
use crate::storage::{CardStore, SessionStore};

/// Study counters that persist between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyStats {
    pub studied_today: u32,
    pub total_studied: u32,
    pub correct_today: u32,
    pub total_correct: u32,
    /// Consecutive Good/Easy answers.
    pub streak: u32,
    #[serde(
        with = "crate::models::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_study_date: Option<DateTime<Local>>,
}

impl StudyStats {
    /// Zero the daily counters if `now` falls on a later day than the last
    /// study. Returns whether anything was reset.
    pub fn roll_over(&mut self, now: DateTime<Local>) -> bool {
        match self.last_study_date {
            Some(last) if now.date_naive() > last.date_naive() => {
                self.studied_today = 0;
                self.correct_today = 0;
                true
            }
            _ => false,
        }
    }

    pub fn record(&mut self, grade: Grade, now: DateTime<Local>) {
        self.roll_over(now);

        self.studied_today += 1;
        self.total_studied += 1;
        if grade.is_correct() {
            self.correct_today += 1;
            self.total_correct += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.last_study_date = Some(now);
    }

    /// Percentage of today's answers that were correct.
    pub fn success_rate_today(&self) -> u32 {
        percent(self.correct_today, self.studied_today)
    }

    /// Percentage of all answers that were correct.
    pub fn success_rate_overall(&self) -> u32 {
        percent(self.total_correct, self.total_studied)
    }
}

fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

/// What the learner is doing right now.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub stats: StudyStats,
    /// Id of the card on screen, if any.
    pub current: Option<String>,
    pub showing_answer: bool,
}

/// Result of grading a card.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub card: Card,
    pub grade: Grade,
}

/// A single learner's study session over one card collection.
pub struct Session<S, C, R> {
    store: S,
    clock: C,
    rng: R,
    scheduler: Scheduler,
    cards: Vec<Card>,
    state: SessionState,
    dirty: bool,
}

impl<S, C, R> Session<S, C, R>
where
    S: CardStore + SessionStore,
    C: Clock,
    R: Rng,
{
    /// Load settings, cards and counters. Daily counters are reset here when
    /// the last study happened on an earlier day.
    pub fn open(store: S, clock: C, rng: R) -> Result<Self> {
        let settings = store.load_settings()?;
        let cards = store.load()?;
        let mut stats = store.load_stats()?;

        if stats.roll_over(clock.now()) {
            info!("New study day, daily counters reset");
        }

        Ok(Self {
            store,
            clock,
            rng,
            scheduler: Scheduler::new(settings),
            cards,
            state: SessionState {
                stats,
                ..Default::default()
            },
            dirty: false,
        })
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn settings(&self) -> &Settings {
        self.scheduler.settings()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &StudyStats {
        &self.state.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether in-memory changes have not been written yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Pick the next card and make it current. `None` means caught up.
    pub fn next_card(&mut self) -> Option<&Card> {
        let now = self.clock.now();
        let next = queue::next_card(&self.cards, now, self.scheduler.settings(), &mut self.rng)
            .map(|card| card.id.clone());

        self.state.current = next;
        self.state.showing_answer = false;
        self.current_card()
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.state.current.as_deref().and_then(|id| self.card(id))
    }

    pub fn show_answer(&mut self) {
        self.state.showing_answer = true;
    }

    /// Interval each grade would give the current card.
    pub fn preview_intervals(&self) -> Option<[(Grade, String); 4]> {
        self.current_card()
            .map(|card| self.scheduler.preview_intervals(card))
    }

    /// Grade a card and reschedule it.
    ///
    /// An invalid grade or unknown id changes nothing. When auto-save is on
    /// and writing fails, the error is returned but the new schedule stays in
    /// memory so a later `save` can retry.
    pub fn grade(&mut self, card_id: &str, grade: u8) -> Result<GradeOutcome> {
        let grade = Grade::try_from(grade)?;
        let index = self.position(card_id)?;
        let now = self.clock.now();

        let reviewed = self.scheduler.review(&self.cards[index], grade, now);
        info!(
            "Graded card {} as {}: next review in {:.2} days",
            card_id,
            grade,
            reviewed.interval.unwrap_or_default()
        );
        self.cards[index] = reviewed;
        self.state.stats.record(grade, now);

        if self.state.current.as_deref() == Some(card_id) {
            self.state.current = None;
            self.state.showing_answer = false;
        }

        let outcome = GradeOutcome {
            card: self.cards[index].clone(),
            grade,
        };
        self.changed()?;
        Ok(outcome)
    }

    /// Grade whatever card is current.
    pub fn grade_current(&mut self, grade: u8) -> Result<GradeOutcome> {
        let id = self
            .state
            .current
            .clone()
            .ok_or_else(|| Error::MissingCard("no card is being studied".to_string()))?;
        self.grade(&id, grade)
    }

    pub fn add_card(&mut self, draft: CardDraft) -> Result<&Card> {
        let card = Card::from_draft(draft, self.settings().ease_factor_default, self.clock.now())?;
        debug!("Created card {}", card.id);
        self.cards.push(card);
        self.changed()?;
        Ok(&self.cards[self.cards.len() - 1])
    }

    pub fn edit_card(&mut self, card_id: &str, edit: CardEdit) -> Result<&Card> {
        let index = self.position(card_id)?;
        self.cards[index].apply_edit(edit)?;
        self.changed()?;
        Ok(&self.cards[index])
    }

    /// Remove a card for good.
    pub fn delete_card(&mut self, card_id: &str) -> Result<Card> {
        let index = self.position(card_id)?;
        let removed = self.cards.remove(index);
        if self.state.current.as_deref() == Some(card_id) {
            self.state.current = None;
            self.state.showing_answer = false;
        }
        info!("Deleted card {}", card_id);
        self.changed()?;
        Ok(removed)
    }

    /// Add collaborator-generated cards as fresh cards. Returns how many were added.
    pub fn import_generated(&mut self, generated: Vec<GeneratedCard>) -> Result<usize> {
        let new_cards = generator::into_new_cards(generated, self.clock.now());
        let count = new_cards.len();
        self.cards.extend(new_cards);
        info!("Added {} generated cards", count);
        if count > 0 {
            self.changed()?;
        }
        Ok(count)
    }

    /// Struggling cards, hardest first.
    pub fn difficult_cards(&self) -> Vec<Card> {
        difficulty::find_difficult(&self.cards)
    }

    pub fn deck_stats(&self) -> DeckStats {
        DeckStats::collect(&self.cards, self.clock.now())
    }

    pub fn browse(&self, filter: CardFilter, sort: CardSort) -> Vec<&Card> {
        models::browse(&self.cards, filter, sort, self.clock.now())
    }

    /// Validate and store new settings. Applies to every later grade and draw.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.store.save_settings(&settings)?;
        self.scheduler = Scheduler::new(settings);
        info!("Scheduling settings updated");
        Ok(())
    }

    pub fn reset_settings(&mut self) -> Result<()> {
        self.update_settings(Settings::default())
    }

    /// Write cards and counters.
    pub fn save(&mut self) -> Result<()> {
        self.store.save(&self.cards)?;
        self.store.save_stats(&self.state.stats)?;
        self.dirty = false;
        Ok(())
    }

    fn changed(&mut self) -> Result<()> {
        self.dirty = true;
        if !self.settings().auto_save {
            return Ok(());
        }
        self.save().map_err(|e| {
            warn!("Auto-save failed, changes kept in memory: {}", e);
            e
        })
    }

    fn position(&self, card_id: &str) -> Result<usize> {
        self.cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or_else(|| Error::MissingCard(card_id.to_string()))
    }
}
