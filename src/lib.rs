//! Spaced repetition scheduling and review selection for a single learner's
//! flashcards, built around the SM-2 algorithm.

pub mod clock;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod generator;
pub mod models;
pub mod queue;
pub mod session;
pub mod settings;
pub mod sm2;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use models::{Card, CardDraft, CardEdit, CardFilter, CardSort, DeckStats, Grade};
pub use session::{Session, SessionState, StudyStats};
pub use settings::Settings;
pub use sm2::Scheduler;
pub use storage::{CardStore, JsonStore, SessionStore};
