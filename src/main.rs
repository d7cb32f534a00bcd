//! cards - spaced repetition flashcards on the command line
//!
//! Study with SM-2 scheduling, find struggling cards, manage the collection.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use unicode_width::UnicodeWidthChar;

use studycards::config::Config;
use studycards::difficulty;
use studycards::generator::{DifficultyLevel, GeneratedCard, GenerationRequest, Strategy};
use studycards::sm2::format_interval;
use studycards::storage::{self, JsonStore, SessionStore};
use studycards::{
    Card, CardDraft, CardEdit, CardFilter, CardSort, Error, Grade, Session, Settings, SystemClock,
};

type CliSession<'a> = Session<&'a JsonStore, SystemClock, StdRng>;

const PREVIEW_WIDTH: usize = 50;
const WRAP_WIDTH: usize = 72;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "cards")]
#[command(author, version, about = "SM-2 spaced repetition flashcards", long_about = None)]
struct Args {
    /// Directory containing cards, settings and stats
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Seed for card selection, for reproducible draws
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Study due cards interactively
    Study,

    /// Show the next card without grading it
    Next {
        /// Also print the answer
        #[arg(long)]
        answer: bool,
    },

    /// Grade a card: 1 again, 2 hard, 3 good, 4 easy
    Grade { id: String, grade: u8 },

    /// Create a card
    Add {
        question: String,
        answer: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// List cards
    List {
        /// all, due, new or reviewed
        #[arg(long, default_value = "all")]
        filter: CardFilter,
        /// newest, oldest or next-review
        #[arg(long, default_value = "newest")]
        sort: CardSort,
    },

    /// Show one card in full
    Show { id: String },

    /// Change a card's content
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        question: Option<String>,
        #[arg(long)]
        answer: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        /// Comma-separated tags, replaces the existing ones
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Delete a card
    Delete { id: String },

    /// List struggling cards as JSON, hardest first
    Analyze {
        /// Analyze a JSON card list instead of the collection
        #[arg(long)]
        input: Option<PathBuf>,
        /// Print a card generation request instead of the cards
        #[arg(long)]
        request: bool,
        /// Number of cards to ask for
        #[arg(long, default_value_t = 3)]
        count: u32,
        /// easy, medium or hard
        #[arg(long, default_value = "medium")]
        level: DifficultyLevel,
        /// related, breakdown or alternative
        #[arg(long, default_value = "related")]
        strategy: Strategy,
    },

    /// Add generated cards from a JSON file
    ImportGenerated { file: PathBuf },

    /// Show study statistics
    Stats,

    /// Show or change scheduling settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Export all cards to a backup file
    Export { path: Option<PathBuf> },

    /// Import cards from a backup file
    Import { path: PathBuf },

    /// Move an unreadable cards file aside and start with an empty collection
    Recover,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set { key: String, value: String },
    Reset,
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().unwrap_or_else(|err| {
        eprintln!("Warning: {:#}, using default config", err);
        Config::default()
    });
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    let data_dir = args.data_dir.unwrap_or(config.data_dir);
    let store = JsonStore::new(data_dir).context("Failed to open data directory")?;

    match args.command {
        Command::Recover => return recover(&store),
        Command::Settings(SettingsCommand::Reset) => return reset_settings(&store),
        _ => {}
    }

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut session = Session::open(&store, SystemClock, rng).map_err(|err| match err {
        Error::CorruptPersistedState { .. } => anyhow::Error::new(err)
            .context("Study data is unreadable; run `cards recover` to set the broken file aside"),
        Error::InvalidSettings(_) => anyhow::Error::new(err)
            .context("Settings are invalid; run `cards settings reset` to restore the defaults"),
        other => anyhow::Error::new(other).context("Failed to load study data"),
    })?;

    let result = run(&mut session, args.command);

    // Without auto-save, changes are written once per command.
    if session.has_unsaved_changes() {
        session.save().context("Failed to save changes")?;
    }

    result
}

fn run(session: &mut CliSession<'_>, command: Command) -> Result<()> {
    match command {
        Command::Study => study(session),
        Command::Next { answer } => next(session, answer),
        Command::Grade { id, grade } => {
            let outcome = session.grade(&id, grade)?;
            println!(
                "✓ {} - next review in {}",
                outcome.grade,
                format_interval(outcome.card.interval.unwrap_or_default())
            );
            Ok(())
        }
        Command::Add {
            question,
            answer,
            title,
            image_url,
            tags,
        } => {
            let card = session.add_card(CardDraft {
                title: title.unwrap_or_default(),
                question,
                answer,
                image_url: image_url.unwrap_or_default(),
                tags: tags.into_iter().collect(),
            })?;
            println!("✓ Created card {}", card.id);
            Ok(())
        }
        Command::List { filter, sort } => {
            let cards = session.browse(filter, sort);
            if cards.is_empty() {
                println!("No cards match the selected filter.");
                return Ok(());
            }
            println!("Showing {} cards", cards.len());
            for card in cards {
                println!("{}  {}  {}", card.id, review_label(card), preview(card.label(), PREVIEW_WIDTH));
            }
            Ok(())
        }
        Command::Show { id } => {
            let card = session
                .card(&id)
                .ok_or_else(|| Error::MissingCard(id.clone()))?;
            print_card(card, true);
            println!();
            println!("Ease factor: {:.2}", card.ease_or(session.settings().ease_factor_default));
            println!("Repetitions: {}", card.repetitions);
            println!("Difficulty:  {:.1}/10", difficulty::score(card));
            println!("Next review: {}", review_label(card));
            Ok(())
        }
        Command::Edit {
            id,
            title,
            question,
            answer,
            image_url,
            tags,
        } => {
            session.edit_card(
                &id,
                CardEdit {
                    title,
                    question,
                    answer,
                    image_url,
                    tags: tags.map(|tags| tags.into_iter().collect()),
                },
            )?;
            println!("✓ Updated card {}", id);
            Ok(())
        }
        Command::Delete { id } => {
            let card = session.delete_card(&id)?;
            println!("✓ Deleted '{}'", preview(card.label(), PREVIEW_WIDTH));
            Ok(())
        }
        Command::Analyze {
            input,
            request,
            count,
            level,
            strategy,
        } => {
            let difficult = match input {
                Some(path) => {
                    let json = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    let cards: Vec<Card> = serde_json::from_str(&json)
                        .with_context(|| format!("Failed to parse cards in {:?}", path))?;
                    difficulty::find_difficult(&cards)
                }
                None => session.difficult_cards(),
            };

            let output = if request {
                let request = GenerationRequest::from_difficult(&difficult, count, level, strategy);
                serde_json::to_string_pretty(&request)?
            } else {
                serde_json::to_string_pretty(&difficult)?
            };
            println!("{}", output);
            Ok(())
        }
        Command::ImportGenerated { file } => {
            let json = fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let generated: Vec<GeneratedCard> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse generated cards in {:?}", file))?;
            let added = session.import_generated(generated)?;
            println!("✓ Added {} generated cards", added);
            Ok(())
        }
        Command::Stats => {
            print_stats(session);
            Ok(())
        }
        Command::Settings(cmd) => settings(session, cmd),
        Command::Export { path } => {
            let path = path.unwrap_or_else(storage::default_backup_path);
            let count = storage::export_backup(session.store(), &path)?;
            println!("✓ Exported {} cards to {}", count, path.display());
            Ok(())
        }
        Command::Import { path } => {
            if session.has_unsaved_changes() {
                session.save()?;
            }
            let (imported, skipped) = storage::import_backup(session.store(), &path)?;
            println!("✓ Imported {} cards ({} already present)", imported, skipped);
            Ok(())
        }
        Command::Recover => recover(session.store()),
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Commands
// ══════════════════════════════════════════════════════════════════════════

fn study(session: &mut CliSession<'_>) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut studied = 0;

    'cards: loop {
        let Some(card) = session.next_card() else {
            println!("🎉 All caught up! No cards due for review.");
            break;
        };
        print_card(card, false);

        if prompt(&mut lines, "\nPress Enter to show the answer (q to quit) ")?.as_deref() == Some("q") {
            break;
        }
        session.show_answer();
        if let Some(card) = session.current_card() {
            println!();
            print_wrapped("Answer", &card.answer);
        }
        if let Some(preview) = session.preview_intervals() {
            let options: Vec<String> = preview
                .iter()
                .enumerate()
                .map(|(i, (grade, interval))| format!("{} {} ({})", i + 1, grade, interval))
                .collect();
            println!("\n{}", options.join("   "));
        }

        loop {
            let Some(input) = prompt(&mut lines, "Grade [1-4] (q to quit): ")? else {
                break 'cards;
            };
            if input == "q" {
                break 'cards;
            }
            let Some(grade) = parse_grade(&input) else {
                println!("Please enter a number from 1 to 4.");
                continue;
            };

            match session.grade_current(grade as u8) {
                Ok(outcome) => {
                    studied += 1;
                    println!(
                        "✓ {} - next review in {}\n",
                        outcome.grade,
                        format_interval(outcome.card.interval.unwrap_or_default())
                    );
                    break;
                }
                Err(err @ Error::PersistenceIo { .. }) => {
                    warn!("{}", err);
                    eprintln!("Warning: progress not saved yet ({}), will retry", err);
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    let stats = session.stats();
    println!(
        "Studied {} cards this session, {} today ({}% correct), streak {}",
        studied,
        stats.studied_today,
        stats.success_rate_today(),
        stats.streak
    );
    Ok(())
}

fn next(session: &mut CliSession<'_>, show_answer: bool) -> Result<()> {
    let Some(card) = session.next_card() else {
        println!("🎉 All caught up! No cards due for review.");
        return Ok(());
    };
    println!("{}", card.id);
    print_card(card, show_answer);

    if let Some(preview) = session.preview_intervals() {
        println!();
        for (grade, interval) in preview {
            println!("  {} {:<5} {}", grade as u8, grade.name(), interval);
        }
    }
    Ok(())
}

fn settings(session: &mut CliSession<'_>, cmd: SettingsCommand) -> Result<()> {
    match cmd {
        SettingsCommand::Show => {}
        SettingsCommand::Set { key, value } => {
            let mut updated = session.settings().clone();
            updated.set(&key, &value)?;
            session.update_settings(updated)?;
            println!("✓ Settings saved");
        }
        SettingsCommand::Reset => {
            session.reset_settings()?;
            println!("✓ Settings reset to defaults");
        }
    }
    println!("{}", serde_json::to_string_pretty(session.settings())?);
    Ok(())
}

fn recover(store: &JsonStore) -> Result<()> {
    let moved = store.quarantine_corrupt()?;
    if moved.is_empty() {
        println!("Study data is readable, nothing to recover");
    }
    for path in moved {
        println!("✓ Moved unreadable file to {}; starting over with defaults", path.display());
    }
    Ok(())
}

/// Write default settings without opening a session, so a broken settings
/// file can always be replaced.
fn reset_settings(store: &JsonStore) -> Result<()> {
    let settings = Settings::default();
    store
        .save_settings(&settings)
        .context("Failed to write default settings")?;
    println!("✓ Settings reset to defaults");
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════
// Output helpers
// ══════════════════════════════════════════════════════════════════════════

fn print_card(card: &Card, show_answer: bool) {
    if !card.title.is_empty() {
        println!("── {} ──", card.title);
    }
    print_wrapped("Question", &card.question);
    if !card.image_url.is_empty() {
        println!("Image: {}", card.image_url);
    }
    if show_answer {
        print_wrapped("Answer", &card.answer);
    }
}

fn print_wrapped(label: &str, text: &str) {
    println!("{}:", label);
    for line in textwrap::wrap(text, WRAP_WIDTH) {
        println!("  {}", line);
    }
}

fn print_stats(session: &CliSession<'_>) {
    let deck = session.deck_stats();
    let stats = session.stats();

    println!("Summary");
    println!("  Total cards:     {}", deck.total_cards);
    println!("  Due now:         {}", deck.due_cards);
    println!("  New today:       {}", deck.new_cards);
    println!("  Reviewed:        {} ({} mature)", deck.reviewed_cards, deck.mature_cards);
    println!("  Current streak:  {}", stats.streak);
    println!("  Overall success: {}%", stats.success_rate_overall());
    println!();
    println!("Today's progress");
    println!("  Cards studied:   {}", stats.studied_today);
    println!("  Correct answers: {}", stats.correct_today);
    println!("  Today's success: {}%", stats.success_rate_today());
}

fn review_label(card: &Card) -> String {
    match card.next_review {
        None => "never reviewed".to_string(),
        Some(next) => next.format("%Y-%m-%d %H:%M").to_string(),
    }
}

/// A single key 1-4.
fn parse_grade(input: &str) -> Option<Grade> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Grade::from_key(key),
        _ => None,
    }
}

/// First line of `text`, cut to `width` display columns.
fn preview(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut out = String::new();
    let mut used = 0;

    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            out.push_str("...");
            return out;
        }
        used += w;
        out.push(c);
    }
    out
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_by_display_width() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
        assert_eq!(preview("日本語のテキスト", 6), "日本語...");
        assert_eq!(preview("first line\nsecond", 50), "first line");
    }

    #[test]
    fn study_prompt_accepts_single_grade_keys() {
        assert_eq!(parse_grade("1"), Some(Grade::Again));
        assert_eq!(parse_grade("4"), Some(Grade::Easy));
        assert_eq!(parse_grade("5"), None);
        assert_eq!(parse_grade("33"), None);
        assert_eq!(parse_grade(""), None);
    }

    #[test]
    fn settings_reset_repairs_an_invalid_file_without_a_session() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = JsonStore::new(temp.path().to_path_buf()).unwrap();
        fs::write(store.settings_path(), r#"{"new_cards_per_day": 0}"#).unwrap();
        assert!(Session::open(&store, SystemClock, StdRng::seed_from_u64(1)).is_err());

        reset_settings(&store).unwrap();
        let session = Session::open(&store, SystemClock, StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(session.settings(), &Settings::default());
    }

    #[test]
    fn cli_parses_grade_and_filters() {
        let args = Args::try_parse_from(["cards", "grade", "abc", "3"]).unwrap();
        assert!(matches!(args.command, Command::Grade { ref id, grade: 3 } if id == "abc"));

        let args = Args::try_parse_from(["cards", "list", "--filter", "due", "--sort", "next-review"]).unwrap();
        assert!(matches!(
            args.command,
            Command::List {
                filter: CardFilter::Due,
                sort: CardSort::NextReview
            }
        ));

        assert!(Args::try_parse_from(["cards", "list", "--filter", "someday"]).is_err());
    }
}
