use std::fs;

use chrono::{DateTime, Duration, Local, TimeZone};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use studycards::storage::{CardStore, JsonStore, SessionStore};
use studycards::sm2::MAX_INTERVAL_DAYS;
use studycards::{Card, CardDraft, Clock, Error, FixedClock, Session, Settings};

fn start() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap()
}

fn create_test_store() -> (JsonStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonStore::new(temp_dir.path().join("data")).unwrap();
    (store, temp_dir)
}

fn open<'a>(store: &'a JsonStore, clock: &'a FixedClock) -> Session<&'a JsonStore, &'a FixedClock, StdRng> {
    Session::open(store, clock, StdRng::seed_from_u64(11)).unwrap()
}

#[test]
fn good_answers_grow_the_interval_across_runs() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());

    let id = {
        let mut session = open(&store, &clock);
        session
            .add_card(CardDraft {
                question: "What does SM-2 stand for?".into(),
                answer: "SuperMemo 2".into(),
                ..Default::default()
            })
            .unwrap()
            .id
            .clone()
    };

    for (step, expected) in [(0, 1.0), (1, 3.0), (3, 7.5)] {
        clock.advance(Duration::days(step));
        let mut session = open(&store, &clock);

        let next = session.next_card().unwrap().id.clone();
        assert_eq!(next, id);
        let outcome = session.grade_current(3).unwrap();
        assert_eq!(outcome.card.interval, Some(expected));
        assert_eq!(outcome.card.ease_factor, Some(2.5));
    }

    let stored = store.load().unwrap();
    assert_eq!(stored[0].repetitions, 3);
    assert_eq!(stored[0].interval, Some(7.5));
    assert_eq!(stored[0].last_review, Some(clock.now()));
    assert_eq!(
        stored[0].next_review,
        Some(clock.now() + Duration::hours(180))
    );

    // Nothing else is due until the next review comes around.
    let mut session = open(&store, &clock);
    assert!(session.next_card().is_none());
    clock.advance(Duration::hours(180));
    assert!(session.next_card().is_some());
}

#[test]
fn again_resets_a_mature_card() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());

    let mut card = Card::new("Capital of Peru?".into(), "Lima".into(), start() - Duration::days(60));
    card.ease_factor = Some(2.0);
    card.repetitions = 5;
    card.interval = Some(20.0);
    card.last_review = Some(start() - Duration::days(21));
    card.next_review = Some(start() - Duration::days(1));
    store.save(&[card.clone()]).unwrap();

    let mut session = open(&store, &clock);
    let outcome = session.grade(&card.id, 1).unwrap();
    assert_eq!(outcome.card.repetitions, 0);
    assert_eq!(outcome.card.interval, Some(1.0));
    assert_eq!(outcome.card.ease_factor, Some(2.0));
    assert_eq!(session.stats().streak, 0);

    assert_eq!(store.load().unwrap()[0], outcome.card);
}

#[test]
fn struggling_card_is_due_and_flagged() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());

    let mut hard = Card::new("Irregular verb: ir".into(), "voy, vas, va".into(), start() - Duration::days(30));
    hard.ease_factor = Some(1.35);
    hard.repetitions = 3;
    hard.interval = Some(1.0);
    hard.last_review = Some(start() - Duration::days(2));
    hard.next_review = Some(start() - Duration::days(1));

    let mut fine = Card::new("Hola".into(), "Hello".into(), start() - Duration::days(30));
    fine.repetitions = 6;
    fine.interval = Some(40.0);
    fine.last_review = Some(start() - Duration::days(5));
    fine.next_review = Some(start() + Duration::days(35));

    store.save(&[fine, hard.clone()]).unwrap();

    let mut session = open(&store, &clock);
    assert_eq!(session.deck_stats().due_cards, 1);
    assert_eq!(session.next_card().unwrap().id, hard.id);

    let difficult = session.difficult_cards();
    assert_eq!(difficult.len(), 1);
    assert_eq!(difficult[0].id, hard.id);
    assert_eq!(difficult[0].difficulty_score, Some(7.7));

    // Analysis does not write scores back to the collection.
    assert!(store.load().unwrap().iter().all(|c| c.difficulty_score.is_none()));
}

#[test]
fn counters_persist_and_reset_the_next_day() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());
    store
        .save(&[
            Card::new("one".into(), "1".into(), start()),
            Card::new("two".into(), "2".into(), start()),
        ])
        .unwrap();

    {
        let mut session = open(&store, &clock);
        while let Some(id) = session.next_card().map(|c| c.id.clone()) {
            session.grade(&id, 4).unwrap();
        }
    }

    let stats = store.load_stats().unwrap();
    assert_eq!((stats.studied_today, stats.correct_today, stats.streak), (2, 2, 2));

    clock.advance(Duration::hours(3));
    assert_eq!(open(&store, &clock).stats().studied_today, 2);

    clock.advance(Duration::days(1));
    let session = open(&store, &clock);
    let stats = session.stats();
    assert_eq!((stats.studied_today, stats.correct_today), (0, 0));
    assert_eq!((stats.total_studied, stats.total_correct, stats.streak), (2, 2, 2));
}

#[test]
fn manual_save_mode_writes_only_on_request() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());
    let card = Card::new("Q".into(), "A".into(), start());
    store.save(&[card.clone()]).unwrap();

    {
        let mut session = open(&store, &clock);
        let mut settings = session.settings().clone();
        settings.auto_save = false;
        session.update_settings(settings).unwrap();
    }
    assert!(!store.load_settings().unwrap().auto_save);

    {
        let mut session = open(&store, &clock);
        session.grade(&card.id, 3).unwrap();
        assert!(session.has_unsaved_changes());
    }
    assert_eq!(store.load().unwrap()[0].repetitions, 0);

    let mut session = open(&store, &clock);
    session.grade(&card.id, 3).unwrap();
    session.save().unwrap();
    assert_eq!(store.load().unwrap()[0].repetitions, 1);
    assert_eq!(store.load_stats().unwrap().total_studied, 1);
}

#[test]
fn unreadable_collection_blocks_opening_until_recovered() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());
    fs::write(store.cards_path(), "[{\"id\": ").unwrap();

    let result = Session::open(&store, &clock, StdRng::seed_from_u64(1));
    assert!(matches!(result, Err(Error::CorruptPersistedState { .. })));

    let moved = store.quarantine_corrupt().unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(fs::read_to_string(&moved[0]).unwrap(), "[{\"id\": ");

    let session = open(&store, &clock);
    assert!(session.cards().is_empty());
    assert_eq!(session.settings(), &Settings::default());
}

#[test]
fn long_easy_streak_stays_loadable() {
    let (store, _temp) = create_test_store();
    let clock = FixedClock::new(start());
    let mut card = Card::new("Q".into(), "A".into(), start());
    card.ease_factor = Some(3.0);
    store.save(&[card.clone()]).unwrap();

    let mut session = open(&store, &clock);
    for _ in 0..20 {
        session.grade(&card.id, 4).unwrap();
        clock.advance(Duration::days(1));
    }

    let stored = store.load().unwrap();
    assert_eq!(stored[0].interval, Some(MAX_INTERVAL_DAYS));
    assert_eq!(stored[0], session.cards()[0]);

    let reopened = open(&store, &clock);
    assert_eq!(reopened.cards(), session.cards());
}
