//! Storage for the card collection, scheduling settings and study stats.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Card;
use crate::session::StudyStats;
use crate::settings::Settings;

const CARDS_FILE: &str = "cards.json";
const SETTINGS_FILE: &str = "settings.json";
const STATS_FILE: &str = "stats.json";

/// Durable home of the card collection. The whole collection is read and
/// written as one unit.
pub trait CardStore {
    fn load(&self) -> Result<Vec<Card>>;
    fn save(&self, cards: &[Card]) -> Result<()>;
}

/// Durable home of per-learner settings and counters.
pub trait SessionStore {
    fn load_settings(&self) -> Result<Settings>;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
    fn load_stats(&self) -> Result<StudyStats>;
    fn save_stats(&self, stats: &StudyStats) -> Result<()>;
}

impl<T: CardStore + ?Sized> CardStore for &T {
    fn load(&self) -> Result<Vec<Card>> {
        (**self).load()
    }

    fn save(&self, cards: &[Card]) -> Result<()> {
        (**self).save(cards)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load_settings(&self) -> Result<Settings> {
        (**self).load_settings()
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        (**self).save_settings(settings)
    }

    fn load_stats(&self) -> Result<StudyStats> {
        (**self).load_stats()
    }

    fn save_stats(&self, stats: &StudyStats) -> Result<()> {
        (**self).save_stats(stats)
    }
}

/// JSON files in a data directory.
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).map_err(|e| Error::io(&data_dir, e))?;
        Ok(Self { data_dir })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studycards")
    }

    pub fn cards_path(&self) -> PathBuf {
        self.data_dir.join(CARDS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join(STATS_FILE)
    }

    /// Move unreadable cards, settings or stats files out of the way so the
    /// store starts over with defaults for them. Settings that parse but fail
    /// validation count as unreadable. Returns where each moved file went;
    /// empty when everything loads.
    pub fn quarantine_corrupt(&self) -> Result<Vec<PathBuf>> {
        let mut moved = Vec::new();

        if let Some(err) = unreadable(self.load())? {
            moved.push(self.set_aside(&self.cards_path(), CARDS_FILE, &err)?);
        }
        if let Some(err) = unreadable(self.load_settings())? {
            moved.push(self.set_aside(&self.settings_path(), SETTINGS_FILE, &err)?);
        }
        if let Some(err) = unreadable(self.load_stats())? {
            moved.push(self.set_aside(&self.stats_path(), STATS_FILE, &err)?);
        }

        Ok(moved)
    }

    fn set_aside(&self, path: &Path, name: &str, reason: &Error) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let target = self.data_dir.join(format!("{}.corrupt-{}", name, stamp));
        fs::rename(path, &target).map_err(|e| Error::io(path, e))?;
        warn!("{}; moved it to {:?} and starting from defaults", reason, target);
        Ok(target)
    }
}

impl CardStore for JsonStore {
    fn load(&self) -> Result<Vec<Card>> {
        let cards = read_json::<Vec<Card>>(&self.cards_path())?.unwrap_or_default();
        debug!("Loaded {} cards from {:?}", cards.len(), self.cards_path());
        Ok(cards)
    }

    fn save(&self, cards: &[Card]) -> Result<()> {
        let path = self.cards_path();
        // Refuse to replace a collection we can no longer read back.
        read_json::<Vec<Card>>(&path)?;
        write_json_atomic(&path, &cards)?;
        debug!("Saved {} cards to {:?}", cards.len(), path);
        Ok(())
    }
}

impl SessionStore for JsonStore {
    fn load_settings(&self) -> Result<Settings> {
        let settings = read_json::<Settings>(&self.settings_path())?.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        write_json_atomic(&self.settings_path(), settings)
    }

    fn load_stats(&self) -> Result<StudyStats> {
        Ok(read_json::<StudyStats>(&self.stats_path())?.unwrap_or_default())
    }

    fn save_stats(&self, stats: &StudyStats) -> Result<()> {
        write_json_atomic(&self.stats_path(), stats)
    }
}

/// Turn a load result into the error that makes the file unusable, if any.
/// I/O failures are passed through since moving the file would not help.
fn unreadable<T>(loaded: Result<T>) -> Result<Option<Error>> {
    match loaded {
        Ok(_) => Ok(None),
        Err(err @ (Error::CorruptPersistedState { .. } | Error::InvalidSettings(_))) => Ok(Some(err)),
        Err(err) => Err(err),
    }
}

/// Read a JSON file. A missing file is `None`, an unparsable one an error.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let value = serde_json::from_str(&json).map_err(|e| Error::corrupt(path, e))?;
    Ok(Some(value))
}

/// Write pretty JSON to a temporary sibling, then rename it over `path`.
/// The temporary file is removed if anything before the rename fails.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| Error::io(path, e.into()))?;
    let tmp_path = path.with_extension("json.tmp");

    let written = write_synced(&tmp_path, &json).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            debug!("Could not remove {:?}: {}", tmp_path, cleanup);
        }
        return Err(Error::io(path, e));
    }

    sync_parent(path);
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    let Some(parent) = path.parent() else { return };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        warn!("Could not sync directory {:?}: {}", parent, e);
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

/// Backup format containing the full card collection.
#[derive(Debug, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    #[serde(with = "crate::models::timestamp::required")]
    pub created_at: DateTime<Local>,
    pub cards: Vec<Card>,
}

/// Export all cards to a backup file. Returns the number of cards written.
pub fn export_backup<S: CardStore + ?Sized>(store: &S, path: &Path) -> Result<usize> {
    let backup = Backup {
        version: 1,
        created_at: Local::now(),
        cards: store.load()?,
    };

    write_json_atomic(path, &backup)?;
    Ok(backup.cards.len())
}

/// Import cards from a backup file, skipping ids the store already has.
/// Returns (imported_count, skipped_count).
pub fn import_backup<S: CardStore + ?Sized>(store: &S, path: &Path) -> Result<(usize, usize)> {
    let backup = read_json::<Backup>(path)?.ok_or_else(|| {
        Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "backup file not found"),
        )
    })?;

    let mut cards = store.load()?;
    let existing_ids: std::collections::HashSet<String> =
        cards.iter().map(|c| c.id.clone()).collect();

    let mut imported = 0;
    let mut skipped = 0;

    for card in backup.cards {
        if existing_ids.contains(&card.id) {
            skipped += 1;
        } else {
            cards.push(card);
            imported += 1;
        }
    }

    if imported > 0 {
        store.save(&cards)?;
    }
    Ok((imported, skipped))
}

/// Get default backup path.
pub fn default_backup_path() -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("studycards_backup_{}.json", timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn create_test_store() -> (JsonStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonStore::new(temp_dir.path().join("data")).unwrap();
        (store, temp_dir)
    }

    fn sample_cards() -> Vec<Card> {
        let now = Local.with_ymd_and_hms(2024, 3, 12, 12, 0, 0).unwrap();
        let fresh = Card::new("What is SM-2?".into(), "A scheduling algorithm".into(), now);
        let mut reviewed = Card::new("Capital of Peru?".into(), "Lima".into(), now);
        reviewed.tags.insert("geo".into());
        reviewed.interval = Some(7.5);
        reviewed.repetitions = 3;
        reviewed.last_review = Some(now);
        reviewed.next_review = Some(now + Duration::hours(180));
        vec![fresh, reviewed]
    }

    #[test]
    fn empty_store_loads_nothing() {
        let (store, _temp) = create_test_store();
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.load_settings().unwrap(), Settings::default());
        assert_eq!(store.load_stats().unwrap(), StudyStats::default());
    }

    #[test]
    fn save_then_load_gives_equal_cards() {
        let (store, _temp) = create_test_store();
        let cards = sample_cards();

        store.save(&cards).unwrap();
        assert_eq!(store.load().unwrap(), cards);
        assert!(!store.cards_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_never_overwritten() {
        let (store, _temp) = create_test_store();
        fs::write(store.cards_path(), "[{\"id\": \"a\", \"question\": ").unwrap();

        assert!(matches!(store.load(), Err(Error::CorruptPersistedState { .. })));
        assert!(matches!(
            store.save(&sample_cards()),
            Err(Error::CorruptPersistedState { .. })
        ));
        assert_eq!(
            fs::read_to_string(store.cards_path()).unwrap(),
            "[{\"id\": \"a\", \"question\": "
        );
    }

    #[test]
    fn quarantine_allows_starting_over() {
        let (store, _temp) = create_test_store();
        fs::write(store.cards_path(), "not json").unwrap();

        let moved = store.quarantine_corrupt().unwrap();
        assert_eq!(moved.len(), 1);
        assert!(moved[0].exists());
        assert!(store.load().unwrap().is_empty());

        store.save(&sample_cards()).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
        assert!(store.quarantine_corrupt().unwrap().is_empty());
    }

    #[test]
    fn quarantine_covers_settings_and_stats() {
        let (store, _temp) = create_test_store();
        store.save(&sample_cards()).unwrap();
        fs::write(store.settings_path(), r#"{"new_cards_per_day": 0}"#).unwrap();
        fs::write(store.stats_path(), "{\"streak\": ").unwrap();
        assert!(store.load_settings().is_err());
        assert!(store.load_stats().is_err());

        let moved = store.quarantine_corrupt().unwrap();
        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|path| path.exists()));

        assert_eq!(store.load().unwrap().len(), 2);
        assert_eq!(store.load_settings().unwrap(), Settings::default());
        assert_eq!(store.load_stats().unwrap(), StudyStats::default());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let (store, _temp) = create_test_store();
        // A directory in the way makes the final rename fail.
        fs::create_dir(store.cards_path()).unwrap();

        assert!(matches!(
            write_json_atomic(&store.cards_path(), &sample_cards()),
            Err(Error::PersistenceIo { .. })
        ));
        assert!(!store.cards_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn invalid_settings_file_is_rejected() {
        let (store, _temp) = create_test_store();
        fs::write(store.settings_path(), r#"{"interval_modifier": -1.0}"#).unwrap();
        assert!(matches!(store.load_settings(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn backup_import_skips_known_cards() {
        let (store, temp) = create_test_store();
        let cards = sample_cards();
        store.save(&cards[..1]).unwrap();

        let backup_path = temp.path().join("backup.json");
        let other = JsonStore::new(temp.path().join("other")).unwrap();
        other.save(&cards).unwrap();
        assert_eq!(export_backup(&other, &backup_path).unwrap(), 2);

        let (imported, skipped) = import_backup(&store, &backup_path).unwrap();
        assert_eq!((imported, skipped), (1, 1));
        assert_eq!(store.load().unwrap(), cards);
    }
}
