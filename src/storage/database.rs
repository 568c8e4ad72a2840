//! SQLite database for persistent storage
//!
//! One connection per process, serialized behind a mutex. Schema is
//! created idempotently on open; history and saved-tab rows cascade
//! when their owning profile is deleted.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

use super::records::{HistoryRecord, Preferences, Profile, SavedTabRecord, TabType};

/// Errors from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite failure (I/O, constraint violation)
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// An operation referenced a profile that does not exist
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        info!("Opening database at {:?}", path);
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Create tables if they do not exist yet
    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS user_profile (
                 id               TEXT PRIMARY KEY,
                 name             TEXT NOT NULL,
                 created_at       TEXT NOT NULL,
                 preferences_json TEXT
             );

             CREATE TABLE IF NOT EXISTS recognition_history (
                 id                INTEGER PRIMARY KEY AUTOINCREMENT,
                 profile_id        TEXT NOT NULL
                     REFERENCES user_profile(id) ON DELETE CASCADE,
                 song_title        TEXT NOT NULL,
                 artist            TEXT,
                 artwork_url       TEXT,
                 recognized_at     TEXT NOT NULL,
                 provider_track_id TEXT,
                 notes             TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_history_profile
                 ON recognition_history(profile_id);

             CREATE TABLE IF NOT EXISTS saved_tab (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 profile_id  TEXT NOT NULL
                     REFERENCES user_profile(id) ON DELETE CASCADE,
                 song_title  TEXT NOT NULL,
                 artist      TEXT,
                 tab_url     TEXT NOT NULL,
                 tab_type    TEXT NOT NULL,
                 saved_at    TEXT NOT NULL,
                 notes       TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_saved_tab_profile
                 ON saved_tab(profile_id);",
        )?;
        debug!("Database schema ready");
        Ok(())
    }

    // --- Profiles ---

    /// Insert or update a profile by id
    pub fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_profile (id, name, created_at, preferences_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 preferences_json = excluded.preferences_json",
            params![
                profile.id,
                profile.name,
                profile.created_at,
                profile.preferences_json
            ],
        )?;
        debug!("Saved profile '{}'", profile.name);
        Ok(())
    }

    /// Fetch a profile by id
    pub fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                "SELECT id, name, created_at, preferences_json
                 FROM user_profile WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                        preferences_json: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// List all profiles, oldest first
    pub fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, preferences_json
             FROM user_profile ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Profile {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                preferences_json: row.get(3)?,
            })
        })?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    /// Delete a profile; history and saved tabs cascade
    pub fn delete_profile(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM user_profile WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::ProfileNotFound(id.to_string()));
        }
        info!("Deleted profile {} and its dependent records", id);
        Ok(())
    }

    // --- Recognition history ---

    /// Append a history record, returning it with the assigned id
    pub fn append_history(&self, mut record: HistoryRecord) -> StoreResult<HistoryRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO recognition_history
                 (profile_id, song_title, artist, artwork_url,
                  recognized_at, provider_track_id, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.profile_id,
                record.song_title,
                record.artist,
                record.artwork_url,
                record.recognized_at,
                record.provider_track_id,
                record.notes
            ],
        )?;
        record.id = Some(conn.last_insert_rowid());
        debug!(
            "Appended history for '{}' (id {:?})",
            record.song_title, record.id
        );
        Ok(record)
    }

    /// History for a profile, most recent first
    pub fn list_history(&self, profile_id: &str) -> StoreResult<Vec<HistoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, profile_id, song_title, artist, artwork_url,
                    recognized_at, provider_track_id, notes
             FROM recognition_history
             WHERE profile_id = ?1
             ORDER BY recognized_at DESC",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            Ok(HistoryRecord {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                song_title: row.get(2)?,
                artist: row.get(3)?,
                artwork_url: row.get(4)?,
                recognized_at: row.get(5)?,
                provider_track_id: row.get(6)?,
                notes: row.get(7)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Delete a single history entry
    pub fn delete_history(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM recognition_history WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete all history for a profile
    pub fn clear_history(&self, profile_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM recognition_history WHERE profile_id = ?1",
            params![profile_id],
        )?;
        info!(
            "Cleared {} history entries for profile {}",
            deleted, profile_id
        );
        Ok(deleted)
    }

    // --- Saved tabs ---

    /// Insert or update a saved tab, returning it with the assigned id.
    ///
    /// Uniqueness per (profile_id, tab_url) is the caller's contract:
    /// check `find_tab` before inserting a new bookmark.
    pub fn save_tab(&self, mut record: SavedTabRecord) -> StoreResult<SavedTabRecord> {
        let conn = self.conn.lock();
        match record.id {
            Some(id) => {
                conn.execute(
                    "UPDATE saved_tab SET
                         profile_id = ?1, song_title = ?2, artist = ?3,
                         tab_url = ?4, tab_type = ?5, saved_at = ?6, notes = ?7
                     WHERE id = ?8",
                    params![
                        record.profile_id,
                        record.song_title,
                        record.artist,
                        record.tab_url,
                        record.tab_type.as_str(),
                        record.saved_at,
                        record.notes,
                        id
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO saved_tab
                         (profile_id, song_title, artist, tab_url,
                          tab_type, saved_at, notes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.profile_id,
                        record.song_title,
                        record.artist,
                        record.tab_url,
                        record.tab_type.as_str(),
                        record.saved_at,
                        record.notes
                    ],
                )?;
                record.id = Some(conn.last_insert_rowid());
            }
        }
        debug!(
            "Saved {} tab for '{}' (id {:?})",
            record.tab_type, record.song_title, record.id
        );
        Ok(record)
    }

    /// Look up a bookmark by its (profile, url) key
    pub fn find_tab(&self, profile_id: &str, tab_url: &str) -> StoreResult<Option<SavedTabRecord>> {
        let conn = self.conn.lock();
        let tab = conn
            .query_row(
                "SELECT id, profile_id, song_title, artist, tab_url,
                        tab_type, saved_at, notes
                 FROM saved_tab
                 WHERE profile_id = ?1 AND tab_url = ?2",
                params![profile_id, tab_url],
                Self::row_to_tab,
            )
            .optional()?;
        Ok(tab)
    }

    /// Saved tabs for a profile, most recent first
    pub fn list_tabs(&self, profile_id: &str) -> StoreResult<Vec<SavedTabRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, profile_id, song_title, artist, tab_url,
                    tab_type, saved_at, notes
             FROM saved_tab
             WHERE profile_id = ?1
             ORDER BY saved_at DESC",
        )?;
        let rows = stmt.query_map(params![profile_id], Self::row_to_tab)?;
        let mut tabs = Vec::new();
        for row in rows {
            tabs.push(row?);
        }
        Ok(tabs)
    }

    /// Delete a single bookmark
    pub fn delete_tab(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM saved_tab WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete all bookmarks for a profile
    pub fn clear_tabs(&self, profile_id: &str) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM saved_tab WHERE profile_id = ?1",
            params![profile_id],
        )?;
        info!("Cleared {} saved tabs for profile {}", deleted, profile_id);
        Ok(deleted)
    }

    fn row_to_tab(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedTabRecord> {
        let tab_type: String = row.get(5)?;
        Ok(SavedTabRecord {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            song_title: row.get(2)?,
            artist: row.get(3)?,
            tab_url: row.get(4)?,
            // Unknown values would mean schema drift; treat as guitar
            tab_type: TabType::parse(&tab_type).unwrap_or(TabType::Guitar),
            saved_at: row.get(6)?,
            notes: row.get(7)?,
        })
    }

    // --- Preferences ---

    /// Decode a profile's preferences, falling back to defaults when the
    /// stored document is missing or unreadable
    pub fn preferences(&self, profile_id: &str) -> StoreResult<Preferences> {
        let profile = self
            .get_profile(profile_id)?
            .ok_or_else(|| StoreError::ProfileNotFound(profile_id.to_string()))?;

        match profile.preferences_json {
            Some(json) => match serde_json::from_str(&json) {
                Ok(prefs) => Ok(prefs),
                Err(e) => {
                    warn!(
                        "Unreadable preferences for profile {}: {}; using defaults",
                        profile_id, e
                    );
                    Ok(Preferences::default())
                }
            },
            None => Ok(Preferences::default()),
        }
    }

    /// Replace a profile's preferences document
    pub fn set_preferences(&self, profile_id: &str, prefs: &Preferences) -> StoreResult<()> {
        let mut profile = self
            .get_profile(profile_id)?
            .ok_or_else(|| StoreError::ProfileNotFound(profile_id.to_string()))?;

        // A closed struct of plain fields; serialization cannot fail
        let json = serde_json::to_string(prefs).expect("preferences serialize to JSON");
        profile.preferences_json = Some(json);
        self.upsert_profile(&profile)?;
        debug!("Updated preferences for profile {}", profile_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn db_with_profile() -> (Database, Profile) {
        let db = Database::open_in_memory().unwrap();
        let profile = Profile::new("Test User");
        db.upsert_profile(&profile).unwrap();
        (db, profile)
    }

    #[test]
    fn test_open_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabscout.sqlite");
        let db = Database::open(&path).unwrap();
        assert!(db.list_profiles().unwrap().is_empty());

        // Re-opening must not fail on the existing schema
        drop(db);
        let db = Database::open(&path).unwrap();
        assert!(db.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_profile_upsert_and_get() {
        let (db, profile) = db_with_profile();

        let fetched = db.get_profile(&profile.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Test User");

        let mut renamed = profile.clone();
        renamed.name = "Renamed".to_string();
        db.upsert_profile(&renamed).unwrap();

        assert_eq!(db.list_profiles().unwrap().len(), 1);
        assert_eq!(db.get_profile(&profile.id).unwrap().unwrap().name, "Renamed");
    }

    #[test]
    fn test_get_missing_profile_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_profile("nope").unwrap().is_none());
    }

    #[test]
    fn test_append_history_assigns_id() {
        let (db, profile) = db_with_profile();
        let record = HistoryRecord::new(&profile.id, "Blackbird");
        let saved = db.append_history(record).unwrap();
        assert!(saved.id.is_some());
    }

    #[test]
    fn test_history_ordered_most_recent_first() {
        let (db, profile) = db_with_profile();
        let base = Utc::now();
        for (i, title) in ["first", "second", "third"].iter().enumerate() {
            let mut record = HistoryRecord::new(&profile.id, *title);
            record.recognized_at = base + Duration::seconds(i as i64);
            db.append_history(record).unwrap();
        }

        let history = db.list_history(&profile.id).unwrap();
        let titles: Vec<_> = history.iter().map(|r| r.song_title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_delete_and_clear_history() {
        let (db, profile) = db_with_profile();
        let a = db
            .append_history(HistoryRecord::new(&profile.id, "A"))
            .unwrap();
        db.append_history(HistoryRecord::new(&profile.id, "B"))
            .unwrap();

        db.delete_history(a.id.unwrap()).unwrap();
        assert_eq!(db.list_history(&profile.id).unwrap().len(), 1);

        assert_eq!(db.clear_history(&profile.id).unwrap(), 1);
        assert!(db.list_history(&profile.id).unwrap().is_empty());
    }

    #[test]
    fn test_history_requires_existing_profile() {
        let db = Database::open_in_memory().unwrap();
        let result = db.append_history(HistoryRecord::new("ghost", "Song"));
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_save_and_find_tab() {
        let (db, profile) = db_with_profile();
        let tab =
            SavedTabRecord::new(&profile.id, "Blackbird", "https://example.com/t", TabType::Guitar);
        let saved = db.save_tab(tab).unwrap();
        assert!(saved.id.is_some());

        let found = db
            .find_tab(&profile.id, "https://example.com/t")
            .unwrap()
            .unwrap();
        assert_eq!(found.tab_type, TabType::Guitar);
        assert!(db.find_tab(&profile.id, "https://other").unwrap().is_none());
    }

    #[test]
    fn test_save_tab_with_id_updates_in_place() {
        let (db, profile) = db_with_profile();
        let saved = db
            .save_tab(SavedTabRecord::new(
                &profile.id,
                "Blackbird",
                "https://example.com/t",
                TabType::Guitar,
            ))
            .unwrap();

        let mut updated = saved.clone();
        updated.notes = Some("capo 3".to_string());
        db.save_tab(updated).unwrap();

        let tabs = db.list_tabs(&profile.id).unwrap();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].notes.as_deref(), Some("capo 3"));
    }

    #[test]
    fn test_tabs_ordered_most_recent_first() {
        let (db, profile) = db_with_profile();
        let base = Utc::now();
        for (i, url) in ["https://a", "https://b"].iter().enumerate() {
            let mut tab = SavedTabRecord::new(&profile.id, "Song", *url, TabType::Piano);
            tab.saved_at = base + Duration::seconds(i as i64);
            db.save_tab(tab).unwrap();
        }

        let tabs = db.list_tabs(&profile.id).unwrap();
        assert_eq!(tabs[0].tab_url, "https://b");
        assert_eq!(tabs[1].tab_url, "https://a");
    }

    #[test]
    fn test_delete_profile_cascades() {
        let (db, profile) = db_with_profile();
        db.append_history(HistoryRecord::new(&profile.id, "Song"))
            .unwrap();
        db.save_tab(SavedTabRecord::new(
            &profile.id,
            "Song",
            "https://example.com/t",
            TabType::Guitar,
        ))
        .unwrap();

        db.delete_profile(&profile.id).unwrap();

        assert!(db.get_profile(&profile.id).unwrap().is_none());
        assert!(db.list_history(&profile.id).unwrap().is_empty());
        assert!(db.list_tabs(&profile.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_profile_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.delete_profile("ghost"),
            Err(StoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_preferences_roundtrip() {
        let (db, profile) = db_with_profile();
        let prefs = Preferences {
            default_tab_type: TabType::Piano,
            auto_save_history: false,
        };
        db.set_preferences(&profile.id, &prefs).unwrap();
        assert_eq!(db.preferences(&profile.id).unwrap(), prefs);
    }

    #[test]
    fn test_preferences_default_when_unset() {
        let (db, profile) = db_with_profile();
        assert_eq!(db.preferences(&profile.id).unwrap(), Preferences::default());
    }

    #[test]
    fn test_corrupt_preferences_fall_back_to_defaults() {
        let (db, mut profile) = db_with_profile();
        profile.preferences_json = Some("not json {{".to_string());
        db.upsert_profile(&profile).unwrap();

        // Decode failure degrades to defaults rather than erroring
        assert_eq!(db.preferences(&profile.id).unwrap(), Preferences::default());
    }

    #[test]
    fn test_set_preferences_missing_profile() {
        let db = Database::open_in_memory().unwrap();
        let result = db.set_preferences("ghost", &Preferences::default());
        assert!(matches!(result, Err(StoreError::ProfileNotFound(_))));
    }
}
