//! Snapshot persistence.
//!
//! [`SnapshotStore`] is the seam the coordinator saves through;
//! [`SqliteSnapshotStore`] is the bundled implementation. Each snapshot is
//! the whole [`Story`] plus any in-progress beat, serialised to JSON and
//! stored in one row:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS snapshots (
//!     story_id   TEXT    NOT NULL,
//!     scene      INTEGER NOT NULL,
//!     beat       INTEGER NOT NULL,
//!     round      INTEGER NOT NULL,
//!     data       BLOB    NOT NULL,
//!     saved_at   TEXT    NOT NULL,
//!     checksum   TEXT,
//!     PRIMARY KEY (story_id, scene, beat, round)
//! );
//! ```
//!
//! - WAL mode for concurrent reads while a story is running
//! - JSON inside a BLOB column keeps the schema stable as the model grows
//! - Optional CRC-32 checksum flags save corruption on load
//! - Rotating backups via SQLite's online-backup API

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::engine::TurnEngine;
use crate::error::{Result, TableauError};
use crate::story::{BeatSetup, Story};
use crate::types::StoryId;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS snapshots (
    story_id   TEXT    NOT NULL,
    scene      INTEGER NOT NULL,
    beat       INTEGER NOT NULL,
    round      INTEGER NOT NULL,
    data       BLOB    NOT NULL,
    saved_at   TEXT    NOT NULL,
    checksum   TEXT,
    PRIMARY KEY (story_id, scene, beat, round)
);";

// ---------------------------------------------------------------------------
// Snapshot model
// ---------------------------------------------------------------------------

/// Key component marking a finished beat or scene.
pub const CLOSED: u32 = u32::MAX;

/// Where in the story a snapshot was taken. Keys order by `(scene, beat, round)`.
///
/// Beat 0 is the freshly opened scene and round `n` the end of round `n`.
/// [`CLOSED`] in the round marks a finished beat, and in both beat and round
/// a closed scene, so later saves always sort after earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    /// Story.
    pub story_id: StoryId,
    /// Scene number.
    pub scene: u32,
    /// Beat number within the scene.
    pub beat: u32,
    /// Round within the beat.
    pub round: u32,
}

/// A beat that was interrupted between rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatInProgress {
    /// Beat number within the open scene.
    pub number: u32,
    /// The setup it opened with.
    pub setup: BeatSetup,
    /// Engine state as of the last completed round.
    pub engine: TurnEngine,
}

/// Everything needed to pick a story back up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Position.
    pub key: SnapshotKey,
    /// Long-lived state.
    pub story: Story,
    /// The beat being played, if saved mid-beat.
    pub beat: Option<BeatInProgress>,
    /// Wall-clock time of the save.
    pub saved_at: DateTime<Utc>,
}

/// Persistence collaborator.
pub trait SnapshotStore: Send {
    /// Save (upsert) a snapshot under its key.
    ///
    /// # Errors
    /// Serialization or storage failure.
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Most recent snapshot of a story by `(scene, beat, round)`.
    ///
    /// # Errors
    /// Serialization or storage failure.
    fn load_latest(&self, story_id: StoryId) -> Result<Option<Snapshot>>;

    /// All keys saved for a story, oldest first.
    ///
    /// # Errors
    /// Storage failure.
    fn list_keys(&self, story_id: StoryId) -> Result<Vec<SnapshotKey>>;

    /// Called when a scene closes. Stores may take a backup here.
    ///
    /// # Errors
    /// Storage failure.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42).
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SqliteSnapshotStore
// ---------------------------------------------------------------------------

/// SQLite-backed [`SnapshotStore`].
pub struct SqliteSnapshotStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteSnapshotStore {
    /// Open (or create) a database at `path`, creating parent directories.
    ///
    /// # Errors
    /// [`TableauError::Database`] on SQLite failures, [`TableauError::Io`]
    /// if the parent directory cannot be created.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Snapshot store opened"
        );
        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (tests).
    ///
    /// # Errors
    /// [`TableauError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file, or `:memory:`.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of stored snapshots across all stories.
    ///
    /// # Errors
    /// [`TableauError::Database`] on SQLite failures.
    pub fn snapshot_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Copy the database to `dest_path` with SQLite's online-backup API.
    ///
    /// # Errors
    /// [`TableauError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Snapshot backup completed"
        );
        Ok(())
    }

    /// Write `<db>.bak.1`, shifting older backups up and keeping at most
    /// `backup_count`. No-op for in-memory databases.
    ///
    /// # Errors
    /// [`TableauError::Database`] or [`TableauError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        let max = self.config.backup_count;
        if self.db_path.as_os_str() == ":memory:" || max == 0 {
            return Ok(());
        }
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        self.backup(self.backup_path(1))
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    fn decode(&self, story_id: StoryId, data: &[u8], stored: Option<String>) -> Result<Snapshot> {
        if let Some(expected) = stored.filter(|_| self.config.checksum_enabled) {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(
                    story = %story_id,
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch, possible save corruption"
                );
            }
        }
        serde_json::from_slice(data).map_err(|e| TableauError::Serialization(e.to_string()))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let start = Instant::now();
        let json =
            serde_json::to_vec(snapshot).map_err(|e| TableauError::Serialization(e.to_string()))?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let key = snapshot.key;

        self.conn.execute(
            "INSERT INTO snapshots (story_id, scene, beat, round, data, saved_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(story_id, scene, beat, round) DO UPDATE SET
                data = excluded.data,
                saved_at = excluded.saved_at,
                checksum = excluded.checksum",
            params![
                key.story_id.0.to_string(),
                key.scene,
                key.beat,
                key.round,
                json,
                snapshot.saved_at.to_rfc3339(),
                checksum
            ],
        )?;

        debug!(
            story = %key.story_id,
            scene = key.scene,
            beat = key.beat,
            round = key.round,
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved snapshot"
        );
        Ok(())
    }

    fn load_latest(&self, story_id: StoryId) -> Result<Option<Snapshot>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT data, checksum FROM snapshots WHERE story_id = ?1
             ORDER BY scene DESC, beat DESC, round DESC LIMIT 1",
        )?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![story_id.0.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        let Some((data, checksum)) = row else {
            return Ok(None);
        };
        let snapshot = self.decode(story_id, &data, checksum)?;
        debug!(story = %story_id, key = ?snapshot.key, "Loaded snapshot");
        Ok(Some(snapshot))
    }

    fn list_keys(&self, story_id: StoryId) -> Result<Vec<SnapshotKey>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT scene, beat, round FROM snapshots WHERE story_id = ?1
             ORDER BY scene, beat, round",
        )?;
        let rows = stmt.query_map(params![story_id.0.to_string()], |row| {
            Ok(SnapshotKey {
                story_id,
                scene: row.get(0)?,
                beat: row.get(1)?,
                round: row.get(2)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(TableauError::from)
    }

    fn checkpoint(&self) -> Result<()> {
        self.create_rotating_backup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, Nature};
    use crate::engine::ExitPolicy;
    use crate::types::{CharacterId, StoryDay};
    use std::collections::BTreeMap;

    fn config() -> PersistenceConfig {
        PersistenceConfig {
            checksum_enabled: true,
            ..PersistenceConfig::default()
        }
    }

    fn story() -> Story {
        let nature = Nature {
            core_traits: vec!["stubborn".into()],
            cognitive_style: "impulsive".into(),
            stress_response: "aggression".into(),
            moral_compass: "loyalty-first".into(),
        };
        Story::new(
            "Harvest",
            [
                Character::new("Alice", nature.clone()),
                Character::new("Bob", nature),
            ],
        )
        .expect("story")
    }

    fn snapshot(story: &Story, scene: u32, beat: u32, round: u32) -> Snapshot {
        Snapshot {
            key: SnapshotKey {
                story_id: story.id,
                scene,
                beat,
                round,
            },
            story: story.clone(),
            beat: None,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn latest_is_ordered_by_position_not_insertion() {
        let mut store = SqliteSnapshotStore::open_in_memory(&config()).expect("open");
        let story = story();
        store.save(&snapshot(&story, 1, 2, 1)).expect("save");
        store.save(&snapshot(&story, 1, 1, 5)).expect("save");
        store.save(&snapshot(&story, 1, 2, 3)).expect("save");

        let latest = store.load_latest(story.id).expect("load").expect("some");
        assert_eq!((latest.key.scene, latest.key.beat, latest.key.round), (1, 2, 3));
        assert_eq!(store.list_keys(story.id).expect("keys").len(), 3);
    }

    #[test]
    fn unknown_story_has_no_snapshot() {
        let store = SqliteSnapshotStore::open_in_memory(&config()).expect("open");
        assert!(store.load_latest(StoryId::new()).expect("load").is_none());
    }

    #[test]
    fn save_upserts_same_key() {
        let mut store = SqliteSnapshotStore::open_in_memory(&config()).expect("open");
        let mut story = story();
        store.save(&snapshot(&story, 1, 1, 1)).expect("save");
        story.day = StoryDay(4);
        store.save(&snapshot(&story, 1, 1, 1)).expect("save");
        assert_eq!(store.snapshot_count().expect("count"), 1);
        let latest = store.load_latest(story.id).expect("load").expect("some");
        assert_eq!(latest.story.day, StoryDay(4));
    }

    #[test]
    fn in_progress_beat_round_trips() {
        let mut store = SqliteSnapshotStore::open_in_memory(&config()).expect("open");
        let story = story();
        let mut snap = snapshot(&story, 1, 1, 2);
        snap.beat = Some(BeatInProgress {
            number: 1,
            setup: BeatSetup {
                situation: "The granary is half empty".into(),
                characters: vec!["Alice".into(), "Bob".into()],
                complications: BTreeMap::from([(
                    CharacterId::from("Bob"),
                    "took the grain".to_string(),
                )]),
            },
            engine: TurnEngine::new(vec!["Alice".into(), "Bob".into()], ExitPolicy::default())
                .expect("engine"),
        });
        store.save(&snap).expect("save");
        let loaded = store.load_latest(story.id).expect("load").expect("some");
        let beat = loaded.beat.expect("beat");
        assert_eq!(beat.engine.current_round(), 1);
        assert_eq!(beat.setup.complications.len(), 1);
    }

    #[test]
    fn corrupted_checksum_still_loads() {
        let mut store = SqliteSnapshotStore::open_in_memory(&config()).expect("open");
        let story = story();
        store.save(&snapshot(&story, 1, 1, 1)).expect("save");
        store
            .conn
            .execute("UPDATE snapshots SET checksum = 'deadbeef'", [])
            .expect("corrupt");
        assert!(store.load_latest(story.id).expect("load").is_some());
    }

    #[test]
    fn file_store_rotates_backups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("saves").join("story.db");
        let config = PersistenceConfig {
            backup_count: 2,
            ..config()
        };
        let mut store = SqliteSnapshotStore::open(&db_path, &config).expect("open");
        store.save(&snapshot(&story(), 1, 1, 1)).expect("save");

        for _ in 0..3 {
            store.create_rotating_backup().expect("backup");
        }
        let saves = dir.path().join("saves");
        assert!(saves.join("story.db.bak.1").exists());
        assert!(saves.join("story.db.bak.2").exists());
        assert!(!saves.join("story.db.bak.3").exists());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}
