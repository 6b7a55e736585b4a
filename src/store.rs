// Copyright 2026 Agrimatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::applications::ApplicationRow;
use crate::applications::ApplicationStatus;
use crate::model::Listing;
use crate::model::ListingKind;

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    lock: Option<StoreLock>,
}

struct StoreLock {
    _file: File,
    path: PathBuf,
    mode: StoreMode,
}

impl StoreLock {
    fn new(file: File, path: PathBuf, mode: StoreMode) -> Self {
        Self {
            _file: file,
            path,
            mode,
        }
    }
}

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub listing_count: i64,
    /// Live listings per kind label; every kind is present.
    pub kind_counts: BTreeMap<String, i64>,
    pub saved_count: i64,
    pub application_count: i64,
    pub total_views: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub orphaned_saved: i64,
    pub orphaned_applications: i64,
    pub stats: StoreStats,
}

/// Result of a save toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Saved,
    Unsaved,
}

impl SaveState {
    pub fn as_label(self) -> &'static str {
        match self {
            SaveState::Saved => "saved",
            SaveState::Unsaved => "unsaved",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ApplicationQuery {
    pub applicant_id: Option<String>,
    pub listing_id: Option<String>,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

impl Store {
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        let version = Self::schema_version(&conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if matches!(mode, StoreMode::ReadWrite) && version < SCHEMA_VERSION {
            Self::create_schema(&conn)?;
            Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        } else if version < SCHEMA_VERSION {
            anyhow::bail!(
                "store at {} is uninitialized; run `agrimatch init` first",
                path.display()
            );
        }
        tracing::debug!(path = %path.display(), ?mode, "opened store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("agrimatch");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("agrimatch-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock::new(file, lock_path, mode)),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT
);

CREATE TABLE IF NOT EXISTS listing (
  rowid INTEGER PRIMARY KEY,
  id TEXT UNIQUE NOT NULL,
  kind TEXT NOT NULL,
  body TEXT NOT NULL,
  views INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS saved (
  user_id TEXT NOT NULL,
  listing_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (user_id, listing_id)
);

CREATE TABLE IF NOT EXISTS application (
  id TEXT PRIMARY KEY,
  listing_id TEXT NOT NULL,
  applicant_id TEXT NOT NULL,
  status TEXT NOT NULL,
  message TEXT NOT NULL DEFAULT '',
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  UNIQUE (listing_id, applicant_id)
);

CREATE INDEX IF NOT EXISTS idx_listing_kind ON listing(kind);
CREATE INDEX IF NOT EXISTS idx_saved_user ON saved(user_id);
CREATE INDEX IF NOT EXISTS idx_application_applicant ON application(applicant_id);
CREATE INDEX IF NOT EXISTS idx_application_listing ON application(listing_id);",
        )
        .context("create schema")?;
        Ok(())
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    /// Inserts or replaces a listing. A replaced listing keeps its snapshot
    /// position and its recorded views.
    pub fn upsert_listing(&self, listing: &Listing) -> Result<()> {
        let body = serde_json::to_string(listing).context("serialize listing")?;
        self.conn
            .execute(
                "INSERT INTO listing (id, kind, body, views, created_at, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)
                 ON CONFLICT(id) DO UPDATE SET
                   kind = excluded.kind,
                   body = excluded.body,
                   deleted = 0",
                params![
                    listing.id,
                    listing.kind.as_label(),
                    body,
                    listing.views as i64,
                    now_rfc3339()
                ],
            )
            .with_context(|| format!("upsert listing {}", listing.id))?;
        Ok(())
    }

    /// Every live listing in insertion order.
    pub fn snapshot(&self) -> Result<Vec<Listing>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body, views FROM listing WHERE deleted=0 ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            let body: String = row.get(0)?;
            let views: i64 = row.get(1)?;
            Ok((body, views))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (body, views) = row?;
            out.push(decode_listing(&body, views)?);
        }
        Ok(out)
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT body, views FROM listing WHERE id=?1 AND deleted=0",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("get listing")?;
        row.map(|(body, views)| decode_listing(&body, views))
            .transpose()
    }

    fn require_listing(&self, id: &str) -> Result<()> {
        let exists: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM listing WHERE id=?1 AND deleted=0",
                params![id],
                |row| row.get(0),
            )
            .context("check listing")?;
        if exists == 0 {
            anyhow::bail!("listing not found: {id}");
        }
        Ok(())
    }

    pub fn record_view(&self, id: &str) -> Result<u64> {
        let updated = self.conn.execute(
            "UPDATE listing SET views = views + 1 WHERE id=?1 AND deleted=0",
            params![id],
        )?;
        if updated == 0 {
            anyhow::bail!("listing not found: {id}");
        }
        let views: i64 = self
            .conn
            .query_row("SELECT views FROM listing WHERE id=?1", params![id], |row| {
                row.get(0)
            })
            .context("read views")?;
        Ok(views as u64)
    }

    /// Tombstones a listing and drops its saved entries.
    pub fn mark_listing_deleted(&self, id: &str) -> Result<usize> {
        let updated = self.conn.execute(
            "UPDATE listing SET deleted=1 WHERE id=?1 AND deleted=0",
            params![id],
        )?;
        if updated > 0 {
            self.conn
                .execute("DELETE FROM saved WHERE listing_id=?1", params![id])?;
        }
        Ok(updated)
    }

    pub fn compact(&self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM application WHERE listing_id IN (SELECT id FROM listing WHERE deleted=1)",
            [],
        )?;
        self.conn.execute("DELETE FROM listing WHERE deleted=1", [])?;
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    pub fn toggle_saved(&self, user_id: &str, listing_id: &str) -> Result<SaveState> {
        self.require_listing(listing_id)?;
        let removed = self.conn.execute(
            "DELETE FROM saved WHERE user_id=?1 AND listing_id=?2",
            params![user_id, listing_id],
        )?;
        if removed > 0 {
            return Ok(SaveState::Unsaved);
        }
        self.conn.execute(
            "INSERT INTO saved (user_id, listing_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, listing_id, now_rfc3339()],
        )?;
        Ok(SaveState::Saved)
    }

    /// Saved listings for a user, most recently saved first.
    pub fn saved_listings(&self, user_id: &str) -> Result<Vec<Listing>> {
        let mut stmt = self.conn.prepare(
            "SELECT listing.body, listing.views
             FROM saved
             JOIN listing ON listing.id = saved.listing_id
             WHERE saved.user_id=?1 AND listing.deleted=0
             ORDER BY saved.created_at DESC, saved.rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let body: String = row.get(0)?;
            let views: i64 = row.get(1)?;
            Ok((body, views))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (body, views) = row?;
            out.push(decode_listing(&body, views)?);
        }
        Ok(out)
    }

    pub fn create_application(
        &self,
        listing_id: &str,
        applicant_id: &str,
        message: &str,
    ) -> Result<ApplicationRow> {
        self.require_listing(listing_id)?;
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM application WHERE listing_id=?1 AND applicant_id=?2",
                params![listing_id, applicant_id],
                |row| row.get(0),
            )
            .optional()
            .context("check application")?;
        if let Some(id) = existing {
            anyhow::bail!("{applicant_id} already applied to listing {listing_id} ({id})");
        }

        let now = now_rfc3339();
        let mut hasher = Sha256::new();
        hasher.update(listing_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(applicant_id.as_bytes());
        let id = hex::encode(hasher.finalize())[..16].to_string();
        let row = ApplicationRow {
            id,
            listing_id: listing_id.to_string(),
            applicant_id: applicant_id.to_string(),
            status: ApplicationStatus::Pending,
            message: message.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO application (id, listing_id, applicant_id, status, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.listing_id,
                row.applicant_id,
                row.status.as_label(),
                row.message,
                row.created_at,
                row.updated_at
            ],
        )?;
        Ok(row)
    }

    pub fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, listing_id, applicant_id, status, message, created_at, updated_at
             FROM application
             WHERE (?1 IS NULL OR applicant_id = ?1)
               AND (?2 IS NULL OR listing_id = ?2)
             ORDER BY created_at DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![query.applicant_id, query.listing_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, listing_id, applicant_id, status, message, created_at, updated_at) = row?;
            out.push(ApplicationRow {
                id,
                listing_id,
                applicant_id,
                status: ApplicationStatus::parse(&status)?,
                message,
                created_at,
                updated_at,
            });
        }
        Ok(out)
    }

    pub fn set_application_status(
        &self,
        id: &str,
        next: ApplicationStatus,
    ) -> Result<ApplicationRow> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM application WHERE id=?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("read application status")?;
        let Some(current) = current else {
            anyhow::bail!("application not found: {id}");
        };
        let next = ApplicationStatus::parse(&current)?.transition(next)?;
        self.conn.execute(
            "UPDATE application SET status=?1, updated_at=?2 WHERE id=?3",
            params![next.as_label(), now_rfc3339(), id],
        )?;
        let rows = self.applications(&ApplicationQuery::default())?;
        rows.into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("application not found: {id}"))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut kind_counts: BTreeMap<String, i64> = [ListingKind::Property, ListingKind::Job]
            .into_iter()
            .map(|kind| (kind.as_label().to_string(), 0))
            .collect();
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM listing WHERE deleted=0 GROUP BY kind")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (kind, count) = row.context("count listings")?;
            kind_counts.insert(kind, count);
        }
        let listing_count = kind_counts.values().sum();
        let saved_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM saved", [], |row| row.get(0))
            .context("count saved")?;
        let application_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM application", [], |row| row.get(0))
            .context("count applications")?;
        let total_views: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(views), 0) FROM listing WHERE deleted=0",
                [],
                |row| row.get(0),
            )
            .context("sum views")?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            listing_count,
            kind_counts,
            saved_count,
            application_count,
            total_views,
            db_size_bytes,
        })
    }

    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let orphaned_saved: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM saved
                 LEFT JOIN listing ON listing.id = saved.listing_id AND listing.deleted=0
                 WHERE listing.id IS NULL",
                [],
                |row| row.get(0),
            )
            .context("orphaned saved")?;
        let orphaned_applications: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM application
                 LEFT JOIN listing ON listing.id = application.listing_id
                 WHERE listing.id IS NULL",
                [],
                |row| row.get(0),
            )
            .context("orphaned applications")?;
        let stats = self.stats()?;
        Ok(IntegrityReport {
            status,
            orphaned_saved,
            orphaned_applications,
            stats,
        })
    }
}

fn decode_listing(body: &str, views: i64) -> Result<Listing> {
    let mut listing: Listing = serde_json::from_str(body).context("decode listing body")?;
    listing.views = views.max(0) as u64;
    Ok(listing)
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let path = lock.path.clone();
            let mode = lock.mode;
            drop(lock);
            if matches!(mode, StoreMode::ReadWrite) {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::model::fixtures::listing;

    fn open_rw(dir: &Path) -> Result<Store> {
        let db_path = dir.join("agrimatch.db");
        Store::init(&db_path)?;
        Store::open(&db_path, StoreMode::ReadWrite)
    }

    #[test]
    fn shared_lock_allows_multiple_readers() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("agrimatch.db");
        Store::init(&db_path)?;

        let store_a = Store::open(&db_path, StoreMode::ReadOnly)?;
        let store_b = Store::open(&db_path, StoreMode::ReadOnly)?;

        store_a.stats()?;
        store_b.stats()?;
        Ok(())
    }

    #[test]
    fn snapshot_keeps_insertion_order_across_upserts() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        for id in ["b", "a", "c"] {
            store.upsert_listing(&listing(id))?;
        }
        let mut updated = listing("b");
        updated.price = 1.0;
        store.upsert_listing(&updated)?;

        let snapshot = store.snapshot()?;
        let ids: Vec<&str> = snapshot.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(snapshot[0].price, 1.0);
        Ok(())
    }

    #[test]
    fn views_survive_upsert() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        store.upsert_listing(&listing("a"))?;
        store.record_view("a")?;
        assert_eq!(store.record_view("a")?, 2);
        store.upsert_listing(&listing("a"))?;
        let got = store.get_listing("a")?.expect("listing");
        assert_eq!(got.views, 2);
        assert!(store.record_view("missing").is_err());
        Ok(())
    }

    #[test]
    fn save_toggles() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        store.upsert_listing(&listing("a"))?;
        assert_eq!(store.toggle_saved("u1", "a")?, SaveState::Saved);
        assert_eq!(store.saved_listings("u1")?.len(), 1);
        assert!(store.saved_listings("u2")?.is_empty());
        assert_eq!(store.toggle_saved("u1", "a")?, SaveState::Unsaved);
        assert!(store.saved_listings("u1")?.is_empty());
        assert!(store.toggle_saved("u1", "missing").is_err());
        Ok(())
    }

    #[test]
    fn deleted_listing_leaves_snapshot_and_saved() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        store.upsert_listing(&listing("a"))?;
        store.upsert_listing(&listing("b"))?;
        store.toggle_saved("u1", "a")?;
        assert_eq!(store.mark_listing_deleted("a")?, 1);
        assert_eq!(store.mark_listing_deleted("a")?, 0);
        assert_eq!(store.snapshot()?.len(), 1);
        assert!(store.saved_listings("u1")?.is_empty());
        assert!(store.get_listing("a")?.is_none());
        Ok(())
    }

    #[test]
    fn stats_count_live_listings_per_kind() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        store.upsert_listing(&listing("a"))?;
        store.upsert_listing(&listing("b"))?;
        let mut job = listing("j");
        job.kind = ListingKind::Job;
        store.upsert_listing(&job)?;

        let stats = store.stats()?;
        assert_eq!(stats.listing_count, 3);
        assert_eq!(stats.kind_counts["property"], 2);
        assert_eq!(stats.kind_counts["job"], 1);

        // Re-kinding through an upsert moves the count.
        let mut moved = listing("b");
        moved.kind = ListingKind::Job;
        store.upsert_listing(&moved)?;
        store.mark_listing_deleted("a")?;
        let stats = store.stats()?;
        assert_eq!(stats.listing_count, 2);
        assert_eq!(stats.kind_counts["property"], 0);
        assert_eq!(stats.kind_counts["job"], 2);
        Ok(())
    }

    #[test]
    fn application_lifecycle() -> Result<()> {
        let dir = tempdir()?;
        let store = open_rw(dir.path())?;
        store.upsert_listing(&listing("a"))?;
        let app = store.create_application("a", "farmer-1", "keen")?;
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert!(store.create_application("a", "farmer-1", "again").is_err());

        let reviewed = store.set_application_status(&app.id, ApplicationStatus::UnderReview)?;
        assert_eq!(reviewed.status, ApplicationStatus::UnderReview);
        assert!(
            store
                .set_application_status(&app.id, ApplicationStatus::Pending)
                .is_err()
        );

        let mine = store.applications(&ApplicationQuery {
            applicant_id: Some("farmer-1".to_string()),
            listing_id: None,
        })?;
        assert_eq!(mine.len(), 1);
        let other = store.applications(&ApplicationQuery {
            applicant_id: Some("farmer-2".to_string()),
            listing_id: None,
        })?;
        assert!(other.is_empty());
        Ok(())
    }

    #[test]
    fn read_only_open_rejects_missing_schema() -> Result<()> {
        let dir = tempdir()?;
        let db_path = dir.path().join("agrimatch.db");
        rusqlite::Connection::open(&db_path)?;
        let err = match Store::open(&db_path, StoreMode::ReadOnly) {
            Ok(_) => anyhow::bail!("expected open to fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("uninitialized"));
        Ok(())
    }
}
