//! Snapshot persistence.
//!
//! Snapshots are appended to an SQLite table `ipl(name, date, modified, data)`
//! where `data` is the JSON-encoded [`Ipl`]. Rows are never updated, so the
//! table doubles as the history of the machine's installed programs.

use crate::error::{IplError, Result};
use crate::Ipl;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS ipl (
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    modified TEXT NOT NULL,
    data BLOB NOT NULL
)";

/// Row metadata for one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub name: String,
    pub date: String,
    pub modified: String,
}

/// Append-only snapshot store backed by SQLite.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening snapshot store at {:?}", path);
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn })
    }

    /// Append `ipl` as a new row and return the date it is keyed by.
    pub fn save(&mut self, ipl: &Ipl) -> Result<String> {
        let blob = serde_json::to_vec(ipl)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO ipl (name, date, modified, data) VALUES (?1, ?2, ?3, ?4)",
            params![ipl.name(), ipl.date(), ipl.modified(), blob],
        )?;
        tx.commit()?;

        info!("Saved snapshot {} ({} programs)", ipl.date(), ipl.len());
        Ok(ipl.date().to_string())
    }

    /// Load the snapshot saved under `date`, or the most recent one when
    /// `date` is `None`. If a date was saved more than once the last row wins.
    pub fn load(&self, date: Option<&str>) -> Result<Ipl> {
        let blob: Option<Vec<u8>> = match date {
            Some(date) => self
                .conn
                .query_row(
                    "SELECT data FROM ipl WHERE date = ?1 ORDER BY rowid DESC LIMIT 1",
                    [date],
                    |row| row.get(0),
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    "SELECT data FROM ipl ORDER BY date DESC, rowid DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?,
        };

        let blob = blob.ok_or_else(|| match date {
            Some(date) => IplError::NotFound(format!("no snapshot dated {date}")),
            None => IplError::NotFound("snapshot store is empty".to_string()),
        })?;

        let ipl: Ipl = serde_json::from_slice(&blob)?;
        info!("Loaded snapshot {} ({} programs)", ipl.date(), ipl.len());
        Ok(ipl)
    }

    /// Metadata of every stored snapshot, oldest first.
    pub fn history(&self) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, date, modified FROM ipl ORDER BY date ASC, rowid ASC")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SnapshotInfo {
                    name: row.get(0)?,
                    date: row.get(1)?,
                    modified: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
