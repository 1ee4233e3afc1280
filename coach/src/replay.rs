//! SQLite-backed training history.
//!
//! Samples are stored in insertion order using the compact binary encoding
//! of [`TrainingData`], so the orchestrator can restore its buffer after a
//! restart and keep it bounded with FIFO eviction.

use std::path::Path;

use anyhow::{Context, Result};
use mcts::TrainingData;
use rusqlite::{params, Connection};

pub struct ReplayBuffer {
    conn: Connection,
}

impl ReplayBuffer {
    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open replay database {}", db_path.display()))?;
        Self::init(conn)
    }

    /// In-memory database, mainly for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                env_id TEXT NOT NULL,
                iteration INTEGER NOT NULL,
                data BLOB NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_samples_env ON samples(env_id)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Append samples in one transaction.
    pub fn store_batch(&self, env_id: &str, iteration: u32, samples: &[TrainingData]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut stmt =
            tx.prepare_cached("INSERT INTO samples (env_id, iteration, data) VALUES (?1, ?2, ?3)")?;
        for sample in samples {
            stmt.execute(params![env_id, iteration, sample.encode()])?;
        }
        // Drop stmt before commit to release borrow on tx
        drop(stmt);
        tx.commit()?;
        Ok(())
    }

    /// Every sample for `env_id`, oldest first.
    pub fn load_all(&self, env_id: &str) -> Result<Vec<TrainingData>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM samples WHERE env_id = ?1 ORDER BY id ASC")?;
        let blobs = stmt
            .query_map([env_id], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        blobs
            .iter()
            .enumerate()
            .map(|(i, blob)| {
                TrainingData::decode(blob).with_context(|| format!("Corrupt sample at row {}", i))
            })
            .collect()
    }

    pub fn count(&self, env_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM samples WHERE env_id = ?1",
            [env_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete the oldest samples so at most `max` remain for `env_id`.
    /// Returns how many rows were removed.
    pub fn truncate_to(&self, env_id: &str, max: usize) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM samples WHERE env_id = ?1 AND id NOT IN (
                SELECT id FROM samples WHERE env_id = ?1 ORDER BY id DESC LIMIT ?2
            )",
            params![env_id, max as i64],
        )?;
        Ok(deleted)
    }

    pub fn clear(&self, env_id: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM samples WHERE env_id = ?1", [env_id])?;
        Ok(deleted)
    }
}
