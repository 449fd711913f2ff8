//! SQLite connection and schema for the trade journal.

use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::Result;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stock_code TEXT NOT NULL,
    stock_name TEXT NOT NULL DEFAULT '',
    side TEXT NOT NULL CHECK (side IN ('buy', 'sell')),
    price TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    commission TEXT NOT NULL DEFAULT '0',
    trade_date TEXT NOT NULL,
    take_profit_ratio TEXT,
    stop_loss_ratio TEXT,
    use_batch_take_profit INTEGER NOT NULL DEFAULT 0,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trades_stock_code ON trades(stock_code);
CREATE INDEX IF NOT EXISTS idx_trades_trade_date ON trades(trade_date);

CREATE TABLE IF NOT EXISTS profit_targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_id INTEGER NOT NULL REFERENCES trades(id) ON DELETE CASCADE,
    target_price TEXT,
    profit_ratio TEXT,
    sell_ratio TEXT NOT NULL,
    sequence_order INTEGER NOT NULL CHECK (sequence_order > 0),
    expected_profit_ratio TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (trade_id, sequence_order)
);

CREATE TABLE IF NOT EXISTS trade_reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trade_id INTEGER NOT NULL UNIQUE REFERENCES trades(id) ON DELETE CASCADE,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    decision TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    lessons TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Database wrapper for journal storage.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open or create the database at `path` and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self::with_connection(conn)?;
        info!(path = %path.display(), "Journal database opened");
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create tables and indexes if they are missing.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        debug!("Journal schema initialized");
        Ok(())
    }
}
