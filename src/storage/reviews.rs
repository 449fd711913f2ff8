use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::data::models::{ReviewInput, TradeReview};
use crate::errors::{JournalError, Result};

use super::{parsed_column, Database};

const REVIEW_COLUMNS: &str =
    "id, trade_id, rating, decision, summary, lessons, created_at, updated_at";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<TradeReview> {
    Ok(TradeReview {
        id: row.get(0)?,
        trade_id: row.get(1)?,
        rating: row.get(2)?,
        decision: parsed_column(row, 3)?,
        summary: row.get(4)?,
        lessons: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    /// Insert the review for a trade, or overwrite the existing one.
    pub fn upsert_review(&self, trade_id: i64, review: &ReviewInput) -> Result<TradeReview> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO trade_reviews
            (trade_id, rating, decision, summary, lessons, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(trade_id) DO UPDATE SET
                rating = excluded.rating,
                decision = excluded.decision,
                summary = excluded.summary,
                lessons = excluded.lessons,
                updated_at = excluded.updated_at
            "#,
            params![
                trade_id,
                review.rating,
                review.decision.as_str(),
                review.summary,
                review.lessons,
                now,
            ],
        )?;

        self.get_review(trade_id)?.ok_or_else(|| {
            JournalError::CorruptRecord(format!("review for trade {trade_id} vanished after upsert"))
        })
    }

    pub fn get_review(&self, trade_id: i64) -> Result<Option<TradeReview>> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM trade_reviews WHERE trade_id = ?1");
        let review = self
            .conn
            .query_row(&sql, params![trade_id], review_from_row)
            .optional()?;
        Ok(review)
    }

    pub fn list_reviews(&self) -> Result<Vec<TradeReview>> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM trade_reviews ORDER BY updated_at DESC, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], review_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
