use chrono::Utc;
use rusqlite::{params, Row};
use rust_decimal::Decimal;
use tracing::debug;

use crate::data::models::{ProfitTarget, ProfitTargetInput};
use crate::errors::{JournalError, Result};
use crate::take_profit::ProfitExpectation;

use super::{decimal_column, decimal_param, optional_decimal_column, optional_decimal_param, Database};

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<ProfitTarget> {
    Ok(ProfitTarget {
        id: row.get(0)?,
        trade_id: row.get(1)?,
        target_price: optional_decimal_column(row, 2)?,
        profit_ratio: optional_decimal_column(row, 3)?,
        sell_ratio: decimal_column(row, 4)?,
        sequence_order: row.get(5)?,
        expected_profit_ratio: decimal_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Replace every target of a trade in one transaction and flag the trade
    /// as using batch take-profit. Callers validate before calling this.
    pub fn replace_profit_targets(
        &mut self,
        trade_id: i64,
        targets: &[ProfitTargetInput],
        expectation: &ProfitExpectation,
    ) -> Result<Vec<ProfitTarget>> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM profit_targets WHERE trade_id = ?1",
            params![trade_id],
        )?;

        for t in targets {
            let expected = expectation
                .projection(t.sequence_order)
                .map(|p| p.expected_profit_ratio)
                .unwrap_or(Decimal::ZERO);
            tx.execute(
                r#"
                INSERT INTO profit_targets
                (trade_id, target_price, profit_ratio, sell_ratio, sequence_order,
                 expected_profit_ratio, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    trade_id,
                    optional_decimal_param(t.target_price),
                    optional_decimal_param(t.profit_ratio),
                    decimal_param(t.sell_ratio),
                    t.sequence_order,
                    decimal_param(expected),
                    now,
                ],
            )?;
        }

        let flagged = tx.execute(
            "UPDATE trades SET use_batch_take_profit = 1, updated_at = ?2 WHERE id = ?1",
            params![trade_id, now],
        )?;
        if flagged == 0 {
            return Err(JournalError::TradeNotFound(trade_id));
        }

        tx.commit()?;

        debug!(
            trade_id,
            removed,
            inserted = targets.len(),
            "Profit targets replaced"
        );

        self.list_profit_targets(trade_id)
    }

    /// Remove all targets and return the trade to single take-profit mode.
    pub fn clear_profit_targets(&mut self, trade_id: i64) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM profit_targets WHERE trade_id = ?1",
            params![trade_id],
        )?;
        tx.execute(
            "UPDATE trades SET use_batch_take_profit = 0, updated_at = ?2 WHERE id = ?1",
            params![trade_id, Utc::now()],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_profit_targets(&self, trade_id: i64) -> Result<Vec<ProfitTarget>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, trade_id, target_price, profit_ratio, sell_ratio, sequence_order,
                   expected_profit_ratio, created_at
            FROM profit_targets
            WHERE trade_id = ?1
            ORDER BY sequence_order
            "#,
        )?;
        let rows = stmt.query_map(params![trade_id], target_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
