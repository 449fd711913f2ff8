use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::data::models::{NewTrade, Trade};
use crate::errors::{JournalError, Result};
use crate::take_profit::ProfitExpectation;

use super::{
    decimal_column, decimal_param, optional_decimal_column, optional_decimal_param,
    parsed_column, Database,
};

const TRADE_COLUMNS: &str = "id, stock_code, stock_name, side, price, quantity, commission, \
     trade_date, take_profit_ratio, stop_loss_ratio, use_batch_take_profit, notes, \
     created_at, updated_at";

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        stock_code: row.get(1)?,
        stock_name: row.get(2)?,
        side: parsed_column(row, 3)?,
        price: decimal_column(row, 4)?,
        quantity: row.get(5)?,
        commission: decimal_column(row, 6)?,
        trade_date: row.get(7)?,
        take_profit_ratio: optional_decimal_column(row, 8)?,
        stop_loss_ratio: optional_decimal_column(row, 9)?,
        use_batch_take_profit: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl Database {
    pub fn insert_trade(&self, trade: &NewTrade) -> Result<Trade> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO trades
            (stock_code, stock_name, side, price, quantity, commission, trade_date,
             take_profit_ratio, stop_loss_ratio, use_batch_take_profit, notes,
             created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)
            "#,
            params![
                trade.stock_code.trim(),
                trade.stock_name,
                trade.side.as_str(),
                decimal_param(trade.price),
                trade.quantity,
                decimal_param(trade.commission),
                trade.trade_date,
                optional_decimal_param(trade.take_profit_ratio),
                optional_decimal_param(trade.stop_loss_ratio),
                trade.notes,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_trade(id)?
            .ok_or_else(|| JournalError::CorruptRecord(format!("trade {id} vanished after insert")))
    }

    pub fn get_trade(&self, id: i64) -> Result<Option<Trade>> {
        let sql = format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?1");
        let trade = self
            .conn
            .query_row(&sql, params![id], trade_from_row)
            .optional()?;
        Ok(trade)
    }

    /// Trades in replay order (trade date, then id), optionally for one stock.
    pub fn list_trades(&self, stock_code: Option<&str>) -> Result<Vec<Trade>> {
        let trades = match stock_code {
            Some(code) => {
                let sql = format!(
                    "SELECT {TRADE_COLUMNS} FROM trades WHERE stock_code = ?1 \
                     ORDER BY trade_date, id"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![code.trim()], trade_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("SELECT {TRADE_COLUMNS} FROM trades ORDER BY trade_date, id");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], trade_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(trades)
    }

    /// Overwrite a trade's fields. When `refreshed` is given, the stored
    /// expected profit of each target is rewritten in the same transaction.
    pub fn update_trade(
        &mut self,
        id: i64,
        trade: &NewTrade,
        refreshed: Option<&ProfitExpectation>,
    ) -> Result<Trade> {
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE trades SET
                stock_code = ?2, stock_name = ?3, side = ?4, price = ?5, quantity = ?6,
                commission = ?7, trade_date = ?8, take_profit_ratio = ?9,
                stop_loss_ratio = ?10, notes = ?11, updated_at = ?12
            WHERE id = ?1
            "#,
            params![
                id,
                trade.stock_code.trim(),
                trade.stock_name,
                trade.side.as_str(),
                decimal_param(trade.price),
                trade.quantity,
                decimal_param(trade.commission),
                trade.trade_date,
                optional_decimal_param(trade.take_profit_ratio),
                optional_decimal_param(trade.stop_loss_ratio),
                trade.notes,
                Utc::now(),
            ],
        )?;
        if changed == 0 {
            return Err(JournalError::TradeNotFound(id));
        }

        if let Some(expectation) = refreshed {
            for p in &expectation.targets {
                tx.execute(
                    "UPDATE profit_targets SET expected_profit_ratio = ?3 \
                     WHERE trade_id = ?1 AND sequence_order = ?2",
                    params![id, p.sequence_order, decimal_param(p.expected_profit_ratio)],
                )?;
            }
        }

        tx.commit()?;

        self.get_trade(id)?.ok_or(JournalError::TradeNotFound(id))
    }

    /// Delete a trade; its targets and review go with it.
    pub fn delete_trade(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM trades WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
