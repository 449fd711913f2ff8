use chrono::Utc;
use tracing::{info, warn};

use crate::data::models::{NewTrade, Trade, TradeSide};
use crate::errors::{JournalError, Result, ValidationError};
use crate::take_profit::calculate_expected_profit;

use super::{Portfolio, TradeJournal};

impl TradeJournal {
    /// Validate and store a new trade.
    pub fn record_trade(&mut self, trade: NewTrade) -> Result<Trade> {
        trade.validate()?;
        if trade.side == TradeSide::Sell {
            // Sorts after every stored trade of the same date.
            let candidate = provisional_trade(i64::MAX, &trade);
            self.check_holdings(&trade.stock_code, None, Some(candidate))?;
        }

        let saved = self.db.insert_trade(&trade)?;
        info!(
            trade_id = saved.id,
            stock_code = %saved.stock_code,
            side = %saved.side,
            price = %saved.price,
            quantity = saved.quantity,
            "Trade recorded"
        );
        Ok(saved)
    }

    /// Overwrite a trade. Existing batch targets must still hold against the
    /// new buy price or the whole update is rejected.
    pub fn update_trade(&mut self, id: i64, trade: NewTrade) -> Result<Trade> {
        let existing = self.trade(id)?;

        trade.validate()?;

        let refreshed = if existing.use_batch_take_profit {
            if trade.side == TradeSide::Sell {
                return Err(JournalError::InvalidOperation(format!(
                    "trade {id} has batch take-profit targets and cannot become a sell; clear them first"
                )));
            }
            let inputs: Vec<_> = self
                .db
                .list_profit_targets(id)?
                .iter()
                .map(|t| t.as_input())
                .collect();
            self.validator.validate(trade.price, &inputs)?;
            Some(calculate_expected_profit(trade.price, &inputs))
        } else {
            None
        };

        self.check_holdings(&trade.stock_code, Some(id), Some(provisional_trade(id, &trade)))?;
        if existing.stock_code != trade.stock_code.trim() {
            self.check_holdings(&existing.stock_code, Some(id), None)?;
        }

        let saved = self.db.update_trade(id, &trade, refreshed.as_ref())?;
        info!(
            trade_id = id,
            price = %saved.price,
            quantity = saved.quantity,
            targets_refreshed = refreshed.is_some(),
            "Trade updated"
        );
        Ok(saved)
    }

    /// Delete a trade together with its targets and review.
    ///
    /// A buy that a later sell depends on cannot be deleted.
    pub fn delete_trade(&mut self, id: i64) -> Result<()> {
        let existing = self.trade(id)?;
        if existing.is_buy() {
            if let Err(e) = self.check_holdings(&existing.stock_code, Some(id), None) {
                let reason = match e.validation().and_then(|v| v.issues().first()) {
                    Some(issue) => issue.message.clone(),
                    None => return Err(e),
                };
                return Err(JournalError::InvalidOperation(format!(
                    "cannot delete buy trade {id}: {reason}"
                )));
            }
        }

        if !self.db.delete_trade(id)? {
            return Err(JournalError::TradeNotFound(id));
        }
        info!(trade_id = id, "Trade deleted");
        Ok(())
    }

    pub fn trade(&self, id: i64) -> Result<Trade> {
        self.db.get_trade(id)?.ok_or(JournalError::TradeNotFound(id))
    }

    pub fn trades(&self, stock_code: Option<&str>) -> Result<Vec<Trade>> {
        self.db.list_trades(stock_code)
    }

    pub fn portfolio(&self) -> Result<Portfolio> {
        Ok(Portfolio::from_trades(&self.db.list_trades(None)?))
    }

    /// Shares currently held of one stock.
    pub fn holding_quantity(&self, stock_code: &str) -> Result<i64> {
        let trades = self.db.list_trades(Some(stock_code))?;
        Ok(Portfolio::from_trades(&trades).quantity(stock_code.trim()))
    }

    /// Replay one stock's history with trade `replaces` swapped for
    /// `candidate` and reject the change if any sell would exceed the shares
    /// held on its date.
    fn check_holdings(
        &self,
        stock_code: &str,
        replaces: Option<i64>,
        candidate: Option<Trade>,
    ) -> Result<()> {
        let code = stock_code.trim();
        let mut trades: Vec<Trade> = self
            .db
            .list_trades(Some(code))?
            .into_iter()
            .filter(|t| Some(t.id) != replaces)
            .collect();
        let candidate_id = candidate.as_ref().map(|t| t.id);
        trades.extend(candidate);

        let Some(oversell) = Portfolio::first_oversell(&trades) else {
            return Ok(());
        };

        warn!(
            stock_code = %code,
            sell_trade = oversell.trade_id,
            sell_quantity = oversell.quantity,
            held = oversell.held,
            "Trade rejected: sell exceeds holding"
        );
        let message = if Some(oversell.trade_id) == candidate_id {
            format!(
                "cannot sell {} shares of {code} on {}: only {} held",
                oversell.quantity, oversell.trade_date, oversell.held
            )
        } else {
            format!(
                "sell trade {} of {} shares of {code} on {} would exceed the {} shares held",
                oversell.trade_id, oversell.quantity, oversell.trade_date, oversell.held
            )
        };
        let mut err = ValidationError::new();
        err.push(None, "quantity", message);
        Err(err.into())
    }
}

/// Stand-in for a trade that is not stored yet, used to replay holdings.
fn provisional_trade(id: i64, trade: &NewTrade) -> Trade {
    let now = Utc::now();
    Trade {
        id,
        stock_code: trade.stock_code.trim().to_string(),
        stock_name: trade.stock_name.clone(),
        side: trade.side,
        price: trade.price,
        quantity: trade.quantity,
        commission: trade.commission,
        trade_date: trade.trade_date,
        take_profit_ratio: trade.take_profit_ratio,
        stop_loss_ratio: trade.stop_loss_ratio,
        use_batch_take_profit: false,
        notes: trade.notes.clone(),
        created_at: now,
        updated_at: now,
    }
}
