use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::models::{ProfitTarget, ProfitTargetInput, Trade};
use crate::errors::{JournalError, Result};
use crate::take_profit::{calculate_expected_profit, ProfitExpectation};

use super::TradeJournal;

/// One planned exit of a position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedExit {
    pub sequence_order: i64,
    pub exit_price: Decimal,
    pub profit_ratio: Decimal,
    pub sell_ratio: Decimal,
    /// Whole shares: floor(quantity * sell_ratio).
    pub shares: i64,
    /// buy_price * quantity * expected_profit_ratio.
    pub expected_profit_amount: Decimal,
}

/// Take-profit plan of one buy trade in share and money terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfitPlan {
    pub trade_id: i64,
    pub stock_code: String,
    pub buy_price: Decimal,
    pub quantity: i64,
    pub batch: bool,
    pub exits: Vec<PlannedExit>,
    pub total_sell_ratio: Decimal,
    pub total_expected_profit_ratio: Decimal,
    pub expected_profit_amount: Decimal,
}

impl TradeJournal {
    /// Replace the batch take-profit targets of a buy trade.
    ///
    /// The full target list is validated against the trade's buy price
    /// first; the delete-then-insert only runs once every check passes.
    pub fn set_profit_targets(
        &mut self,
        trade_id: i64,
        targets: Vec<ProfitTargetInput>,
    ) -> Result<Vec<ProfitTarget>> {
        let trade = self.buy_trade(trade_id)?;

        if let Err(e) = self.validator.validate(trade.price, &targets) {
            warn!(
                trade_id,
                issues = e.issues().len(),
                "Profit targets rejected"
            );
            return Err(e.into());
        }

        let expectation = calculate_expected_profit(trade.price, &targets);
        let saved = self
            .db
            .replace_profit_targets(trade_id, &targets, &expectation)?;

        info!(
            trade_id,
            targets = saved.len(),
            total_sell_ratio = %expectation.total_sell_ratio,
            total_expected_profit_ratio = %expectation.total_expected_profit_ratio,
            "Profit targets saved"
        );
        Ok(saved)
    }

    pub fn profit_targets(&self, trade_id: i64) -> Result<Vec<ProfitTarget>> {
        self.trade(trade_id)?;
        self.db.list_profit_targets(trade_id)
    }

    /// Drop all targets and return the trade to single take-profit mode.
    pub fn clear_profit_targets(&mut self, trade_id: i64) -> Result<usize> {
        self.trade(trade_id)?;
        let removed = self.db.clear_profit_targets(trade_id)?;
        info!(trade_id, removed, "Profit targets cleared");
        Ok(removed)
    }

    /// Validate and evaluate a target list without storing anything.
    pub fn preview_profit_targets(
        &self,
        buy_price: Decimal,
        targets: &[ProfitTargetInput],
    ) -> Result<ProfitExpectation> {
        self.validator.validate(buy_price, targets)?;
        Ok(calculate_expected_profit(buy_price, targets))
    }

    /// Recompute the plan of a buy trade from its stored targets, or from its
    /// single take-profit ratio when it does not use batch targets.
    pub fn take_profit_plan(&self, trade_id: i64) -> Result<TakeProfitPlan> {
        let trade = self.buy_trade(trade_id)?;

        let inputs: Vec<ProfitTargetInput> = if trade.use_batch_take_profit {
            self.db
                .list_profit_targets(trade_id)?
                .iter()
                .map(|t| t.as_input())
                .collect()
        } else {
            trade
                .take_profit_ratio
                .map(|ratio| vec![ProfitTargetInput::at_ratio(ratio, Decimal::ONE, 1)])
                .unwrap_or_default()
        };

        let expectation = calculate_expected_profit(trade.price, &inputs);
        let plan = build_plan(&trade, &expectation)?;
        debug!(
            trade_id,
            exits = plan.exits.len(),
            expected_profit_amount = %plan.expected_profit_amount,
            "Take-profit plan computed"
        );
        Ok(plan)
    }

    fn buy_trade(&self, trade_id: i64) -> Result<Trade> {
        let trade = self.trade(trade_id)?;
        if !trade.is_buy() {
            return Err(JournalError::InvalidOperation(format!(
                "trade {trade_id} is a sell; take-profit targets belong to buy trades"
            )));
        }
        Ok(trade)
    }
}

fn build_plan(trade: &Trade, expectation: &ProfitExpectation) -> Result<TakeProfitPlan> {
    let out_of_range = |what: &str| {
        JournalError::CorruptRecord(format!("{what} out of range for trade {}", trade.id))
    };
    let quantity = Decimal::from(trade.quantity);
    let position_cost = trade
        .price
        .checked_mul(quantity)
        .ok_or_else(|| out_of_range("position cost"))?;

    let exits = expectation
        .targets
        .iter()
        .map(|p| -> Result<PlannedExit> {
            let shares = quantity
                .checked_mul(p.sell_ratio)
                .map(|s| s.floor())
                .and_then(|s| s.to_i64())
                .ok_or_else(|| out_of_range("share count"))?;
            let exit_price = match p.target_price {
                Some(price) => price,
                None => Decimal::ONE
                    .checked_add(p.profit_ratio)
                    .and_then(|growth| trade.price.checked_mul(growth))
                    .ok_or_else(|| out_of_range("exit price"))?,
            };
            Ok(PlannedExit {
                sequence_order: p.sequence_order,
                exit_price,
                profit_ratio: p.profit_ratio,
                sell_ratio: p.sell_ratio,
                shares,
                expected_profit_amount: position_cost
                    .checked_mul(p.expected_profit_ratio)
                    .ok_or_else(|| out_of_range("expected profit"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TakeProfitPlan {
        trade_id: trade.id,
        stock_code: trade.stock_code.clone(),
        buy_price: trade.price,
        quantity: trade.quantity,
        batch: trade.use_batch_take_profit,
        exits,
        total_sell_ratio: expectation.total_sell_ratio,
        total_expected_profit_ratio: expectation.total_expected_profit_ratio,
        expected_profit_amount: position_cost
            .checked_mul(expectation.total_expected_profit_ratio)
            .ok_or_else(|| out_of_range("expected profit"))?,
    })
}
