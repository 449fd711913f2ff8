//! Holdings and profit/loss derived from the trade history.
//!
//! Average-cost method:
//!     buy:  cost_basis += price * qty + commission
//!     sell: realized   += (price - avg_cost) * held - commission
//!           cost_basis -= avg_cost * held
//!
//! where avg_cost = cost_basis / quantity and held = min(sell qty, quantity).
//! Money totals saturate at the Decimal range.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::data::models::{Trade, TradeSide};

/// Position and realized result for one stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub stock_code: String,
    pub stock_name: String,
    pub quantity: i64,
    pub cost_basis: Decimal,
    pub realized_pnl: Decimal,
    pub total_commission: Decimal,
    pub winning_sells: u64,
    pub losing_sells: u64,
    pub last_trade_date: Option<NaiveDate>,
}

impl Holding {
    fn new(stock_code: &str, stock_name: &str) -> Self {
        Self {
            stock_code: stock_code.to_string(),
            stock_name: stock_name.to_string(),
            quantity: 0,
            cost_basis: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            winning_sells: 0,
            losing_sells: 0,
            last_trade_date: None,
        }
    }

    pub fn avg_cost(&self) -> Decimal {
        if self.quantity > 0 {
            self.cost_basis
                .checked_div(Decimal::from(self.quantity))
                .unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        price.saturating_mul(Decimal::from(self.quantity))
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        self.market_value(price).saturating_sub(self.cost_basis)
    }
}

/// A sell that exceeds the shares held on its trade date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Oversell {
    pub trade_id: i64,
    pub stock_code: String,
    pub trade_date: NaiveDate,
    pub quantity: i64,
    pub held: i64,
}

/// Totals across the whole journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub open_positions: usize,
    pub total_cost_basis: Decimal,
    pub total_market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub winning_sells: u64,
    pub losing_sells: u64,
    pub win_rate: Decimal,
    /// Open positions with no mark price, valued at cost.
    pub unpriced: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    positions: BTreeMap<String, Holding>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay trades in trade-date order (ties broken by id).
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut portfolio = Self::new();
        for trade in replay_order(trades) {
            portfolio.apply(trade);
        }
        portfolio
    }

    /// First sell, in replay order, that sells more than was held at that point.
    pub fn first_oversell(trades: &[Trade]) -> Option<Oversell> {
        let mut held: HashMap<&str, i64> = HashMap::new();
        for trade in replay_order(trades) {
            let position = held.entry(trade.stock_code.as_str()).or_insert(0);
            match trade.side {
                TradeSide::Buy => *position = position.saturating_add(trade.quantity),
                TradeSide::Sell if trade.quantity > *position => {
                    return Some(Oversell {
                        trade_id: trade.id,
                        stock_code: trade.stock_code.clone(),
                        trade_date: trade.trade_date,
                        quantity: trade.quantity,
                        held: *position,
                    });
                }
                TradeSide::Sell => *position -= trade.quantity,
            }
        }
        None
    }

    pub fn apply(&mut self, trade: &Trade) {
        let holding = self
            .positions
            .entry(trade.stock_code.clone())
            .or_insert_with(|| Holding::new(&trade.stock_code, &trade.stock_name));

        if holding.stock_name.is_empty() && !trade.stock_name.is_empty() {
            holding.stock_name = trade.stock_name.clone();
        }
        holding.total_commission = holding.total_commission.saturating_add(trade.commission);
        holding.last_trade_date = Some(trade.trade_date);

        match trade.side {
            TradeSide::Buy => {
                holding.cost_basis = holding
                    .cost_basis
                    .saturating_add(trade.amount().saturating_add(trade.commission));
                holding.quantity = holding.quantity.saturating_add(trade.quantity);
            }
            TradeSide::Sell => {
                let held = trade.quantity.min(holding.quantity);
                if held < trade.quantity {
                    warn!(
                        trade_id = trade.id,
                        stock_code = %trade.stock_code,
                        sell_quantity = trade.quantity,
                        held = holding.quantity,
                        "Sell exceeds holding; only the held part is realized"
                    );
                }

                let avg_cost = holding.avg_cost();
                let pnl = trade
                    .price
                    .saturating_sub(avg_cost)
                    .saturating_mul(Decimal::from(held))
                    .saturating_sub(trade.commission);
                holding.realized_pnl = holding.realized_pnl.saturating_add(pnl);
                if pnl > Decimal::ZERO {
                    holding.winning_sells += 1;
                } else if pnl < Decimal::ZERO {
                    holding.losing_sells += 1;
                }

                holding.quantity -= held;
                if holding.quantity == 0 {
                    holding.cost_basis = Decimal::ZERO;
                } else {
                    holding.cost_basis = holding
                        .cost_basis
                        .saturating_sub(avg_cost.saturating_mul(Decimal::from(held)));
                }
            }
        }
    }

    pub fn holding(&self, stock_code: &str) -> Option<&Holding> {
        self.positions.get(stock_code)
    }

    pub fn quantity(&self, stock_code: &str) -> i64 {
        self.holding(stock_code).map(|h| h.quantity).unwrap_or(0)
    }

    /// Open positions, sorted by stock code.
    pub fn holdings(&self) -> Vec<&Holding> {
        self.positions.values().filter(|h| h.is_open()).collect()
    }

    /// Fully closed positions, sorted by stock code.
    pub fn closed(&self) -> Vec<&Holding> {
        self.positions.values().filter(|h| !h.is_open()).collect()
    }

    pub fn total_realized_pnl(&self) -> Decimal {
        self.positions
            .values()
            .fold(Decimal::ZERO, |acc, h| acc.saturating_add(h.realized_pnl))
    }

    pub fn summary(&self, marks: &HashMap<String, Decimal>) -> PortfolioSummary {
        let mut total_cost_basis = Decimal::ZERO;
        let mut total_market_value = Decimal::ZERO;
        let mut unpriced = Vec::new();

        for h in self.holdings() {
            total_cost_basis = total_cost_basis.saturating_add(h.cost_basis);
            match marks.get(&h.stock_code) {
                Some(price) => {
                    total_market_value = total_market_value.saturating_add(h.market_value(*price))
                }
                None => {
                    total_market_value = total_market_value.saturating_add(h.cost_basis);
                    unpriced.push(h.stock_code.clone());
                }
            }
        }

        let winning_sells: u64 = self.positions.values().map(|h| h.winning_sells).sum();
        let losing_sells: u64 = self.positions.values().map(|h| h.losing_sells).sum();
        let decided = winning_sells + losing_sells;
        let win_rate = if decided > 0 {
            Decimal::from(winning_sells) / Decimal::from(decided)
        } else {
            Decimal::ZERO
        };

        let unrealized_pnl = total_market_value.saturating_sub(total_cost_basis);
        let realized_pnl = self.total_realized_pnl();

        PortfolioSummary {
            open_positions: self.holdings().len(),
            total_cost_basis,
            total_market_value,
            unrealized_pnl,
            realized_pnl,
            total_pnl: unrealized_pnl.saturating_add(realized_pnl),
            winning_sells,
            losing_sells,
            win_rate,
            unpriced,
        }
    }
}

fn replay_order(trades: &[Trade]) -> Vec<&Trade> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| (t.trade_date, t.id));
    ordered
}
