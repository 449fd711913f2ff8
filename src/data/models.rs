//! Core data models for the trade journal.
//!
//! These models are shared by the storage layer, the take-profit validator
//! and the CLI. All prices and ratios are `Decimal`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(format!("Invalid trade side: {s}")),
        }
    }
}

/// What the trader decided to do with the position after reviewing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Hold,
    Add,
    Reduce,
    Exit,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Add => "add",
            Self::Reduce => "reduce",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hold" => Ok(Self::Hold),
            "add" => Ok(Self::Add),
            "reduce" => Ok(Self::Reduce),
            "exit" => Ok(Self::Exit),
            _ => Err(format!("Invalid review decision: {s}")),
        }
    }
}

// =============================================================================
// Trade Models
// =============================================================================

/// Upper bound for a single take-profit ratio (1000%).
const MAX_TAKE_PROFIT_RATIO: Decimal = Decimal::TEN;

/// A recorded buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub stock_code: String,
    pub stock_name: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub quantity: i64,
    pub commission: Decimal,
    pub trade_date: NaiveDate,
    pub take_profit_ratio: Option<Decimal>,
    pub stop_loss_ratio: Option<Decimal>,
    pub use_batch_take_profit: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    /// Gross traded amount, excluding commission. Saturates at the Decimal range.
    pub fn amount(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.side == TradeSide::Sell
    }
}

/// User-submitted trade fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub stock_code: String,
    #[serde(default)]
    pub stock_name: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub quantity: i64,
    #[serde(default)]
    pub commission: Decimal,
    pub trade_date: NaiveDate,
    #[serde(default)]
    pub take_profit_ratio: Option<Decimal>,
    #[serde(default)]
    pub stop_loss_ratio: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

impl NewTrade {
    /// Check field-level rules, collecting every problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();

        if self.stock_code.trim().is_empty() {
            err.push(None, "stock_code", "stock code is required");
        }
        if self.price <= Decimal::ZERO {
            err.push(None, "price", format!("price must be positive, got {}", self.price));
        }
        if self.quantity <= 0 {
            err.push(
                None,
                "quantity",
                format!("quantity must be a positive integer, got {}", self.quantity),
            );
        }
        if self.commission < Decimal::ZERO {
            err.push(None, "commission", "commission cannot be negative");
        }
        if self.price > Decimal::ZERO && self.quantity > 0 {
            let total = self
                .price
                .checked_mul(Decimal::from(self.quantity))
                .and_then(|amount| amount.checked_add(self.commission.max(Decimal::ZERO)));
            if total.is_none() {
                err.push(
                    None,
                    "price",
                    format!(
                        "price {} times quantity {} is out of range",
                        self.price, self.quantity
                    ),
                );
            }
        }
        if let Some(tp) = self.take_profit_ratio {
            if tp <= Decimal::ZERO || tp > MAX_TAKE_PROFIT_RATIO {
                err.push(
                    None,
                    "take_profit_ratio",
                    format!("take-profit ratio must be in (0, 10], got {tp}"),
                );
            }
        }
        if let Some(sl) = self.stop_loss_ratio {
            if sl <= Decimal::ZERO || sl >= Decimal::ONE {
                err.push(
                    None,
                    "stop_loss_ratio",
                    format!("stop-loss ratio must be in (0, 1), got {sl}"),
                );
            }
        }

        err.into_result()
    }
}

// =============================================================================
// Profit Target Models
// =============================================================================

/// One tranche of a batch take-profit plan, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitTargetInput {
    #[serde(default)]
    pub target_price: Option<Decimal>,
    #[serde(default)]
    pub profit_ratio: Option<Decimal>,
    pub sell_ratio: Decimal,
    pub sequence_order: i64,
}

impl ProfitTargetInput {
    pub fn at_price(target_price: Decimal, sell_ratio: Decimal, sequence_order: i64) -> Self {
        Self {
            target_price: Some(target_price),
            profit_ratio: None,
            sell_ratio,
            sequence_order,
        }
    }

    pub fn at_ratio(profit_ratio: Decimal, sell_ratio: Decimal, sequence_order: i64) -> Self {
        Self {
            target_price: None,
            profit_ratio: Some(profit_ratio),
            sell_ratio,
            sequence_order,
        }
    }
}

/// A stored take-profit target belonging to one buy trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitTarget {
    pub id: i64,
    pub trade_id: i64,
    pub target_price: Option<Decimal>,
    pub profit_ratio: Option<Decimal>,
    pub sell_ratio: Decimal,
    pub sequence_order: i64,
    pub expected_profit_ratio: Decimal,
    pub created_at: DateTime<Utc>,
}

impl ProfitTarget {
    pub fn as_input(&self) -> ProfitTargetInput {
        ProfitTargetInput {
            target_price: self.target_price,
            profit_ratio: self.profit_ratio,
            sell_ratio: self.sell_ratio,
            sequence_order: self.sequence_order,
        }
    }
}

// =============================================================================
// Review Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    pub decision: ReviewDecision,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub lessons: String,
}

impl ReviewInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        if !(1..=5).contains(&self.rating) {
            err.push(
                None,
                "rating",
                format!("rating must be between 1 and 5, got {}", self.rating),
            );
        }
        err.into_result()
    }
}

/// Post-trade review. One per trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReview {
    pub id: i64,
    pub trade_id: i64,
    pub rating: i64,
    pub decision: ReviewDecision,
    pub summary: String,
    pub lessons: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
