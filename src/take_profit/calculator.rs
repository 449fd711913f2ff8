//! Expected-profit calculation for a batch take-profit plan.
//!
//! For a buy at price B and a target at price T:
//!     profit_ratio = (T - B) / B
//!
//! Each tranche contributes:
//!     expected_profit_ratio = profit_ratio * sell_ratio
//!
//! and the plan totals are plain sums, so they do not depend on the order
//! the targets were submitted in. Products and sums saturate at the Decimal
//! range; validated plans never get close to it.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::data::models::ProfitTargetInput;

/// Per-target breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetProjection {
    pub sequence_order: i64,
    pub target_price: Option<Decimal>,
    /// Ratio actually used: supplied, else derived from the price, else zero.
    pub profit_ratio: Decimal,
    pub sell_ratio: Decimal,
    pub expected_profit_ratio: Decimal,
    /// True when `profit_ratio` was computed from `target_price`.
    pub derived_from_price: bool,
}

/// Result of [`calculate_expected_profit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitExpectation {
    pub targets: Vec<TargetProjection>,
    pub total_expected_profit_ratio: Decimal,
    pub total_sell_ratio: Decimal,
}

impl ProfitExpectation {
    pub fn projection(&self, sequence_order: i64) -> Option<&TargetProjection> {
        self.targets
            .iter()
            .find(|t| t.sequence_order == sequence_order)
    }

    /// Share of the position not committed to any target.
    pub fn remaining_sell_ratio(&self) -> Decimal {
        Decimal::ONE
            .saturating_sub(self.total_sell_ratio)
            .max(Decimal::ZERO)
    }
}

/// Price appreciation of `target_price` over `buy_price`.
///
/// Returns None for a non-positive buy price, or when the ratio does not fit
/// in a Decimal.
pub fn implied_profit_ratio(buy_price: Decimal, target_price: Decimal) -> Option<Decimal> {
    if buy_price <= Decimal::ZERO {
        return None;
    }
    target_price.checked_sub(buy_price)?.checked_div(buy_price)
}

/// Compute the per-target and total expected profit of a plan.
///
/// Pure function. Targets are reported sorted by `sequence_order`; ties keep
/// their input order.
pub fn calculate_expected_profit(
    buy_price: Decimal,
    targets: &[ProfitTargetInput],
) -> ProfitExpectation {
    let mut projections: Vec<TargetProjection> = targets
        .iter()
        .map(|t| {
            let (profit_ratio, derived_from_price) = match (t.profit_ratio, t.target_price) {
                (Some(ratio), _) => (ratio, false),
                (None, Some(price)) => (
                    implied_profit_ratio(buy_price, price).unwrap_or(Decimal::ZERO),
                    true,
                ),
                (None, None) => (Decimal::ZERO, false),
            };
            TargetProjection {
                sequence_order: t.sequence_order,
                target_price: t.target_price,
                profit_ratio,
                sell_ratio: t.sell_ratio,
                expected_profit_ratio: profit_ratio.saturating_mul(t.sell_ratio),
                derived_from_price,
            }
        })
        .collect();

    projections.sort_by_key(|p| p.sequence_order);

    let total_expected_profit_ratio = projections
        .iter()
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.expected_profit_ratio));
    let total_sell_ratio = projections
        .iter()
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.sell_ratio));

    ProfitExpectation {
        targets: projections,
        total_expected_profit_ratio,
        total_sell_ratio,
    }
}
