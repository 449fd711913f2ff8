//! Batch take-profit validation.
//!
//! Rules:
//! - every sell ratio in (0, max_target_ratio]
//! - every supplied profit ratio in [0, max_target_ratio]
//! - sequence orders positive and unique
//! - the sell ratios of one trade sum to at most 100%
//! - a target price sits in (buy_price, max_price_multiple * buy_price]
//! - when both price and ratio are given they agree within the tolerance
//!
//! Every violation is collected; nothing fails fast.

use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

use crate::data::models::ProfitTargetInput;
use crate::errors::ValidationError;

use super::calculator::implied_profit_ratio;

/// Cumulative sell-ratio ceiling for one trade (100%).
pub const MAX_TOTAL_SELL_RATIO: Decimal = Decimal::ONE;

/// Tunable bounds for target validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TakeProfitLimits {
    /// Per-target ceiling for sell and profit ratios (10 = 1000%).
    pub max_target_ratio: Decimal,
    /// Target price may not exceed this multiple of the buy price.
    pub max_price_multiple: Decimal,
    /// Allowed absolute gap between a supplied ratio and the price-implied one.
    pub price_ratio_tolerance: Decimal,
}

impl Default for TakeProfitLimits {
    fn default() -> Self {
        Self {
            max_target_ratio: Decimal::TEN,
            max_price_multiple: Decimal::TEN,
            price_ratio_tolerance: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TakeProfitValidator {
    limits: TakeProfitLimits,
}

impl TakeProfitValidator {
    pub fn new(limits: TakeProfitLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &TakeProfitLimits {
        &self.limits
    }

    /// Per-target ratio checks plus the cumulative sell-ratio ceiling.
    pub fn validate_total_ratio(&self, targets: &[ProfitTargetInput]) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();

        if targets.is_empty() {
            err.push(None, "targets", "at least one take-profit target is required");
            return Err(err);
        }

        let max = self.limits.max_target_ratio;
        // None once the running sum no longer fits in a Decimal.
        let mut total = Some(Decimal::ZERO);
        let mut seen_orders = HashSet::new();

        for (i, t) in targets.iter().enumerate() {
            if t.sell_ratio <= Decimal::ZERO {
                err.push(
                    Some(i),
                    "sell_ratio",
                    format!("sell ratio must be greater than 0, got {}", percent(t.sell_ratio)),
                );
            } else if t.sell_ratio > max {
                err.push(
                    Some(i),
                    "sell_ratio",
                    format!(
                        "sell ratio must not exceed {}, got {}",
                        percent(max),
                        percent(t.sell_ratio)
                    ),
                );
            }
            if t.sell_ratio > Decimal::ZERO {
                total = total.and_then(|sum| sum.checked_add(t.sell_ratio));
            }

            if let Some(ratio) = t.profit_ratio {
                if ratio < Decimal::ZERO || ratio > max {
                    err.push(
                        Some(i),
                        "profit_ratio",
                        format!(
                            "profit ratio must be between 0% and {}, got {}",
                            percent(max),
                            percent(ratio)
                        ),
                    );
                }
            }

            if t.sequence_order <= 0 {
                err.push(
                    Some(i),
                    "sequence_order",
                    format!("sequence order must be a positive integer, got {}", t.sequence_order),
                );
            } else if !seen_orders.insert(t.sequence_order) {
                err.push(
                    Some(i),
                    "sequence_order",
                    format!("sequence order {} is used more than once", t.sequence_order),
                );
            }

            if t.target_price.is_none() && t.profit_ratio.is_none() {
                err.push(
                    Some(i),
                    "target_price",
                    "either a target price or a profit ratio is required",
                );
            }
        }

        match total {
            Some(total) if total > MAX_TOTAL_SELL_RATIO => err.push(
                None,
                "total_sell_ratio",
                format!(
                    "total sell ratio {} exceeds {}",
                    percent(total),
                    percent(MAX_TOTAL_SELL_RATIO)
                ),
            ),
            Some(_) => {}
            None => err.push(
                None,
                "total_sell_ratio",
                format!(
                    "total sell ratio overflows; it must not exceed {}",
                    percent(MAX_TOTAL_SELL_RATIO)
                ),
            ),
        }

        debug!(
            targets = targets.len(),
            total_sell_ratio = ?total,
            issues = err.issues().len(),
            "Checked take-profit ratios"
        );

        err.into_result()
    }

    /// Price sanity and price/ratio consistency against a buy price.
    pub fn validate_against_buy_price(
        &self,
        buy_price: Decimal,
        targets: &[ProfitTargetInput],
    ) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();

        if buy_price <= Decimal::ZERO {
            err.push(None, "buy_price", format!("buy price must be positive, got {buy_price}"));
            return Err(err);
        }

        // No upper bound when the ceiling itself is past the Decimal range.
        let ceiling = buy_price.checked_mul(self.limits.max_price_multiple);

        for (i, t) in targets.iter().enumerate() {
            let Some(price) = t.target_price else {
                continue;
            };

            if price <= buy_price {
                err.push(
                    Some(i),
                    "target_price",
                    format!("target price {price} must be above the buy price {buy_price}"),
                );
                continue;
            }
            if let Some(ceiling) = ceiling.filter(|c| price > *c) {
                err.push(
                    Some(i),
                    "target_price",
                    format!(
                        "target price {price} exceeds {}x the buy price ({ceiling})",
                        self.limits.max_price_multiple.normalize()
                    ),
                );
                continue;
            }

            if let (Some(ratio), Some(implied)) =
                (t.profit_ratio, implied_profit_ratio(buy_price, price))
            {
                let within = implied
                    .checked_sub(ratio)
                    .is_some_and(|gap| gap.abs() <= self.limits.price_ratio_tolerance);
                if !within {
                    err.push(
                        Some(i),
                        "profit_ratio",
                        format!(
                            "profit ratio {} does not match target price {price} (implies {})",
                            percent(ratio),
                            percent(implied.round_dp(4))
                        ),
                    );
                }
            }
        }

        err.into_result()
    }

    /// Run every check and report all issues together.
    pub fn validate(
        &self,
        buy_price: Decimal,
        targets: &[ProfitTargetInput],
    ) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        if let Err(e) = self.validate_total_ratio(targets) {
            err.merge(e);
        }
        if let Err(e) = self.validate_against_buy_price(buy_price, targets) {
            err.merge(e);
        }
        err.into_result()
    }
}

fn percent(ratio: Decimal) -> String {
    match ratio.checked_mul(Decimal::ONE_HUNDRED) {
        Some(pct) => format!("{}%", pct.normalize()),
        None => format!("{} (as a ratio)", ratio.normalize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_formatting() {
        assert_eq!(percent(Decimal::new(110, 2)), "110%");
        assert_eq!(percent(Decimal::new(125, 3)), "12.5%");
        assert_eq!(percent(Decimal::MAX), format!("{} (as a ratio)", Decimal::MAX));
    }

    #[test]
    fn test_price_failure_skips_ratio_check() {
        // Price below buy: only the price issue is reported for this target.
        let v = TakeProfitValidator::default();
        let targets = vec![ProfitTargetInput {
            target_price: Some(Decimal::new(8, 0)),
            profit_ratio: Some(Decimal::new(5, 1)),
            sell_ratio: Decimal::new(5, 1),
            sequence_order: 1,
        }];
        let err = v.validate_against_buy_price(Decimal::TEN, &targets).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].field, "target_price");
    }
}
