//! Batch take-profit validation and expected-profit formula tests.
//!
//! Every expected value carries a hand calculation in a comment so a formula
//! regression shows up before it mislabels a real position.
//!
//! Modules under test:
//!   1. Expected profit calculator  (src/take_profit/calculator.rs)
//!   2. Cumulative ratio validation (src/take_profit/validator.rs)
//!   3. Buy-price validation        (src/take_profit/validator.rs)
//!   4. Properties                  (order independence, ceilings, tolerance)

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use trade_journal::data::models::ProfitTargetInput;
use trade_journal::take_profit::{
    calculate_expected_profit, TakeProfitLimits, TakeProfitValidator,
};

// =============================================================================
// Helpers
// =============================================================================

fn price_target(price: Decimal, sell: Decimal, order: i64) -> ProfitTargetInput {
    ProfitTargetInput::at_price(price, sell, order)
}

fn ratio_target(ratio: Decimal, sell: Decimal, order: i64) -> ProfitTargetInput {
    ProfitTargetInput::at_ratio(ratio, sell, order)
}

fn both_target(price: Decimal, ratio: Decimal, sell: Decimal, order: i64) -> ProfitTargetInput {
    ProfitTargetInput {
        target_price: Some(price),
        profit_ratio: Some(ratio),
        sell_ratio: sell,
        sequence_order: order,
    }
}

/// The three-tranche plan used throughout: 30% at 11, 40% at 12, 30% at +30%.
fn three_tranche_plan() -> Vec<ProfitTargetInput> {
    vec![
        price_target(dec!(11.00), dec!(0.30), 1),
        price_target(dec!(12.00), dec!(0.40), 2),
        ratio_target(dec!(0.30), dec!(0.30), 3),
    ]
}

// =============================================================================
// 1. Expected profit calculator
// =============================================================================

#[test]
fn expected_profit_hand_verified_three_tranches() {
    // Hand calculation (buy = 10.00):
    //   t1: (11 - 10) / 10 = 0.10 * 0.30 = 0.03
    //   t2: (12 - 10) / 10 = 0.20 * 0.40 = 0.08
    //   t3: 0.30 (given)          * 0.30 = 0.09
    //   total expected = 0.20, total sell = 1.00
    let result = calculate_expected_profit(dec!(10.00), &three_tranche_plan());

    assert_eq!(result.total_sell_ratio, dec!(1.00));
    assert_eq!(result.total_expected_profit_ratio, dec!(0.20));

    let t1 = result.projection(1).unwrap();
    assert_eq!(t1.profit_ratio, dec!(0.10));
    assert_eq!(t1.expected_profit_ratio, dec!(0.03));
    assert!(t1.derived_from_price);

    let t3 = result.projection(3).unwrap();
    assert_eq!(t3.expected_profit_ratio, dec!(0.09));
    assert!(!t3.derived_from_price);

    assert_eq!(result.remaining_sell_ratio(), Decimal::ZERO);
}

#[test]
fn expected_profit_partial_plan_leaves_remainder() {
    // buy = 20, one target at 25 for half the position:
    //   (25 - 20) / 20 = 0.25 * 0.5 = 0.125
    //   remaining = 1 - 0.5 = 0.5
    let targets = vec![price_target(dec!(25), dec!(0.5), 1)];
    let result = calculate_expected_profit(dec!(20), &targets);
    assert_eq!(result.total_expected_profit_ratio, dec!(0.125));
    assert_eq!(result.remaining_sell_ratio(), dec!(0.5));
}

#[test]
fn expected_profit_is_idempotent() {
    let targets = three_tranche_plan();
    let first = calculate_expected_profit(dec!(10), &targets);
    let second = calculate_expected_profit(dec!(10), &targets);
    assert_eq!(first, second);
}

#[test]
fn expected_profit_empty_plan_is_zero() {
    let result = calculate_expected_profit(dec!(10), &[]);
    assert!(result.targets.is_empty());
    assert_eq!(result.total_expected_profit_ratio, Decimal::ZERO);
    assert_eq!(result.total_sell_ratio, Decimal::ZERO);
}

// =============================================================================
// 2. Cumulative ratio validation
// =============================================================================

#[test]
fn total_ratio_accepts_exactly_one_hundred_percent() {
    let v = TakeProfitValidator::default();
    assert!(v.validate_total_ratio(&three_tranche_plan()).is_ok());
}

#[test]
fn total_ratio_rejects_one_hundred_ten_percent() {
    // 0.40 + 0.40 + 0.30 = 1.10 > 1.00
    let v = TakeProfitValidator::default();
    let targets = vec![
        price_target(dec!(11), dec!(0.40), 1),
        price_target(dec!(12), dec!(0.40), 2),
        price_target(dec!(13), dec!(0.30), 3),
    ];
    let err = v.validate_total_ratio(&targets).unwrap_err();
    assert!(err.references("total_sell_ratio"));
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].target_index, None);
}

#[test]
fn total_ratio_allows_single_override_but_not_the_sum() {
    // A single target may carry 150% on its own, but the sum still caps at 100%.
    let v = TakeProfitValidator::default();
    let err = v
        .validate_total_ratio(&[price_target(dec!(11), dec!(1.5), 1)])
        .unwrap_err();
    assert!(err.references("total_sell_ratio"));
    assert!(!err.references("sell_ratio"));
}

#[test]
fn total_ratio_rejects_empty_list() {
    let v = TakeProfitValidator::default();
    let err = v.validate_total_ratio(&[]).unwrap_err();
    assert!(err.references("targets"));
}

#[test]
fn total_ratio_itemizes_every_bad_target() {
    let v = TakeProfitValidator::default();
    let targets = vec![
        // sell ratio zero
        price_target(dec!(11), dec!(0), 1),
        // profit ratio negative
        ratio_target(dec!(-0.1), dec!(0.2), 2),
        // sequence order not positive
        price_target(dec!(12), dec!(0.2), 0),
        // duplicate sequence order 2
        price_target(dec!(13), dec!(0.2), 2),
        // sell ratio above 1000%
        price_target(dec!(14), dec!(10.5), 5),
    ];
    let err = v.validate_total_ratio(&targets).unwrap_err();

    let fields_for = |i: usize| -> Vec<String> {
        err.issues_for_target(i).iter().map(|f| f.field.clone()).collect()
    };
    assert_eq!(fields_for(0), vec!["sell_ratio"]);
    assert_eq!(fields_for(1), vec!["profit_ratio"]);
    assert_eq!(fields_for(2), vec!["sequence_order"]);
    assert_eq!(fields_for(3), vec!["sequence_order"]);
    assert_eq!(fields_for(4), vec!["sell_ratio"]);
    // 0.2 + 0.2 + 0.2 + 10.5 = 11.1 > 1
    assert!(err.references("total_sell_ratio"));
}

#[test]
fn total_ratio_requires_price_or_ratio() {
    let v = TakeProfitValidator::default();
    let targets = vec![ProfitTargetInput {
        target_price: None,
        profit_ratio: None,
        sell_ratio: dec!(0.5),
        sequence_order: 1,
    }];
    let err = v.validate_total_ratio(&targets).unwrap_err();
    assert_eq!(err.issues_for_target(0)[0].field, "target_price");
}

#[test]
fn profit_ratio_bounds_are_inclusive() {
    // 0% and 1000% are both allowed.
    let v = TakeProfitValidator::default();
    let targets = vec![
        ratio_target(dec!(0), dec!(0.5), 1),
        ratio_target(dec!(10), dec!(0.5), 2),
    ];
    assert!(v.validate_total_ratio(&targets).is_ok());
}

#[test]
fn total_ratio_overflow_is_reported_not_panicked() {
    // MAX + MAX does not fit in a Decimal.
    let v = TakeProfitValidator::default();
    let targets = vec![
        ratio_target(dec!(0.1), Decimal::MAX, 1),
        ratio_target(dec!(0.2), Decimal::MAX, 2),
    ];
    let err = v.validate_total_ratio(&targets).unwrap_err();
    assert_eq!(err.issues_for_target(0)[0].field, "sell_ratio");
    assert_eq!(err.issues_for_target(1)[0].field, "sell_ratio");
    assert!(err.references("total_sell_ratio"));
    assert!(err.to_string().contains("overflows"));
}

#[test]
fn extreme_single_sell_ratio_is_reported() {
    // 1e28 fits, but 1e28 * 100 for the percent text does not.
    let v = TakeProfitValidator::default();
    let huge = Decimal::from_i128_with_scale(10i128.pow(28), 0);
    let err = v
        .validate_total_ratio(&[ratio_target(dec!(0.1), huge, 1)])
        .unwrap_err();
    assert!(err.references("sell_ratio"));
    assert!(err.references("total_sell_ratio"));
}

// =============================================================================
// 3. Buy-price validation
// =============================================================================

#[test]
fn price_below_buy_price_is_rejected() {
    // buy = 10.00, target = 8.00 -> below buy price
    let v = TakeProfitValidator::default();
    let err = v
        .validate_against_buy_price(dec!(10.00), &[price_target(dec!(8.00), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("target_price"));
    assert_eq!(err.issues()[0].target_index, Some(0));
}

#[test]
fn price_equal_to_buy_price_is_rejected() {
    let v = TakeProfitValidator::default();
    let err = v
        .validate_against_buy_price(dec!(10), &[price_target(dec!(10), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("target_price"));
}

#[test]
fn price_ceiling_is_ten_times_buy_price() {
    // buy = 10 -> ceiling 100. 100 passes, 100.01 fails.
    let v = TakeProfitValidator::default();
    assert!(v
        .validate_against_buy_price(dec!(10), &[price_target(dec!(100), dec!(0.5), 1)])
        .is_ok());
    let err = v
        .validate_against_buy_price(dec!(10), &[price_target(dec!(100.01), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("target_price"));
}

#[test]
fn price_and_ratio_must_agree_within_five_percent() {
    // buy = 10, price = 12 -> implied 0.20
    //   ratio 0.25: |0.20 - 0.25| = 0.05 -> ok (boundary)
    //   ratio 0.26: |0.20 - 0.26| = 0.06 -> reject
    //   ratio 0.15: |0.20 - 0.15| = 0.05 -> ok
    let v = TakeProfitValidator::default();
    let ok = vec![
        both_target(dec!(12), dec!(0.25), dec!(0.3), 1),
        both_target(dec!(12), dec!(0.15), dec!(0.3), 2),
    ];
    assert!(v.validate_against_buy_price(dec!(10), &ok).is_ok());

    let err = v
        .validate_against_buy_price(dec!(10), &[both_target(dec!(12), dec!(0.26), dec!(0.3), 1)])
        .unwrap_err();
    assert!(err.references("profit_ratio"));
    assert!(!err.references("target_price"));
}

#[test]
fn buy_price_violations_are_aggregated() {
    let v = TakeProfitValidator::default();
    let targets = vec![
        price_target(dec!(8), dec!(0.2), 1),
        price_target(dec!(11), dec!(0.2), 2),
        price_target(dec!(500), dec!(0.2), 3),
        both_target(dec!(15), dec!(0.9), dec!(0.2), 4),
    ];
    let err = v.validate_against_buy_price(dec!(10), &targets).unwrap_err();
    assert_eq!(err.issues().len(), 3);
    assert!(err.issues_for_target(1).is_empty());
    assert_eq!(err.issues_for_target(3)[0].field, "profit_ratio");
}

#[test]
fn non_positive_buy_price_is_rejected() {
    let v = TakeProfitValidator::default();
    let err = v
        .validate_against_buy_price(dec!(0), &three_tranche_plan())
        .unwrap_err();
    assert!(err.references("buy_price"));
}

#[test]
fn validate_merges_both_passes() {
    // Sum 1.2 and a price below buy: both issues come back together.
    let v = TakeProfitValidator::default();
    let targets = vec![
        price_target(dec!(9), dec!(0.6), 1),
        price_target(dec!(12), dec!(0.6), 2),
    ];
    let err = v.validate(dec!(10), &targets).unwrap_err();
    assert!(err.references("total_sell_ratio"));
    assert!(err.references("target_price"));
}

#[test]
fn custom_limits_tighten_tolerance_and_ceiling() {
    let v = TakeProfitValidator::new(TakeProfitLimits {
        max_target_ratio: dec!(10),
        max_price_multiple: dec!(2),
        price_ratio_tolerance: dec!(0.01),
    });
    // implied 0.20 vs 0.22 -> 0.02 > 0.01
    let err = v
        .validate_against_buy_price(dec!(10), &[both_target(dec!(12), dec!(0.22), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("profit_ratio"));
    // 25 > 2 * 10
    let err = v
        .validate_against_buy_price(dec!(10), &[price_target(dec!(25), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("target_price"));
}

#[test]
fn price_ceiling_past_decimal_range_is_unbounded() {
    // 10 * (MAX / 5) overflows, so no ceiling applies.
    let v = TakeProfitValidator::default();
    let buy = Decimal::MAX / dec!(5);
    let target = Decimal::MAX / dec!(4);
    assert!(v
        .validate_against_buy_price(buy, &[price_target(target, dec!(0.5), 1)])
        .is_ok());

    let err = v
        .validate_against_buy_price(buy, &[price_target(dec!(1), dec!(0.5), 1)])
        .unwrap_err();
    assert!(err.references("target_price"));

    let expectation = calculate_expected_profit(buy, &[price_target(target, dec!(0.5), 1)]);
    assert!(expectation.total_expected_profit_ratio > Decimal::ZERO);
}

#[test]
fn extreme_inputs_never_panic() {
    let v = TakeProfitValidator::default();
    let targets = vec![
        both_target(Decimal::MAX, Decimal::MAX, Decimal::MAX, 1),
        both_target(Decimal::MIN, Decimal::MIN, Decimal::MAX, 2),
    ];
    for buy in [Decimal::MAX, Decimal::MAX / dec!(5), dec!(0.0000001)] {
        assert!(v.validate(buy, &targets).is_err());
        let _ = calculate_expected_profit(buy, &targets);
    }
}

// =============================================================================
// 4. Properties
// =============================================================================

fn arb_targets() -> impl Strategy<Value = Vec<ProfitTargetInput>> {
    // Sell ratios up to 12.5% each and at most 8 targets: sum <= 100%.
    prop::collection::vec((1i64..=1250, 0i64..=50_000, any::<bool>()), 1..=8).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (sell_bps, profit_bps, by_price))| {
                let sell = Decimal::new(sell_bps, 4);
                let profit = Decimal::new(profit_bps, 4);
                if by_price {
                    // buy = 10 -> price = 10 * (1 + profit), kept strictly above buy.
                    price_target(dec!(10) * (Decimal::ONE + profit) + dec!(0.01), sell, i as i64 + 1)
                } else {
                    ratio_target(profit, sell, i as i64 + 1)
                }
            })
            .collect()
    })
}

proptest! {
    /// Shuffling the input does not change the totals.
    #[test]
    fn totals_are_order_independent(targets in arb_targets(), rotate in 0usize..8) {
        let forward = calculate_expected_profit(dec!(10), &targets);

        let mut shuffled = targets.clone();
        shuffled.reverse();
        let k = rotate % shuffled.len();
        shuffled.rotate_left(k);
        let permuted = calculate_expected_profit(dec!(10), &shuffled);

        prop_assert_eq!(forward.total_expected_profit_ratio, permuted.total_expected_profit_ratio);
        prop_assert_eq!(forward.total_sell_ratio, permuted.total_sell_ratio);
        prop_assert_eq!(forward.targets, permuted.targets);
    }

    /// Lists within the ceiling pass; topping them above 100% fails.
    #[test]
    fn sell_ratio_ceiling_holds(targets in arb_targets()) {
        let v = TakeProfitValidator::default();
        let total: Decimal = targets.iter().map(|t| t.sell_ratio).sum();
        prop_assert!(total <= Decimal::ONE);
        prop_assert!(v.validate_total_ratio(&targets).is_ok());

        let mut over = targets.clone();
        let extra = Decimal::ONE - total + dec!(0.0001);
        over.push(ratio_target(dec!(0.1), extra, over.len() as i64 + 1));
        let err = v.validate_total_ratio(&over).unwrap_err();
        prop_assert!(err.references("total_sell_ratio"));
    }

    /// Price/ratio pairs pass exactly when they agree within 0.05.
    #[test]
    fn price_ratio_tolerance_holds(price_cents in 1001i64..=3000, ratio_bps in 0i64..=30_000) {
        let v = TakeProfitValidator::default();
        let buy = dec!(10);
        let price = Decimal::new(price_cents, 2);
        let ratio = Decimal::new(ratio_bps, 4);
        let implied = (price - buy) / buy;

        let result = v.validate_against_buy_price(buy, &[both_target(price, ratio, dec!(0.5), 1)]);
        prop_assert_eq!(result.is_ok(), (implied - ratio).abs() <= dec!(0.05));
    }
}
