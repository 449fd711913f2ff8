pub mod calculator;
pub mod validator;

pub use calculator::{calculate_expected_profit, implied_profit_ratio, ProfitExpectation, TargetProjection};
pub use validator::{TakeProfitLimits, TakeProfitValidator, MAX_TOTAL_SELL_RATIO};
