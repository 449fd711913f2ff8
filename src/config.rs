//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use crate::take_profit::TakeProfitLimits;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // Storage
    pub database_path: PathBuf,

    // Take-profit validation
    pub price_ratio_tolerance: Decimal,
    pub max_price_multiple: Decimal,
    pub max_target_ratio: Decimal,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let limits = TakeProfitLimits::default();
        Self {
            database_path: PathBuf::from("trade_journal.db"),
            price_ratio_tolerance: limits.price_ratio_tolerance,
            max_price_multiple: limits.max_price_multiple,
            max_target_ratio: limits.max_target_ratio,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            database_path: PathBuf::from(env_str(
                "JOURNAL_DB_PATH",
                &defaults.database_path.to_string_lossy(),
            )),

            price_ratio_tolerance: env_decimal(
                "TP_PRICE_RATIO_TOLERANCE",
                defaults.price_ratio_tolerance,
            ),
            max_price_multiple: env_decimal("TP_MAX_PRICE_MULTIPLE", defaults.max_price_multiple),
            max_target_ratio: env_decimal("TP_MAX_TARGET_RATIO", defaults.max_target_ratio),

            log_level: env_str("LOG_LEVEL", &defaults.log_level),
            log_json: env_bool("LOG_JSON", defaults.log_json),
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database_path.as_os_str().is_empty() {
            errors.push("JOURNAL_DB_PATH must not be empty".to_string());
        }

        if self.price_ratio_tolerance < Decimal::ZERO || self.price_ratio_tolerance >= Decimal::ONE {
            errors.push("TP_PRICE_RATIO_TOLERANCE must be in [0, 1)".to_string());
        }

        if self.max_price_multiple <= Decimal::ONE {
            errors.push("TP_MAX_PRICE_MULTIPLE must be greater than 1".to_string());
        }

        if self.max_target_ratio <= Decimal::ZERO {
            errors.push("TP_MAX_TARGET_RATIO must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn take_profit_limits(&self) -> TakeProfitLimits {
        TakeProfitLimits {
            max_target_ratio: self.max_target_ratio,
            max_price_multiple: self.max_price_multiple,
            price_ratio_tolerance: self.price_ratio_tolerance,
        }
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(v.trim()).ok())
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.take_profit_limits(), TakeProfitLimits::default());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let settings = Settings {
            price_ratio_tolerance: Decimal::ONE,
            max_price_multiple: Decimal::ONE,
            max_target_ratio: Decimal::ZERO,
            ..Settings::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" yes "));
        assert!(!parse_bool("off"));
    }
}
