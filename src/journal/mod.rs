//! Journal service layer.
//!
//! `TradeJournal` validates every request in full before touching storage,
//! so a rejected request never leaves a partial write behind.

pub mod portfolio;
mod reviews;
mod take_profit;
mod trades;

pub use portfolio::{Holding, Oversell, Portfolio, PortfolioSummary};
pub use take_profit::{PlannedExit, TakeProfitPlan};

use crate::storage::Database;
use crate::take_profit::TakeProfitValidator;

pub struct TradeJournal {
    db: Database,
    validator: TakeProfitValidator,
}

impl TradeJournal {
    pub fn new(db: Database, validator: TakeProfitValidator) -> Self {
        Self { db, validator }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn validator(&self) -> &TakeProfitValidator {
        &self.validator
    }
}
