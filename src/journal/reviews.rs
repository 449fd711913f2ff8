use tracing::info;

use crate::data::models::{ReviewInput, TradeReview};
use crate::errors::Result;

use super::TradeJournal;

impl TradeJournal {
    /// Create or replace the review of a trade.
    pub fn save_review(&mut self, trade_id: i64, review: ReviewInput) -> Result<TradeReview> {
        self.trade(trade_id)?;
        review.validate()?;

        let saved = self.db.upsert_review(trade_id, &review)?;
        info!(
            trade_id,
            rating = saved.rating,
            decision = %saved.decision,
            "Review saved"
        );
        Ok(saved)
    }

    pub fn review(&self, trade_id: i64) -> Result<Option<TradeReview>> {
        self.trade(trade_id)?;
        self.db.get_review(trade_id)
    }

    pub fn reviews(&self) -> Result<Vec<TradeReview>> {
        self.db.list_reviews()
    }
}
