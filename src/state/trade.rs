use rust_decimal::Decimal;

use crate::events::Side;

/// How a closed trade is classified against its protective orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    /// Closed by operator/shutdown action rather than a protective order fill; the ladder is not
    /// moved.
    NeutralClose,
}

/// A single position, open or closed. Immutable once `close`/`close_neutral` is called.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub quantity: Decimal,
    pub stake: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    pub loss_percentage_used: Decimal,
    pub opened_at: u64,
    pub closed_at: Option<u64>,
    pub outcome: Option<Outcome>,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        side: Side,
        entry_price: Decimal,
        quantity: Decimal,
        stake: Decimal,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
        loss_percentage_used: Decimal,
        opened_at: u64,
    ) -> Self {
        Self {
            side,
            entry_price,
            exit_price: None,
            quantity,
            stake,
            take_profit_price,
            stop_loss_price,
            loss_percentage_used,
            opened_at,
            closed_at: None,
            outcome: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }

    /// Classify a fill/close price against the protective prices and mark the trade closed.
    ///
    /// `epsilon` absorbs the rare slippage case where price lands beyond both bounds; such a
    /// fill is classified by signed P&L sign instead. Returns the outcome together with whether
    /// that fallback fired, so the caller can warn on the ambiguous case.
    pub fn close(&mut self, exit_price: Decimal, ts: u64, epsilon: Decimal) -> (Outcome, bool) {
        let (outcome, ambiguous) = self.classify(exit_price, epsilon);
        self.exit_price = Some(exit_price);
        self.closed_at = Some(ts);
        self.outcome = Some(outcome);
        (outcome, ambiguous)
    }

    /// Force-close without touching the ladder, used on shutdown cancellation.
    pub fn close_neutral(&mut self, exit_price: Decimal, ts: u64) {
        self.exit_price = Some(exit_price);
        self.closed_at = Some(ts);
        self.outcome = Some(Outcome::NeutralClose);
    }

    fn classify(&self, exit_price: Decimal, epsilon: Decimal) -> (Outcome, bool) {
        match self.side {
            Side::Long => {
                if exit_price >= self.take_profit_price - epsilon {
                    (Outcome::Win, false)
                } else if exit_price <= self.stop_loss_price + epsilon {
                    (Outcome::Loss, false)
                } else {
                    (self.classify_by_pnl_sign(exit_price), true)
                }
            }
            Side::Short => {
                if exit_price <= self.take_profit_price + epsilon {
                    (Outcome::Win, false)
                } else if exit_price >= self.stop_loss_price - epsilon {
                    (Outcome::Loss, false)
                } else {
                    (self.classify_by_pnl_sign(exit_price), true)
                }
            }
        }
    }

    fn classify_by_pnl_sign(&self, exit_price: Decimal) -> Outcome {
        let pnl = match self.side {
            Side::Long => exit_price - self.entry_price,
            Side::Short => self.entry_price - exit_price,
        };
        if pnl >= Decimal::ZERO {
            Outcome::Win
        } else {
            Outcome::Loss
        }
    }

    /// Signed realized P&L in cash terms; only meaningful once closed.
    pub fn realized_pnl(&self) -> Option<Decimal> {
        let exit = self.exit_price?;
        let pnl = match self.side {
            Side::Long => exit - self.entry_price,
            Side::Short => self.entry_price - exit,
        };
        Some(pnl * self.quantity)
    }
}
