use crate::state::trade::TradeRecord;

/// Non-ladder engine state: the single open position (if any) and the entry gates.
///
/// Invariant enforced by `can_enter`: an entry is only permitted when there is no open trade, the
/// engine is not paused, and enough wall-time has passed since the last close.
#[derive(Debug, Default)]
pub struct RuntimeState {
    pub open_trade: Option<TradeRecord>,
    /// Timestamp of the last close, or `None` meaning "no prior close" (treated as -infinity).
    pub last_exit_time: Option<u64>,
    pub consecutive_losses: u32,
    max_consecutive_losses: u32,
}

impl RuntimeState {
    pub fn new(max_consecutive_losses: u32) -> Self {
        Self {
            open_trade: None,
            last_exit_time: None,
            consecutive_losses: 0,
            max_consecutive_losses,
        }
    }

    pub fn paused(&self) -> bool {
        self.consecutive_losses >= self.max_consecutive_losses
    }

    pub fn can_enter(&self, now: u64, trade_delay_ns: u64) -> bool {
        if self.open_trade.is_some() || self.paused() {
            return false;
        }
        match self.last_exit_time {
            Some(last) => now.saturating_sub(last) >= trade_delay_ns,
            None => true,
        }
    }

    pub fn record_close(&mut self, now: u64, losing: bool) {
        self.last_exit_time = Some(now);
        if losing {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Externally reset the loss streak and un-pause the engine (operator intervention).
    pub fn reset_loss_streak(&mut self) {
        self.consecutive_losses = 0;
    }
}
