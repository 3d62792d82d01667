/// Lifecycle of the single open trade's orders.
///
/// `PendingEntry -> Open -> PendingExit -> Closed` (terminal). A trade that never reaches `Open`
/// (entry rejected or timed out) is discarded from `Idle` without affecting the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Idle,
    PendingEntry,
    Open,
    PendingExit,
    Closed,
}

/// Tracks the client ids of the entry, stop-loss and take-profit orders for the one-and-only
/// open position, and the state machine that reconciles their fills.
#[derive(Debug, Default)]
pub struct OrderLifecycleTracker {
    state: TrackerState,
}

#[derive(Debug)]
struct TrackerState {
    phase: TradeState,
    entry_id: Option<String>,
    stop_id: Option<String>,
    take_profit_id: Option<String>,
    /// Set by `force_pending_exit`: this `PendingExit` was reached because a protective order
    /// submission was never acknowledged, not because a sibling already filled.
    degraded: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            phase: TradeState::Idle,
            entry_id: None,
            stop_id: None,
            take_profit_id: None,
            degraded: false,
        }
    }
}

impl OrderLifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TradeState {
        self.state.phase
    }

    /// A market entry order was just submitted.
    pub fn start_entry(&mut self, entry_id: impl Into<String>) {
        assert_eq!(
            self.state.phase,
            TradeState::Idle,
            "start_entry called while a trade is already in flight"
        );
        self.state = TrackerState {
            phase: TradeState::PendingEntry,
            entry_id: Some(entry_id.into()),
            stop_id: None,
            take_profit_id: None,
        };
    }

    /// The entry fill was acknowledged; the protective orders have just been submitted.
    pub fn confirm_entry(&mut self, stop_id: impl Into<String>, take_profit_id: impl Into<String>) {
        assert_eq!(self.state.phase, TradeState::PendingEntry);
        self.state.phase = TradeState::Open;
        self.state.stop_id = Some(stop_id.into());
        self.state.take_profit_id = Some(take_profit_id.into());
    }

    /// The entry was rejected or timed out before ever filling. Discards the in-flight trade.
    pub fn discard_entry(&mut self) {
        assert_eq!(self.state.phase, TradeState::PendingEntry);
        self.state = TrackerState::default();
    }

    /// One or both protective order submissions exhausted their retry budget without ever
    /// being acknowledged (§7). The position already filled, so it cannot go back to `Idle`;
    /// it is reported `PendingExit` directly rather than `Open`, since it is not actually
    /// covered by the protective orders an `Open` position is expected to have resting.
    /// `stop_id`/`take_profit_id` carry whichever leg (if any) did get acknowledged.
    pub fn force_pending_exit(&mut self, stop_id: Option<String>, take_profit_id: Option<String>) {
        assert_eq!(self.state.phase, TradeState::PendingEntry);
        self.state.phase = TradeState::PendingExit;
        self.state.stop_id = stop_id;
        self.state.take_profit_id = take_profit_id;
        self.state.degraded = true;
    }

    /// Whether the current `PendingExit` was reached via `force_pending_exit` rather than a
    /// normal protective fill.
    pub fn is_degraded(&self) -> bool {
        self.state.degraded
    }

    /// A fill arrived for the one surviving protective order on a degraded position. Returns
    /// the sibling order id to cancel (if one happens to be resting) when `client_id` is
    /// recognized, or `None` if it belongs to no tracked order.
    pub fn on_degraded_fill(&mut self, client_id: &str) -> Option<Option<String>> {
        if self.state.phase != TradeState::PendingExit || !self.state.degraded {
            return None;
        }
        if self.state.stop_id.as_deref() == Some(client_id) {
            return Some(self.state.take_profit_id.clone());
        }
        if self.state.take_profit_id.as_deref() == Some(client_id) {
            return Some(self.state.stop_id.clone());
        }
        None
    }

    /// A fill event arrived for `client_id`. Returns the sibling protective order id to cancel
    /// if this fill closes the position, or `None` if the fill is unrecognized (a duplicate of
    /// an already-closed trade, or belongs to no tracked order).
    pub fn on_protective_fill(&mut self, client_id: &str) -> Option<String> {
        if self.state.phase != TradeState::Open {
            return None;
        }
        if self.state.stop_id.as_deref() == Some(client_id) {
            self.state.phase = TradeState::PendingExit;
            return self.state.take_profit_id.clone();
        }
        if self.state.take_profit_id.as_deref() == Some(client_id) {
            self.state.phase = TradeState::PendingExit;
            return self.state.stop_id.clone();
        }
        None
    }

    /// The sibling protective order's cancellation was confirmed and P&L settled.
    pub fn confirm_closed(&mut self) {
        assert_eq!(self.state.phase, TradeState::PendingExit);
        self.state.phase = TradeState::Closed;
    }

    /// Reset back to idle, ready for the next trade.
    pub fn reset(&mut self) {
        self.state = TrackerState::default();
    }

    /// Whether `client_id` belongs to the currently tracked trade at all (used to distinguish a
    /// genuine duplicate fill from an event for an order this tracker never saw).
    pub fn owns(&self, client_id: &str) -> bool {
        self.state.entry_id.as_deref() == Some(client_id)
            || self.state.stop_id.as_deref() == Some(client_id)
            || self.state.take_profit_id.as_deref() == Some(client_id)
    }

    pub fn entry_id(&self) -> Option<&str> {
        self.state.entry_id.as_deref()
    }

    /// The resting protective order ids, if the trade has reached `Open`.
    pub fn resting_order_ids(&self) -> (Option<&str>, Option<&str>) {
        (self.state.stop_id.as_deref(), self.state.take_profit_id.as_deref())
    }
}
