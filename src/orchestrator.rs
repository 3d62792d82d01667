use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc::Receiver;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::errors::{EngineError, GatewayError};
use crate::events::{EngineEvent, Quote, Side};
use crate::gateway::{Acknowledgement, OrderGateway};
use crate::journal::{Journal, JournalKind};
use crate::ladder::{BalanceLadder, LadderConfig};
use crate::predicate::{EntryDecision, EntryPredicate};
use crate::sizing::{self, Instrument, SizingInput};
use crate::state::{OrderLifecycleTracker, RuntimeState, TradeRecord, TradeState};

/// Slippage tolerance when classifying a fill against the protective prices, in price units.
const CLASSIFY_EPSILON: Decimal = dec!(0.00001);

/// How many times a transient gateway failure is retried, with exponential backoff, before the
/// entry attempt is abandoned.
const MAX_ENTRY_RETRIES: u32 = 2;

/// Consecutive gateway failures after which the engine refuses new entries outright rather than
/// keep retrying into a gateway that is clearly unhealthy (§7).
const GATEWAY_DEGRADED_THRESHOLD: u32 = 5;

struct PendingEntry {
    client_id: String,
    side: Side,
    entry_price: Decimal,
    quantity: Decimal,
    stake: Decimal,
    take_profit_price: Decimal,
    stop_loss_price: Decimal,
    loss_percentage: Decimal,
    /// Cash loss the stop would actually realize, and the shortfall against the ladder's exact
    /// target loss left by flooring the quantity (§4.2). Carried through to the journal entry.
    effective_risk: Decimal,
    risk_residual: Decimal,
}

/// The trading core: owns the balance ladder and runtime state, and drives them from the single
/// ordered stream of engine events (§4). Holds its external collaborators behind trait objects so
/// `demo`, `backtest` and `live` modes can all wire up the same orchestrator.
pub struct Orchestrator<W: std::io::Write> {
    ladder: BalanceLadder,
    runtime: RuntimeState,
    tracker: OrderLifecycleTracker,
    instrument: Instrument,
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    predicate: Box<dyn EntryPredicate>,
    journal: Journal<W>,
    trade_delay: Duration,
    pending_entry: Option<PendingEntry>,
    gateway_failures: u32,
    next_id: u64,
    last_quote: Option<Quote>,
}

impl<W: std::io::Write> Orchestrator<W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ladder_config: LadderConfig,
        instrument: Instrument,
        gateway: Arc<dyn OrderGateway>,
        clock: Arc<dyn Clock>,
        predicate: Box<dyn EntryPredicate>,
        journal: Journal<W>,
        trade_delay: Duration,
        max_consecutive_losses: u32,
    ) -> Self {
        Self {
            ladder: BalanceLadder::new(ladder_config),
            runtime: RuntimeState::new(max_consecutive_losses),
            tracker: OrderLifecycleTracker::new(),
            instrument,
            gateway,
            clock,
            predicate,
            journal,
            trade_delay,
            pending_entry: None,
            gateway_failures: 0,
            next_id: 0,
            last_quote: None,
        }
    }

    pub fn ladder(&self) -> &BalanceLadder {
        &self.ladder
    }

    pub fn tracker_phase(&self) -> TradeState {
        self.tracker.phase()
    }

    pub fn open_trade(&self) -> Option<&TradeRecord> {
        self.runtime.open_trade.as_ref()
    }

    pub fn journal(&self) -> &Journal<W> {
        &self.journal
    }

    fn gateway_degraded(&self) -> bool {
        self.gateway_failures >= GATEWAY_DEGRADED_THRESHOLD
    }

    fn next_client_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn backoff_for(attempt: u32) -> Duration {
        Duration::from_millis(100 * 2u64.pow(attempt.min(6)))
    }

    /// Submit one order, retrying transient gateway errors with bounded exponential backoff
    /// (§7) before giving up. `label` is only for logging. Returns `false` once the retry
    /// budget is exhausted without an acknowledgement.
    async fn submit_with_retry<F, Fut>(&mut self, label: &'static str, mut submit: F) -> bool
    where
        F: FnMut(Arc<dyn OrderGateway>) -> Fut,
        Fut: std::future::Future<Output = Result<Acknowledgement, GatewayError>>,
    {
        let mut attempt = 0;
        loop {
            match submit(self.gateway.clone()).await {
                Ok(_ack) => {
                    self.gateway_failures = 0;
                    return true;
                }
                Err(e) if e.is_transient() && attempt < MAX_ENTRY_RETRIES => {
                    attempt += 1;
                    self.gateway_failures += 1;
                    warn!(attempt, error = %e, order = label, "transient gateway error, retrying");
                    self.clock.sleep(Self::backoff_for(attempt)).await;
                }
                Err(e) => {
                    self.gateway_failures += 1;
                    error!(error = %e, order = label, "submission failed after exhausting retries");
                    return false;
                }
            }
        }
    }

    /// Drain the channel until a shutdown is observed or the sender side is dropped.
    pub async fn run(&mut self, mut rx: Receiver<EngineEvent>) -> Result<(), EngineError> {
        while let Some(event) = rx.recv().await {
            if !self.handle_event(event).await? {
                break;
            }
        }
        Ok(())
    }

    /// Process one event. Returns `false` once a `Shutdown` has been handled, signalling the
    /// caller to stop pulling from the channel.
    pub async fn handle_event(&mut self, event: EngineEvent) -> Result<bool, EngineError> {
        match event {
            EngineEvent::Quote(quote) => {
                self.on_quote(quote).await?;
                Ok(true)
            }
            EngineEvent::Fill {
                client_id,
                side,
                price,
                quantity,
                ts,
            } => {
                self.on_fill(client_id, side, price, quantity, ts).await?;
                Ok(true)
            }
            EngineEvent::Reject { client_id, reason } => {
                self.on_reject(client_id, reason);
                Ok(true)
            }
            EngineEvent::Timer { .. } => Ok(true),
            EngineEvent::Shutdown => {
                self.on_shutdown().await;
                Ok(false)
            }
        }
    }

    async fn on_quote(&mut self, quote: Quote) -> Result<(), EngineError> {
        self.last_quote = Some(quote);
        self.gateway.on_market_data(quote).await;

        let now = self.clock.now();
        let trade_delay_ns = self.trade_delay.as_nanos() as u64;
        if self.gateway_degraded() || !self.runtime.can_enter(now, trade_delay_ns) {
            return Ok(());
        }

        let decision = self.predicate.decide(&quote, &self.runtime);
        if let EntryDecision::Enter(side) = decision {
            self.try_enter(side, quote).await?;
        }
        Ok(())
    }

    async fn try_enter(&mut self, side: Side, quote: Quote) -> Result<(), EngineError> {
        let entry_price = match side {
            Side::Long => quote.ask,
            Side::Short => quote.bid,
        };
        let profit_fraction = self.ladder.growth_factor() - Decimal::ONE;
        let loss_percentage = self.ladder.loss_percentage_for_step_back();
        let target_loss = self.ladder.loss_for_step_back();

        let sizing_input = SizingInput {
            side,
            entry_price,
            profit_fraction,
            loss_percentage,
            target_loss,
        };
        let sizing = match sizing::size_trade(sizing_input, &self.instrument) {
            Ok(sizing) => sizing,
            Err(e) => {
                warn!(error = %e, "entry refused by sizer");
                self.journal_note(
                    JournalKind::EntryRefused,
                    quote.ts,
                    None,
                    Some(e.to_string()),
                );
                return Ok(());
            }
        };

        if sizing.risk_residual > Decimal::ZERO {
            warn!(
                risk_residual = %sizing.risk_residual,
                effective_risk = %sizing.effective_risk,
                target_loss = %target_loss,
                "quantity flooring left a residual below the ladder's exact step-back loss"
            );
        }

        let client_id = self.next_client_id("entry");
        let quantity = sizing.quantity;
        let entered = self
            .submit_with_retry("entry", {
                let client_id = client_id.clone();
                move |gateway: Arc<dyn OrderGateway>| {
                    let client_id = client_id.clone();
                    async move { gateway.submit_market(side, quantity, &client_id).await }
                }
            })
            .await;
        if !entered {
            self.journal_note(
                JournalKind::EntryRefused,
                quote.ts,
                None,
                Some("entry submission failed after exhausting retries".to_string()),
            );
            return Ok(());
        }

        self.tracker.start_entry(client_id.clone());
        self.pending_entry = Some(PendingEntry {
            client_id,
            side,
            entry_price,
            quantity: sizing.quantity,
            stake: self.ladder.current_stake(),
            take_profit_price: sizing.take_profit_price,
            stop_loss_price: sizing.stop_loss_price,
            loss_percentage,
            effective_risk: sizing.effective_risk,
            risk_residual: sizing.risk_residual,
        });
        Ok(())
    }

    async fn on_fill(
        &mut self,
        client_id: String,
        _side: Side,
        price: Decimal,
        _quantity: Decimal,
        ts: u64,
    ) -> Result<(), EngineError> {
        if let Some(pending) = &self.pending_entry {
            if pending.client_id == client_id {
                self.confirm_entry(ts).await?;
                return Ok(());
            }
        }

        if self.tracker.owns(&client_id) {
            if self.tracker.phase() == TradeState::Open {
                self.on_protective_fill(&client_id, price, ts).await?;
                return Ok(());
            }
            if self.tracker.is_degraded() {
                self.on_degraded_fill(&client_id, price, ts).await?;
                return Ok(());
            }
        }

        info!(client_id, "fill for unrecognized or already-closed order ignored");
        Ok(())
    }

    async fn confirm_entry(&mut self, ts: u64) -> Result<(), EngineError> {
        let pending = self
            .pending_entry
            .take()
            .expect("confirm_entry only called when pending_entry is Some");

        let stop_id = self.next_client_id("stop");
        let tp_id = self.next_client_id("tp");

        let stop_ok = self
            .submit_with_retry("stop-loss", {
                let stop_id = stop_id.clone();
                let (side, stop_loss_price, quantity) =
                    (pending.side, pending.stop_loss_price, pending.quantity);
                move |gateway: Arc<dyn OrderGateway>| {
                    let stop_id = stop_id.clone();
                    async move {
                        gateway
                            .submit_stop(side, stop_loss_price, quantity, &stop_id)
                            .await
                    }
                }
            })
            .await;
        let tp_ok = self
            .submit_with_retry("take-profit", {
                let tp_id = tp_id.clone();
                let (side, take_profit_price, quantity) =
                    (pending.side, pending.take_profit_price, pending.quantity);
                move |gateway: Arc<dyn OrderGateway>| {
                    let tp_id = tp_id.clone();
                    async move {
                        gateway
                            .submit_limit(side, take_profit_price, quantity, &tp_id)
                            .await
                    }
                }
            })
            .await;

        let trade = TradeRecord::open(
            pending.side,
            pending.entry_price,
            pending.quantity,
            pending.stake,
            pending.take_profit_price,
            pending.stop_loss_price,
            pending.loss_percentage,
            ts,
        );
        self.runtime.open_trade = Some(trade.clone());

        let residual_note = (pending.risk_residual > Decimal::ZERO).then(|| {
            format!(
                "risk_residual={} effective_risk={}",
                pending.risk_residual, pending.effective_risk
            )
        });

        if stop_ok && tp_ok {
            self.tracker.confirm_entry(stop_id, tp_id);
            self.journal_note(JournalKind::TradeOpened, ts, Some(&trade), residual_note);
        } else {
            // The entry already filled; it cannot be unwound. Whichever protective leg never
            // got an acknowledgement is reported rather than silently assumed resting, so the
            // position is reported `pending_exit` instead of `Open` (§7).
            error!(
                stop_ok,
                tp_ok,
                "position opened without full protective coverage; reporting pending_exit"
            );
            self.tracker.force_pending_exit(
                stop_ok.then_some(stop_id),
                tp_ok.then_some(tp_id),
            );
            let note = match residual_note {
                Some(n) => format!("{n}; protective order submission failed, reporting pending_exit"),
                None => "protective order submission failed, reporting pending_exit".to_string(),
            };
            self.journal_note(JournalKind::TradeOpened, ts, Some(&trade), Some(note));
        }
        Ok(())
    }

    async fn on_protective_fill(
        &mut self,
        client_id: &str,
        price: Decimal,
        ts: u64,
    ) -> Result<(), EngineError> {
        let Some(sibling_id) = self.tracker.on_protective_fill(client_id) else {
            return Ok(());
        };

        if let Err(e) = self.gateway.cancel(&sibling_id).await {
            warn!(error = %e, sibling_id, "failed to cancel sibling protective order");
        }

        let mut trade = self
            .runtime
            .open_trade
            .take()
            .ok_or(EngineError::DuplicateOpenTrade)?;
        let (outcome, ambiguous) = trade.close(price, ts, CLASSIFY_EPSILON);
        if ambiguous {
            warn!(
                client_id,
                exit_price = %price,
                "exit price fell between both protective bounds; classified by P&L sign"
            );
        }
        match outcome {
            crate::state::Outcome::Win => self.ladder.record_profit(),
            crate::state::Outcome::Loss => self.ladder.record_loss(),
            crate::state::Outcome::NeutralClose => {}
        }
        self.runtime
            .record_close(ts, outcome == crate::state::Outcome::Loss);

        self.journal_note(JournalKind::TradeClosed, ts, Some(&trade), None);
        self.tracker.confirm_closed();
        self.tracker.reset();
        Ok(())
    }

    /// A fill arrived for the surviving protective order on a position that was reported
    /// `pending_exit` straight out of entry confirmation because its sibling never got
    /// acknowledged (§7). Closes the trade the same way a normal protective fill would.
    async fn on_degraded_fill(
        &mut self,
        client_id: &str,
        price: Decimal,
        ts: u64,
    ) -> Result<(), EngineError> {
        let Some(sibling_id) = self.tracker.on_degraded_fill(client_id) else {
            return Ok(());
        };
        if let Some(sibling_id) = sibling_id {
            if let Err(e) = self.gateway.cancel(&sibling_id).await {
                warn!(error = %e, sibling_id, "failed to cancel sibling protective order");
            }
        }

        let mut trade = self
            .runtime
            .open_trade
            .take()
            .ok_or(EngineError::DuplicateOpenTrade)?;
        let (outcome, ambiguous) = trade.close(price, ts, CLASSIFY_EPSILON);
        if ambiguous {
            warn!(
                client_id,
                exit_price = %price,
                "exit price fell between both protective bounds; classified by P&L sign"
            );
        }
        match outcome {
            crate::state::Outcome::Win => self.ladder.record_profit(),
            crate::state::Outcome::Loss => self.ladder.record_loss(),
            crate::state::Outcome::NeutralClose => {}
        }
        self.runtime
            .record_close(ts, outcome == crate::state::Outcome::Loss);

        self.journal_note(
            JournalKind::TradeClosed,
            ts,
            Some(&trade),
            Some("closed from a degraded pending_exit position".to_string()),
        );
        self.tracker.confirm_closed();
        self.tracker.reset();
        Ok(())
    }

    fn on_reject(&mut self, client_id: String, reason: String) {
        if let Some(pending) = &self.pending_entry {
            if pending.client_id == client_id {
                warn!(client_id, reason, "entry order rejected");
                self.tracker.discard_entry();
                self.pending_entry = None;
                self.journal_note(JournalKind::EntryRefused, 0, None, Some(reason));
                return;
            }
        }
        warn!(client_id, reason, "reject for unrecognized order ignored");
    }

    async fn on_shutdown(&mut self) {
        let ts = self.last_quote.map(|q| q.ts).unwrap_or_else(|| self.clock.now());

        if self.pending_entry.take().is_some() {
            self.tracker.reset();
        }

        if let Some(mut trade) = self.runtime.open_trade.take() {
            let (stop_id, tp_id) = self.tracker.resting_order_ids();
            let (stop_id, tp_id) = (stop_id.map(str::to_string), tp_id.map(str::to_string));
            if let Some(stop_id) = stop_id {
                let _ = self.gateway.cancel(&stop_id).await;
            }
            if let Some(tp_id) = tp_id {
                let _ = self.gateway.cancel(&tp_id).await;
            }
            trade.close_neutral(trade.entry_price, ts);
            self.journal_note(
                JournalKind::Shutdown,
                ts,
                Some(&trade),
                Some("shutdown: open trade closed neutrally".to_string()),
            );
            self.tracker.reset();
        } else {
            self.journal_note(JournalKind::Shutdown, ts, None, None);
        }
    }

    fn journal_note(
        &mut self,
        kind: JournalKind,
        ts: u64,
        trade: Option<&TradeRecord>,
        note: Option<String>,
    ) {
        if let Err(e) = self.journal.append(kind, ts, &self.ladder, trade, note) {
            error!(error = %e, "failed to write journal record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::gateway::DemoGateway;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// Wraps `DemoGateway` but refuses every stop-loss submission outright, to exercise the
    /// degraded-entry path in `confirm_entry` without retries ever succeeding.
    struct StopFailingGateway {
        inner: DemoGateway,
    }

    impl StopFailingGateway {
        fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
            Self {
                inner: DemoGateway::new(tx),
            }
        }
    }

    #[async_trait]
    impl OrderGateway for StopFailingGateway {
        async fn on_market_data(&self, quote: Quote) {
            self.inner.on_market_data(quote).await;
        }

        async fn submit_market(
            &self,
            side: Side,
            quantity: Decimal,
            client_id: &str,
        ) -> Result<Acknowledgement, GatewayError> {
            self.inner.submit_market(side, quantity, client_id).await
        }

        async fn submit_stop(
            &self,
            _side: Side,
            _trigger_price: Decimal,
            _quantity: Decimal,
            client_id: &str,
        ) -> Result<Acknowledgement, GatewayError> {
            Err(GatewayError::Permanent {
                client_id: client_id.to_string(),
                reason: "stop rejected in test".to_string(),
            })
        }

        async fn submit_limit(
            &self,
            side: Side,
            price: Decimal,
            quantity: Decimal,
            client_id: &str,
        ) -> Result<Acknowledgement, GatewayError> {
            self.inner.submit_limit(side, price, quantity, client_id).await
        }

        async fn cancel(&self, client_id: &str) -> Result<Acknowledgement, GatewayError> {
            self.inner.cancel(client_id).await
        }
    }

    fn eurusd() -> Instrument {
        Instrument {
            symbol: "EURUSD".to_string(),
            pip_size: dec!(0.0001),
            tick_size: dec!(0.00001),
            contract_size: dec!(1000),
            price_precision: 5,
            quantity_precision: 4,
            min_quantity: dec!(0.0001),
        }
    }

    fn ladder_config() -> LadderConfig {
        LadderConfig {
            initial_balance: dec!(100),
            growth_factor: dec!(1.30),
            loss_policy: crate::ladder::LossPolicy::StepBack,
            rounding: 2,
        }
    }

    #[derive(Default)]
    struct EnterOnceThenSkip {
        entered: bool,
    }

    impl EntryPredicate for EnterOnceThenSkip {
        fn decide(&mut self, _quote: &Quote, _runtime: &RuntimeState) -> EntryDecision {
            if self.entered {
                EntryDecision::Skip
            } else {
                self.entered = true;
                EntryDecision::Enter(Side::Long)
            }
        }
    }

    fn new_orchestrator_with_gateway(gateway: Arc<dyn OrderGateway>) -> Orchestrator<Vec<u8>> {
        let clock = Arc::new(SimulatedClock::new(0));
        let predicate = Box::new(EnterOnceThenSkip::default());
        let journal = Journal::new(Vec::new(), dec!(100));
        Orchestrator::new(
            ladder_config(),
            eurusd(),
            gateway,
            clock,
            predicate,
            journal,
            Duration::from_secs(0),
            10,
        )
    }

    fn new_orchestrator(tx: mpsc::Sender<EngineEvent>) -> Orchestrator<Vec<u8>> {
        new_orchestrator_with_gateway(Arc::new(DemoGateway::new(tx)))
    }

    #[tokio::test]
    async fn entry_then_take_profit_advances_the_ladder() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut orchestrator = new_orchestrator(tx);

        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: dec!(1.10400),
                ask: dec!(1.10420),
                ts: 1,
            }))
            .await
            .unwrap();

        let entry_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(entry_fill).await.unwrap();
        assert_eq!(orchestrator.tracker_phase(), TradeState::Open);

        let tp_price = orchestrator.open_trade().unwrap().take_profit_price;
        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: tp_price,
                ask: tp_price + dec!(0.00002),
                ts: 2,
            }))
            .await
            .unwrap();

        let protective_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(protective_fill).await.unwrap();

        assert_eq!(orchestrator.ladder().current_balance(), dec!(130));
        assert_eq!(orchestrator.tracker_phase(), TradeState::Idle);
        assert!(orchestrator.open_trade().is_none());
        assert_eq!(orchestrator.journal().stats().wins, 1);
    }

    #[tokio::test]
    async fn entry_then_stop_loss_steps_ladder_back() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut orchestrator = new_orchestrator(tx);
        // Pre-advance the ladder so a loss has somewhere to step back from.
        orchestrator.ladder.record_profit();
        orchestrator.ladder.record_profit();
        assert_eq!(orchestrator.ladder().current_balance(), dec!(169));

        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: dec!(1.10400),
                ask: dec!(1.10420),
                ts: 1,
            }))
            .await
            .unwrap();
        let entry_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(entry_fill).await.unwrap();

        let sl_price = orchestrator.open_trade().unwrap().stop_loss_price;
        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: sl_price,
                ask: sl_price + dec!(0.00002),
                ts: 2,
            }))
            .await
            .unwrap();
        let protective_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(protective_fill).await.unwrap();

        assert_eq!(orchestrator.ladder().current_balance(), dec!(130));
        assert_eq!(orchestrator.journal().stats().losses, 1);
    }

    #[tokio::test]
    async fn shutdown_with_open_trade_closes_neutrally_without_moving_ladder() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut orchestrator = new_orchestrator(tx);

        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: dec!(1.10400),
                ask: dec!(1.10420),
                ts: 1,
            }))
            .await
            .unwrap();
        let entry_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(entry_fill).await.unwrap();
        assert_eq!(orchestrator.tracker_phase(), TradeState::Open);

        let still_running = orchestrator.handle_event(EngineEvent::Shutdown).await.unwrap();
        assert!(!still_running);
        assert_eq!(orchestrator.ladder().current_balance(), dec!(100));
        assert!(orchestrator.open_trade().is_none());
    }

    #[tokio::test]
    async fn duplicate_protective_fill_after_close_is_ignored() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut orchestrator = new_orchestrator(tx);

        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: dec!(1.10400),
                ask: dec!(1.10420),
                ts: 1,
            }))
            .await
            .unwrap();
        let entry_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(entry_fill).await.unwrap();

        let tp_price = orchestrator.open_trade().unwrap().take_profit_price;
        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: tp_price,
                ask: tp_price + dec!(0.00002),
                ts: 2,
            }))
            .await
            .unwrap();
        let protective_fill = rx.recv().await.unwrap();
        let duplicate = protective_fill.clone();
        orchestrator.handle_event(protective_fill).await.unwrap();
        let balance_after_first_close = orchestrator.ladder().current_balance();

        // Re-deliver the exact same fill, as a gateway might on a reconnect.
        orchestrator.handle_event(duplicate).await.unwrap();
        assert_eq!(orchestrator.ladder().current_balance(), balance_after_first_close);
    }

    #[tokio::test]
    async fn stop_submission_failure_reports_pending_exit_and_still_closes() {
        let (tx, mut rx) = mpsc::channel(16);
        let gateway = Arc::new(StopFailingGateway::new(tx));
        let mut orchestrator = new_orchestrator_with_gateway(gateway);

        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: dec!(1.10400),
                ask: dec!(1.10420),
                ts: 1,
            }))
            .await
            .unwrap();
        let entry_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(entry_fill).await.unwrap();

        // The stop-loss never got acknowledged, so the position is reported pending_exit
        // rather than Open even though the entry filled.
        assert_eq!(orchestrator.tracker_phase(), TradeState::PendingExit);
        assert!(orchestrator.open_trade().is_some());

        let tp_price = orchestrator.open_trade().unwrap().take_profit_price;
        orchestrator
            .handle_event(EngineEvent::Quote(Quote {
                bid: tp_price,
                ask: tp_price + dec!(0.00002),
                ts: 2,
            }))
            .await
            .unwrap();
        let protective_fill = rx.recv().await.unwrap();
        orchestrator.handle_event(protective_fill).await.unwrap();

        assert_eq!(orchestrator.tracker_phase(), TradeState::Idle);
        assert!(orchestrator.open_trade().is_none());
        assert_eq!(orchestrator.journal().stats().wins, 1);
    }
}
