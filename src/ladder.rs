use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// How a realized loss is sized relative to the current rung.
///
/// `StepBack` is the hard core of this engine: the loss percentage is *derived* so that realizing
/// it returns the balance to the previous rung exactly. `FixedPercentage` is the degenerate
/// fixed-pip configuration (the `one_three` bot in the source material): the percentage is a
/// constant regardless of rung, while win/step mechanics stay identical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossPolicy {
    StepBack,
    FixedPercentage(Decimal),
}

#[derive(Debug, Clone)]
pub struct LadderConfig {
    pub initial_balance: Decimal,
    pub growth_factor: Decimal,
    pub loss_policy: LossPolicy,
    /// Decimal places for monetary rounding (half-up), applied only when a value is exposed to
    /// downstream sizing — never to the internally-held `balance_history`.
    pub rounding: u32,
}

/// Deterministic state machine over the discrete balance sequence.
///
/// `balance_history` holds full, unrounded decimal precision so compounding rounding error never
/// leaks from one rung into the next. Rounding is applied once, at the query boundary.
#[derive(Debug, Clone)]
pub struct BalanceLadder {
    balance_history: Vec<Decimal>,
    growth_factor: Decimal,
    loss_policy: LossPolicy,
    rounding: u32,
    consecutive_losses: u32,
}

impl BalanceLadder {
    pub fn new(config: LadderConfig) -> Self {
        assert!(
            config.initial_balance > Decimal::ZERO,
            "initial_balance must be positive"
        );
        assert!(
            config.growth_factor > Decimal::ONE,
            "growth_factor must be > 1"
        );
        Self {
            balance_history: vec![config.initial_balance],
            growth_factor: config.growth_factor,
            loss_policy: config.loss_policy,
            rounding: config.rounding,
            consecutive_losses: 0,
        }
    }

    fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.rounding, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn growth_factor(&self) -> Decimal {
        self.growth_factor
    }

    /// One-based count of wins beyond the base rung.
    pub fn step_index(&self) -> usize {
        self.balance_history.len() - 1
    }

    /// Full ordered rung history, oldest first. Exposed for journalling.
    pub fn balance_history(&self) -> &[Decimal] {
        &self.balance_history
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Raw, unrounded current balance — the last rung.
    pub fn current_balance(&self) -> Decimal {
        *self.balance_history.last().expect("history is never empty")
    }

    /// Notional for the next trade, rounded for downstream sizing.
    pub fn current_stake(&self) -> Decimal {
        self.round(self.current_balance())
    }

    /// Absolute currency amount a win must realize.
    pub fn profit_target(&self) -> Decimal {
        self.round(self.current_balance() * (self.growth_factor - Decimal::ONE))
    }

    fn loss_for_step_back_raw(&self) -> Decimal {
        if let LossPolicy::FixedPercentage(pct) = self.loss_policy {
            return self.current_balance() * pct;
        }
        if self.step_index() >= 1 {
            let previous_rung = self.balance_history[self.balance_history.len() - 2];
            self.current_balance() - previous_rung
        } else {
            self.current_balance() * (self.growth_factor - Decimal::ONE)
        }
    }

    /// Absolute currency amount that, if realized as a loss, returns the ladder exactly to the
    /// previous rung (or leaves it at the base, if already there).
    pub fn loss_for_step_back(&self) -> Decimal {
        self.round(self.loss_for_step_back_raw())
    }

    /// The dynamic loss percentage that makes `loss_for_step_back` exact. Derived, never
    /// hard-coded: for every rung above the base this reduces algebraically to `(G-1)/G`.
    pub fn loss_percentage_for_step_back(&self) -> Decimal {
        if let LossPolicy::FixedPercentage(pct) = self.loss_policy {
            return pct;
        }
        let raw = self.loss_for_step_back_raw() / self.current_balance();
        raw.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Append a new rung after a win; resets the consecutive-loss streak.
    pub fn record_profit(&mut self) {
        let next = self.current_balance() * self.growth_factor;
        self.balance_history.push(next);
        self.consecutive_losses = 0;
    }

    /// Step back to the previous rung after a loss, or stay at the base. Always advances the
    /// consecutive-loss streak.
    pub fn record_loss(&mut self) {
        if self.step_index() >= 1 {
            self.balance_history.pop();
        }
        self.consecutive_losses += 1;
    }

    /// Rebuild a ladder purely from an ordered sequence of profit/loss events — the journal's
    /// reconstruction contract (§4.5).
    pub fn replay(config: LadderConfig, events: impl IntoIterator<Item = bool>) -> Self {
        let mut ladder = Self::new(config);
        for won in events {
            if won {
                ladder.record_profit();
            } else {
                ladder.record_loss();
            }
        }
        ladder
    }

    /// `(G-1)/G` as an f64, for diagnostics only — never used for sizing arithmetic.
    pub fn asymptotic_loss_percentage(&self) -> Option<f64> {
        let g = self.growth_factor;
        ((g - Decimal::ONE) / g).to_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(initial: Decimal, growth: Decimal) -> LadderConfig {
        LadderConfig {
            initial_balance: initial,
            growth_factor: growth,
            loss_policy: LossPolicy::StepBack,
            rounding: 2,
        }
    }

    #[test]
    fn win_advances_one_rung() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        ladder.record_profit();
        assert_eq!(ladder.balance_history(), &[dec!(100), dec!(130)]);
        assert_eq!(ladder.current_stake(), dec!(130));
        assert_eq!(ladder.profit_target(), dec!(39.00));
    }

    #[test]
    fn win_win_loss_steps_back_one_rung() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        ladder.record_profit();
        ladder.record_profit();
        assert_eq!(ladder.current_balance(), dec!(169));
        ladder.record_loss();
        assert_eq!(ladder.current_balance(), dec!(130));
        assert_eq!(ladder.consecutive_losses(), 1);
    }

    #[test]
    fn loss_at_base_stays_at_base() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        ladder.record_loss();
        assert_eq!(ladder.balance_history(), &[dec!(100)]);
        assert_eq!(ladder.consecutive_losses(), 1);
        assert_eq!(ladder.current_stake(), dec!(100));
    }

    #[test]
    fn three_wins_three_losses_returns_to_base() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        for _ in 0..3 {
            ladder.record_profit();
        }
        assert_eq!(ladder.current_balance(), dec!(219.70));
        for i in 0..3 {
            ladder.record_loss();
            if i == 2 {
                assert_eq!(ladder.consecutive_losses(), 3);
            }
        }
        assert_eq!(ladder.current_balance(), dec!(100));
    }

    #[test]
    fn loss_percentage_matches_worked_example() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        ladder.record_profit(); // 130
        ladder.record_profit(); // 169
        let pct = ladder.loss_percentage_for_step_back();
        assert_eq!(pct, dec!(0.2308));
        assert_eq!(ladder.loss_for_step_back(), dec!(39.00));

        ladder.record_loss(); // back to 130
        let pct_at_130 = ladder.loss_percentage_for_step_back();
        assert_eq!(pct_at_130, dec!(0.2308));
        assert_eq!(ladder.loss_for_step_back(), dec!(30.00));
    }

    #[test]
    fn loss_percentage_at_base_is_thirty_percent() {
        let ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        assert_eq!(ladder.loss_percentage_for_step_back(), dec!(0.3000));
        assert_eq!(ladder.loss_for_step_back(), dec!(30.00));
    }

    #[test]
    fn ladder_closure_any_interleaving_of_equal_wins_and_losses() {
        let sequences: &[&[bool]] = &[
            &[true, true, false, false],
            &[true, false, true, false],
            &[false, true, false, true],
        ];
        for seq in sequences {
            let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
            for &won in *seq {
                if won {
                    ladder.record_profit();
                } else {
                    ladder.record_loss();
                }
            }
            assert_eq!(ladder.current_balance(), dec!(100), "sequence {:?}", seq);
        }
    }

    #[test]
    fn monotone_base_never_breached() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        for _ in 0..20 {
            ladder.record_loss();
            assert!(ladder.current_balance() >= dec!(100));
        }
    }

    #[test]
    fn geometric_invariant_holds_across_history() {
        let mut ladder = BalanceLadder::new(config(dec!(100), dec!(1.30)));
        for _ in 0..5 {
            ladder.record_profit();
        }
        let history = ladder.balance_history();
        for pair in history.windows(2) {
            assert_eq!(pair[1], pair[0] * dec!(1.30));
        }
    }

    #[test]
    fn fixed_percentage_policy_overrides_dynamic_loss() {
        let cfg = LadderConfig {
            initial_balance: dec!(100),
            growth_factor: dec!(1.30),
            loss_policy: LossPolicy::FixedPercentage(dec!(0.015)),
            rounding: 2,
        };
        let mut ladder = BalanceLadder::new(cfg);
        ladder.record_profit();
        assert_eq!(ladder.loss_percentage_for_step_back(), dec!(0.015));
        assert_eq!(ladder.loss_for_step_back(), dec!(1.95));
    }

    #[test]
    fn replay_reconstructs_ladder_from_journal_events() {
        let events = vec![true, true, false];
        let ladder = BalanceLadder::replay(config(dec!(100), dec!(1.30)), events);
        assert_eq!(ladder.current_balance(), dec!(130));
        assert_eq!(ladder.consecutive_losses(), 1);
    }

    #[test]
    #[should_panic(expected = "initial_balance must be positive")]
    fn rejects_non_positive_initial_balance() {
        BalanceLadder::new(config(dec!(0), dec!(1.30)));
    }
}
