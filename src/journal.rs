use std::io::Write;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ladder::BalanceLadder;
use crate::state::{Outcome, TradeRecord};

/// What kind of thing happened. Kept small and flat so the journal stays a faithful, linear
/// audit trail rather than a tagged union per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    TradeOpened,
    TradeClosed,
    EntryRefused,
    GatewayRejected,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderSnapshot {
    pub history: Vec<Decimal>,
    pub step_index: usize,
    pub current_balance: Decimal,
}

impl LadderSnapshot {
    pub fn capture(ladder: &BalanceLadder) -> Self {
        Self {
            history: ladder.balance_history().to_vec(),
            step_index: ladder.step_index(),
            current_balance: ladder.current_balance(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: Decimal,
    pub max_step: usize,
    pub total_return: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub kind: JournalKind,
    pub ts: u64,
    pub ladder: LadderSnapshot,
    pub trade: Option<TradeRecord>,
    pub stats: StatsSnapshot,
    /// Free-text context, e.g. the reason an entry was refused.
    pub note: Option<String>,
}

/// Append-only event log: the audit trail and the source of truth for ladder reconstruction.
/// Written from the orchestrator task only, so no locking is needed (§5).
pub struct Journal<W: Write> {
    writer: W,
    stats: StatsSnapshot,
    initial_balance: Decimal,
}

impl<W: Write> Journal<W> {
    pub fn new(writer: W, initial_balance: Decimal) -> Self {
        Self {
            writer,
            stats: StatsSnapshot::default(),
            initial_balance,
        }
    }

    pub fn stats(&self) -> &StatsSnapshot {
        &self.stats
    }

    fn update_stats(&mut self, ladder: &BalanceLadder, closed_trade: Option<&TradeRecord>) {
        if let Some(trade) = closed_trade {
            if let Some(outcome) = trade.outcome {
                self.stats.total_trades += 1;
                match outcome {
                    Outcome::Win => self.stats.wins += 1,
                    Outcome::Loss => self.stats.losses += 1,
                    Outcome::NeutralClose => {}
                }
            }
        }
        self.stats.max_step = self.stats.max_step.max(ladder.step_index());
        self.stats.total_return = ladder.current_balance() - self.initial_balance;
        self.stats.win_rate = if self.stats.wins + self.stats.losses > 0 {
            Decimal::from(self.stats.wins)
                / Decimal::from(self.stats.wins + self.stats.losses)
        } else {
            Decimal::ZERO
        };
    }

    /// Append one record. `trade` should be the trade that just opened or closed, if any.
    pub fn append(
        &mut self,
        kind: JournalKind,
        ts: u64,
        ladder: &BalanceLadder,
        trade: Option<&TradeRecord>,
        note: Option<String>,
    ) -> std::io::Result<()> {
        let closed_trade = trade.filter(|t| !t.is_open());
        self.update_stats(ladder, closed_trade);

        let record = JournalRecord {
            kind,
            ts,
            ladder: LadderSnapshot::capture(ladder),
            trade: trade.cloned(),
            stats: self.stats.clone(),
            note: note.clone(),
        };

        info!(
            kind = ?record.kind,
            ts,
            current_balance = %record.ladder.current_balance,
            step_index = record.ladder.step_index,
            note = note.as_deref().unwrap_or(""),
            "journal"
        );

        let line = serde_json::to_string(&record).expect("journal records always serialize");
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

/// Reconstruct a `BalanceLadder` purely from the ordered sequence of trade-close records in an
/// ndjson journal — the journal's recovery contract (§4.5).
pub fn reconstruct_ladder(
    config: crate::ladder::LadderConfig,
    records: impl IntoIterator<Item = JournalRecord>,
) -> BalanceLadder {
    let outcomes = records.into_iter().filter_map(|record| {
        let trade = record.trade?;
        match trade.outcome {
            Some(Outcome::Win) => Some(true),
            Some(Outcome::Loss) => Some(false),
            _ => None,
        }
    });
    BalanceLadder::replay(config, outcomes)
}
