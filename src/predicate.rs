use crate::events::{Quote, Side};
use crate::state::RuntimeState;

/// What the entry predicate decided for the current quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Enter(Side),
    Skip,
}

/// Pluggable entry signal. The core does not prescribe how to generate signals — it only invokes
/// this when an entry is permitted by the delay/pause/single-position gates in the orchestrator.
///
/// Implementations are expected to be pure: same quote and runtime state in, same decision out.
pub trait EntryPredicate: Send {
    fn decide(&mut self, quote: &Quote, runtime: &RuntimeState) -> EntryDecision;
}

/// Trivial predicate that always enters long. Shipped only as a demonstration stub — real
/// strategies plug in their own `EntryPredicate`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLongPredicate;

impl EntryPredicate for AlwaysLongPredicate {
    fn decide(&mut self, _quote: &Quote, _runtime: &RuntimeState) -> EntryDecision {
        EntryDecision::Enter(Side::Long)
    }
}

/// Never enters. Useful for dry runs and as a predicate-failure fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipAlwaysPredicate;

impl EntryPredicate for SkipAlwaysPredicate {
    fn decide(&mut self, _quote: &Quote, _runtime: &RuntimeState) -> EntryDecision {
        EntryDecision::Skip
    }
}
