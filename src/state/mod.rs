mod runtime;
mod tracker;
mod trade;

pub use runtime::RuntimeState;
pub use tracker::{OrderLifecycleTracker, TradeState};
pub use trade::{Outcome, TradeRecord};
