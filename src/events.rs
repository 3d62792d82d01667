use rust_decimal::Decimal;

/// Trade direction. Carries the sign of exposure; quantities stay positive everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

/// A market data tick: best bid/ask for the single traded instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    /// Monotonic nanosecond timestamp.
    pub ts: u64,
}

/// Everything the orchestrator's event loop can receive on its single channel.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Quote(Quote),

    Fill {
        client_id: String,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        ts: u64,
    },

    Reject {
        client_id: String,
        reason: String,
    },

    /// Periodic timer tick; unblocks the delay guard and drives timeout checks.
    Timer { ts: u64 },

    Shutdown,
}
