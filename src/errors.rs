use thiserror::Error;

/// Invalid or missing configuration. Fatal at start-up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("growth_factor must be > 1, got {0}")]
    InvalidGrowthFactor(rust_decimal::Decimal),

    #[error("initial_balance must be > 0, got {0}")]
    InvalidInitialBalance(rust_decimal::Decimal),

    #[error("rounding places must be between 0 and 8, got {0}")]
    InvalidRounding(u32),

    #[error("instrument metadata invalid: {0}")]
    InvalidInstrument(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors the position sizer can raise. Never touches the ladder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("computed quantity {quantity} is below exchange minimum {minimum}")]
    BelowMinimumQuantity {
        quantity: rust_decimal::Decimal,
        minimum: rust_decimal::Decimal,
    },

    #[error("entry price must be positive, got {0}")]
    NonPositiveEntryPrice(rust_decimal::Decimal),
}

/// Order gateway failures, split by whether a retry can help.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("transient gateway error for {client_id}: {reason}")]
    Transient { client_id: String, reason: String },

    #[error("permanent gateway rejection for {client_id}: {reason}")]
    Permanent { client_id: String, reason: String },

    #[error("gateway call for {client_id} timed out after {attempts} attempt(s)")]
    TimedOut { client_id: String, attempts: u32 },
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient { .. } | GatewayError::TimedOut { .. })
    }
}

/// Invariant violations are programming errors; the process aborts rather than risk a corrupted
/// ladder.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("two open trades detected; only one position is ever permitted")]
    DuplicateOpenTrade,
}
