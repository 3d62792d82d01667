use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::ladder::{LadderConfig, LossPolicy};
use crate::sizing::Instrument;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ladder: LadderSection,
    pub instrument: InstrumentSection,
    #[serde(default)]
    pub general: GeneralSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LadderSection {
    pub initial_balance: Decimal,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: Decimal,
    /// Setting this turns the ladder into the degenerate fixed-pip variant: losses always cost
    /// this fraction of the current rung instead of the derived step-back amount.
    #[serde(default)]
    pub fixed_loss_percentage: Option<Decimal>,
    #[serde(default = "default_rounding")]
    pub rounding: u32,
    #[serde(default = "default_trade_delay_secs")]
    pub trade_delay_secs: u64,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSection {
    pub symbol: String,
    pub pip_size: Decimal,
    pub tick_size: Decimal,
    pub contract_size: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub min_quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralSection {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_growth_factor() -> Decimal {
    dec!(1.30)
}

fn default_rounding() -> u32 {
    2
}

fn default_trade_delay_secs() -> u64 {
    5
}

fn default_max_consecutive_losses() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ladder.initial_balance <= Decimal::ZERO {
            return Err(ConfigError::InvalidInitialBalance(self.ladder.initial_balance));
        }
        if self.ladder.growth_factor <= Decimal::ONE {
            return Err(ConfigError::InvalidGrowthFactor(self.ladder.growth_factor));
        }
        if self.ladder.rounding > 8 {
            return Err(ConfigError::InvalidRounding(self.ladder.rounding));
        }
        if self.instrument.tick_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidInstrument(format!(
                "{}: tick_size must be positive",
                self.instrument.symbol
            )));
        }
        if self.instrument.contract_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidInstrument(format!(
                "{}: contract_size must be positive",
                self.instrument.symbol
            )));
        }
        if self.instrument.min_quantity < Decimal::ZERO {
            return Err(ConfigError::InvalidInstrument(format!(
                "{}: min_quantity must not be negative",
                self.instrument.symbol
            )));
        }
        Ok(())
    }

    pub fn ladder_config(&self) -> LadderConfig {
        let loss_policy = match self.ladder.fixed_loss_percentage {
            Some(pct) => LossPolicy::FixedPercentage(pct),
            None => LossPolicy::StepBack,
        };
        LadderConfig {
            initial_balance: self.ladder.initial_balance,
            growth_factor: self.ladder.growth_factor,
            loss_policy,
            rounding: self.ladder.rounding,
        }
    }

    pub fn instrument(&self) -> Instrument {
        Instrument {
            symbol: self.instrument.symbol.clone(),
            pip_size: self.instrument.pip_size,
            tick_size: self.instrument.tick_size,
            contract_size: self.instrument.contract_size,
            price_precision: self.instrument.price_precision,
            quantity_precision: self.instrument.quantity_precision,
            min_quantity: self.instrument.min_quantity,
        }
    }

    pub fn trade_delay(&self) -> Duration {
        Duration::from_secs(self.ladder.trade_delay_secs)
    }

    pub fn max_consecutive_losses(&self) -> u32 {
        self.ladder.max_consecutive_losses
    }
}
