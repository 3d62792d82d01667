use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(name = "stepback-engine", about = "Geometric balance-ladder trading engine", version)]
pub struct Args {
    /// Path to the engine's TOML config (ladder, instrument, general sections).
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override `ladder.initial_balance` from the config file.
    #[arg(long)]
    pub initial_balance: Option<Decimal>,

    /// Override `ladder.growth_factor` from the config file.
    #[arg(long)]
    pub growth_factor: Option<Decimal>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Run against a synthetic random-walk feed with an in-process gateway.
    Demo {
        #[arg(long, default_value = "1.10000")]
        start_price: Decimal,
        #[arg(long, default_value = "0.00020")]
        spread: Decimal,
    },
    /// Replay a recorded quote history from a CSV file (`ts,bid,ask`).
    Backtest {
        #[arg(long)]
        quotes: PathBuf,
        #[arg(long)]
        start_ts: Option<u64>,
        #[arg(long)]
        end_ts: Option<u64>,
    },
    /// Connect to a live exchange gateway. The orchestrator is gateway-agnostic; this subcommand
    /// exists as the wiring point for a real `OrderGateway`, which this crate does not ship.
    Live,
}
