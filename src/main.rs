use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use stepback_engine::clock::{Clock, SimulatedClock, SystemClock};
use stepback_engine::config::Config;
use stepback_engine::errors::EngineError;
use stepback_engine::events::EngineEvent;
use stepback_engine::gateway::{DemoGateway, OrderGateway};
use stepback_engine::journal::Journal;
use stepback_engine::orchestrator::Orchestrator;
use stepback_engine::predicate::AlwaysLongPredicate;
use stepback_engine::{cli, quotes, telemetry};

const JOURNAL_PATH: &str = "journal.ndjson";

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(initial_balance) = args.initial_balance {
        config.ladder.initial_balance = initial_balance;
    }
    if let Some(growth_factor) = args.growth_factor {
        config.ladder.growth_factor = growth_factor;
    }
    if args.initial_balance.is_some() || args.growth_factor.is_some() {
        if let Err(e) = config.validate() {
            eprintln!("invalid config after applying CLI overrides: {e}");
            return ExitCode::FAILURE;
        }
    }

    telemetry::init(&config.general.log_level);

    let journal_file = match File::create(JOURNAL_PATH) {
        Ok(file) => BufWriter::new(file),
        Err(e) => {
            error!(error = %e, path = JOURNAL_PATH, "failed to open journal file");
            return ExitCode::FAILURE;
        }
    };
    let journal = Journal::new(journal_file, config.ladder_config().initial_balance);

    let (tx, rx) = mpsc::channel(256);

    let result = match args.mode {
        cli::Mode::Demo { start_price, spread } => {
            let gateway: Arc<dyn OrderGateway> = Arc::new(DemoGateway::new(tx.clone()));
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            quotes::spawn_demo_feed(tx, start_price, spread);
            run(config, gateway, clock, journal, rx).await
        }
        cli::Mode::Backtest {
            quotes: quotes_path,
            start_ts,
            end_ts,
        } => {
            let rows = match quotes::read_backtest_quotes(&quotes_path, start_ts, end_ts) {
                Ok(rows) => rows,
                Err(e) => {
                    error!(error = %e, "failed to read backtest quotes");
                    return ExitCode::FAILURE;
                }
            };
            let start = rows.first().map(|q| q.ts).unwrap_or(0);
            let gateway: Arc<dyn OrderGateway> = Arc::new(DemoGateway::new(tx.clone()));
            let sim_clock = Arc::new(SimulatedClock::new(start));
            let replay_clock = sim_clock.clone();
            tokio::spawn(async move {
                for quote in rows {
                    replay_clock.advance_to(quote.ts);
                    if tx.send(EngineEvent::Quote(quote)).await.is_err() {
                        break;
                    }
                }
                let _ = tx.send(EngineEvent::Shutdown).await;
            });
            let clock: Arc<dyn Clock> = sim_clock;
            run(config, gateway, clock, journal, rx).await
        }
        cli::Mode::Live => {
            error!("live mode is not implemented; wire in a real OrderGateway and rerun");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "engine exited with a fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: Config,
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    journal: Journal<BufWriter<File>>,
    rx: mpsc::Receiver<EngineEvent>,
) -> Result<(), EngineError> {
    let predicate = Box::new(AlwaysLongPredicate);
    let mut orchestrator = Orchestrator::new(
        config.ladder_config(),
        config.instrument(),
        gateway,
        clock,
        predicate,
        journal,
        config.trade_delay(),
        config.max_consecutive_losses(),
    );
    orchestrator.run(rx).await?;
    info!(
        final_balance = %orchestrator.ladder().current_balance(),
        step_index = orchestrator.ladder().step_index(),
        wins = orchestrator.journal().stats().wins,
        losses = orchestrator.journal().stats().losses,
        "engine shut down cleanly"
    );
    Ok(())
}
