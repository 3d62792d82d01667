use std::path::Path;

use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::events::{EngineEvent, Quote};

/// A row as it appears in a backtest quotes CSV: `ts,bid,ask`.
#[derive(Debug, Deserialize)]
struct QuoteRow {
    ts: u64,
    bid: Decimal,
    ask: Decimal,
}

/// Spawns a task that generates a synthetic random-walk quote stream, for `demo` mode. Mirrors
/// the teacher's `feeds::*::spawn(tx)` reconnect-loop shape, minus any network dependency.
pub fn spawn_demo_feed(tx: mpsc::Sender<EngineEvent>, start_price: Decimal, spread: Decimal) {
    tokio::spawn(async move {
        let mut mid = start_price;
        let mut rng = rand::thread_rng();
        loop {
            let drift = Decimal::new(rng.gen_range(-50..=50), 5);
            mid += drift;
            if mid <= spread {
                mid = start_price;
            }
            let half_spread = spread / Decimal::from(2);
            let quote = Quote {
                bid: mid - half_spread,
                ask: mid + half_spread,
                ts: now_ns(),
            };
            if tx.send(EngineEvent::Quote(quote)).await.is_err() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    });
}

fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos() as u64
}

/// Replays a recorded quote history from a CSV file (`ts,bid,ask` header) for `backtest` mode.
/// Restricts to the inclusive `[start_ts, end_ts]` range when either bound is supplied.
pub fn read_backtest_quotes(
    path: impl AsRef<Path>,
    start_ts: Option<u64>,
    end_ts: Option<u64>,
) -> anyhow::Result<Vec<Quote>> {
    let reader = csv::Reader::from_path(path)?;
    parse_quotes(reader, start_ts, end_ts)
}

fn parse_quotes<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    start_ts: Option<u64>,
    end_ts: Option<u64>,
) -> anyhow::Result<Vec<Quote>> {
    let mut quotes = Vec::new();
    for record in reader.deserialize() {
        let row: QuoteRow = record?;
        if let Some(start) = start_ts {
            if row.ts < start {
                continue;
            }
        }
        if let Some(end) = end_ts {
            if row.ts > end {
                continue;
            }
        }
        quotes.push(Quote {
            bid: row.bid,
            ask: row.ask,
            ts: row.ts,
        });
    }
    quotes.sort_by_key(|q| q.ts);
    Ok(quotes)
}
