use std::sync::Mutex;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::errors::GatewayError;
use crate::events::{EngineEvent, Quote, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub client_id: String,
    pub ts: u64,
}

/// Order submission/cancellation surface the orchestrator drives. Fills and rejects are not
/// returned here — they arrive later as `EngineEvent`s on the shared channel, same as a real
/// exchange's asynchronous execution reports.
#[async_trait::async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_market(
        &self,
        side: Side,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError>;

    async fn submit_stop(
        &self,
        side: Side,
        trigger_price: Decimal,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError>;

    async fn submit_limit(
        &self,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError>;

    async fn cancel(&self, client_id: &str) -> Result<Acknowledgement, GatewayError>;

    /// Let the gateway observe market data so it can evaluate resting protective orders and
    /// price the next market fill. A no-op for gateways that don't need it (e.g. a live
    /// exchange gateway, which learns of fills via its own execution-report stream instead).
    async fn on_market_data(&self, _quote: Quote) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderKind {
    Stop,
    Limit,
}

#[derive(Debug, Clone)]
struct PendingOrder {
    client_id: String,
    side: Side,
    kind: OrderKind,
    trigger_price: Decimal,
    quantity: Decimal,
}

/// In-process gateway for `demo` and `backtest` modes. Market orders fill instantly at the last
/// known touch; stop and limit orders sit in a pending list until `on_quote` observes a price
/// that would trigger them, then emit a `Fill` onto the shared channel — mirroring the
/// asynchronous execution-report pattern a real exchange gateway would produce.
pub struct DemoGateway {
    tx: mpsc::Sender<EngineEvent>,
    pending: Mutex<Vec<PendingOrder>>,
    last_quote: Mutex<Option<Quote>>,
}

impl DemoGateway {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            tx,
            pending: Mutex::new(Vec::new()),
            last_quote: Mutex::new(None),
        }
    }

    /// Feed the gateway the latest quote so it can evaluate pending protective orders and price
    /// the next market fill. Called by the orchestrator on every `Quote` event.
    pub async fn on_quote(&self, quote: Quote) {
        *self.last_quote.lock().unwrap() = Some(quote);

        let triggered: Vec<PendingOrder> = {
            let mut pending = self.pending.lock().unwrap();
            let mut triggered = Vec::new();
            pending.retain(|order| {
                let fires = match (order.side, order.kind) {
                    (Side::Long, OrderKind::Stop) => quote.bid <= order.trigger_price,
                    (Side::Long, OrderKind::Limit) => quote.bid >= order.trigger_price,
                    (Side::Short, OrderKind::Stop) => quote.ask >= order.trigger_price,
                    (Side::Short, OrderKind::Limit) => quote.ask <= order.trigger_price,
                };
                if fires {
                    triggered.push(order.clone());
                }
                !fires
            });
            triggered
        };

        for order in triggered {
            let _ = self
                .tx
                .send(EngineEvent::Fill {
                    client_id: order.client_id,
                    side: order.side,
                    price: order.trigger_price,
                    quantity: order.quantity,
                    ts: quote.ts,
                })
                .await;
        }
    }
}

#[async_trait::async_trait]
impl OrderGateway for DemoGateway {
    async fn on_market_data(&self, quote: Quote) {
        self.on_quote(quote).await;
    }

    async fn submit_market(
        &self,
        side: Side,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError> {
        let quote = *self.last_quote.lock().unwrap();
        let Some(quote) = quote else {
            return Err(GatewayError::Transient {
                client_id: client_id.to_string(),
                reason: "no market data yet".to_string(),
            });
        };
        let fill_price = match side {
            Side::Long => quote.ask,
            Side::Short => quote.bid,
        };
        let _ = self
            .tx
            .send(EngineEvent::Fill {
                client_id: client_id.to_string(),
                side,
                price: fill_price,
                quantity,
                ts: quote.ts,
            })
            .await;
        Ok(Acknowledgement {
            client_id: client_id.to_string(),
            ts: quote.ts,
        })
    }

    async fn submit_stop(
        &self,
        side: Side,
        trigger_price: Decimal,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError> {
        let ts = self.last_quote.lock().unwrap().map(|q| q.ts).unwrap_or(0);
        self.pending.lock().unwrap().push(PendingOrder {
            client_id: client_id.to_string(),
            side,
            kind: OrderKind::Stop,
            trigger_price,
            quantity,
        });
        Ok(Acknowledgement {
            client_id: client_id.to_string(),
            ts,
        })
    }

    async fn submit_limit(
        &self,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        client_id: &str,
    ) -> Result<Acknowledgement, GatewayError> {
        let ts = self.last_quote.lock().unwrap().map(|q| q.ts).unwrap_or(0);
        self.pending.lock().unwrap().push(PendingOrder {
            client_id: client_id.to_string(),
            side,
            kind: OrderKind::Limit,
            trigger_price: price,
            quantity,
        });
        Ok(Acknowledgement {
            client_id: client_id.to_string(),
            ts,
        })
    }

    async fn cancel(&self, client_id: &str) -> Result<Acknowledgement, GatewayError> {
        let ts = self.last_quote.lock().unwrap().map(|q| q.ts).unwrap_or(0);
        self.pending
            .lock()
            .unwrap()
            .retain(|order| order.client_id != client_id);
        Ok(Acknowledgement {
            client_id: client_id.to_string(),
            ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(bid: Decimal, ask: Decimal, ts: u64) -> Quote {
        Quote { bid, ask, ts }
    }

    #[tokio::test]
    async fn market_order_fills_at_ask_for_long() {
        let (tx, mut rx) = mpsc::channel(8);
        let gateway = DemoGateway::new(tx);
        gateway.on_quote(quote(dec!(1.1040), dec!(1.1042), 1)).await;

        gateway
            .submit_market(Side::Long, dec!(0.01), "entry-1")
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        match event {
            EngineEvent::Fill { price, side, .. } => {
                assert_eq!(price, dec!(1.1042));
                assert_eq!(side, Side::Long);
            }
            other => panic!("expected Fill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stop_order_fires_when_bid_crosses_trigger() {
        let (tx, mut rx) = mpsc::channel(8);
        let gateway = DemoGateway::new(tx);
        gateway.on_quote(quote(dec!(1.1040), dec!(1.1042), 1)).await;

        gateway
            .submit_stop(Side::Long, dec!(0.90000), dec!(0.01), "stop-1")
            .await
            .unwrap();

        // Not triggered yet.
        gateway.on_quote(quote(dec!(1.0000), dec!(1.0002), 2)).await;
        assert!(rx.try_recv().is_err());

        // Now crosses below the stop.
        gateway.on_quote(quote(dec!(0.8999), dec!(0.9001), 3)).await;
        let event = rx.recv().await.unwrap();
        match event {
            EngineEvent::Fill { client_id, price, .. } => {
                assert_eq!(client_id, "stop-1");
                assert_eq!(price, dec!(0.90000));
            }
            other => panic!("expected Fill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancel_removes_pending_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let gateway = DemoGateway::new(tx);
        gateway.on_quote(quote(dec!(1.1040), dec!(1.1042), 1)).await;
        gateway
            .submit_stop(Side::Long, dec!(0.90000), dec!(0.01), "stop-1")
            .await
            .unwrap();
        gateway.cancel("stop-1").await.unwrap();

        gateway.on_quote(quote(dec!(0.80000), dec!(0.80010), 2)).await;
        assert!(rx.try_recv().is_err());
    }
}
