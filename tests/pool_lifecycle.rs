//! End-to-end tests: orchestrator + paper exchange + broadcast feed
//!
//! Ticks go through the same bridge the binary uses in paper mode, so fills
//! reach workers as synthetic trade events carrying their order ids.

mod common;

use common::*;
use naive_trader::common::channels::{BroadcastFeed, BroadcastOrderSink};
use naive_trader::common::types::{OrderRecord, OrderStatus, PriceEvent, Side};
use naive_trader::config::types::{AppSettings, TradingConfig};
use naive_trader::paper::{run_feed_bridge, PaperExchange};
use naive_trader::strategy::WorkerId;
use naive_trader::trader::Orchestrator;
use naive_trader::TradeError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);
const PUMP_INTERVAL: Duration = Duration::from_millis(20);

struct Harness {
    orchestrator: Orchestrator,
    exchange: Arc<PaperExchange>,
    ticks: mpsc::Sender<PriceEvent>,
    orders: broadcast::Receiver<OrderRecord>,
    next_trade_id: u64,
}

impl Harness {
    fn new(chunks: usize) -> Self {
        let exchange = Arc::new(PaperExchange::new());
        exchange.register_symbol(SYMBOL, *CENT_FILTERS);

        let feed = BroadcastFeed::with_capacity(256);
        let sink = Arc::new(BroadcastOrderSink::with_capacity(256));
        let orders = sink.subscribe();

        let (ticks, upstream) = mpsc::channel(256);
        tokio::spawn(run_feed_bridge(upstream, feed.clone(), exchange.clone()));

        let trading = TradingConfig {
            symbols: vec![SYMBOL.to_string()],
            chunks,
            budget: dec!(100) * Decimal::from(chunks),
            buy_down_interval: dec!(0.01),
            profit_interval: dec!(0.001),
            rebuy_interval: dec!(0.01),
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(
            trading,
            AppSettings::default(),
            exchange.clone(),
            sink,
            Arc::new(feed),
        );

        Self {
            orchestrator,
            exchange,
            ticks,
            orders,
            next_trade_id: 1,
        }
    }

    async fn send(&mut self, price: Decimal) {
        let event = tick(price).with_trade_id(self.next_trade_id);
        self.next_trade_id += 1;
        self.ticks.send(event).await.unwrap();
    }

    /// Keep ticking at `price` until the next order update shows up
    async fn pump_until_order(&mut self, price: Decimal) -> OrderRecord {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            if let Ok(order) = self.orders.try_recv() {
                return order;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no order update while ticking at {}",
                price
            );
            self.send(price).await;
            sleep(PUMP_INTERVAL).await;
        }
    }

    /// Send a single tick and wait for the order update it causes
    async fn tick_once(&mut self, price: Decimal) -> OrderRecord {
        self.send(price).await;
        timeout(WAIT, self.orders.recv())
            .await
            .expect("no order update")
            .unwrap()
    }
}

#[test_log::test(tokio::test)]
async fn test_full_cycle_and_replacement() {
    let mut h = Harness::new(2);
    h.orchestrator.start_trading(SYMBOL).await.unwrap();

    let buy = h.pump_until_order(dec!(10.00)).await;
    assert_eq!((buy.side, buy.status), (Side::Buy, OrderStatus::New));
    assert_eq!(buy.price, dec!(9.90));
    assert_eq!(buy.quantity, dec!(10.10));

    // 9.85 crosses the buy but stays above the rebuy threshold
    let filled = h.pump_until_order(dec!(9.85)).await;
    assert_eq!(filled.order_id, buy.order_id);
    assert_eq!(filled.status, OrderStatus::Filled);

    let sell = h.pump_until_order(dec!(9.86)).await;
    assert_eq!((sell.side, sell.status), (Side::Sell, OrderStatus::New));
    assert_eq!(sell.price, dec!(9.91));
    assert_eq!(sell.quantity, buy.quantity);

    let sold = h.pump_until_order(dec!(9.95)).await;
    assert_eq!(sold.order_id, sell.order_id);
    assert_eq!(sold.status, OrderStatus::Filled);

    // The next tick ends the cycle; the replacement then opens a new buy
    let replacement_buy = h.pump_until_order(dec!(10.00)).await;
    assert_eq!(replacement_buy.side, Side::Buy);
    assert_eq!(replacement_buy.status, OrderStatus::New);
    assert!(replacement_buy.order_id > sell.order_id);

    let workers = h.orchestrator.snapshot(SYMBOL).await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].id, WorkerId(2));
    assert_eq!(workers[0].budget, dec!(100));

    h.orchestrator.stop_trading(SYMBOL).await.unwrap();
}

#[tokio::test]
async fn test_falling_market_stays_within_chunks() {
    let mut h = Harness::new(2);
    h.orchestrator.start_trading(SYMBOL).await.unwrap();
    h.pump_until_order(dec!(10.00)).await;

    // Every drop below a buy's rebuy threshold asks for another worker
    let mut price = dec!(10.00);
    for _ in 0..40 {
        price -= dec!(0.20);
        h.send(price).await;
        sleep(PUMP_INTERVAL).await;
    }

    let workers = timeout(WAIT, async {
        loop {
            let workers = h.orchestrator.snapshot(SYMBOL).await.unwrap();
            if workers.len() == 2 && workers.iter().all(|w| w.rebuy_notified) {
                return workers;
            }
            h.send(price).await;
            sleep(PUMP_INTERVAL).await;
        }
    })
    .await
    .expect("pool never reached its cap");

    assert_eq!(workers.len(), 2);
    for _ in 0..10 {
        h.send(price).await;
    }
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.orchestrator.snapshot(SYMBOL).await.unwrap().len(), 2);

    h.orchestrator.stop_all().await.unwrap();
    assert!(h.orchestrator.trading_symbols().is_empty());
}

#[tokio::test]
async fn test_stop_leaves_open_orders_on_exchange() {
    let mut h = Harness::new(1);
    h.orchestrator.start_trading(SYMBOL).await.unwrap();
    let buy = h.pump_until_order(dec!(10.00)).await;

    h.orchestrator.stop_trading(SYMBOL).await.unwrap();

    let open = h.exchange.open_orders(SYMBOL);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].order_id, buy.order_id);
    assert!(matches!(
        h.orchestrator.snapshot(SYMBOL).await,
        Err(TradeError::NotTrading(_))
    ));
}

#[tokio::test]
async fn test_graceful_shutdown_waits_for_cycle() {
    let mut h = Harness::new(1);
    h.orchestrator.start_trading(SYMBOL).await.unwrap();
    h.pump_until_order(dec!(10.00)).await;
    h.pump_until_order(dec!(9.85)).await;
    h.pump_until_order(dec!(9.86)).await;
    // A single tick, so the cycle cannot end before shutdown is requested
    let sold = h.tick_once(dec!(9.95)).await;
    assert_eq!(sold.status, OrderStatus::Filled);

    // Keep the market moving so the worker sees the tick that ends its cycle
    let ticks = h.ticks.clone();
    let pump = tokio::spawn(async move {
        loop {
            if ticks.send(tick(dec!(10.00))).await.is_err() {
                break;
            }
            sleep(PUMP_INTERVAL).await;
        }
    });

    timeout(WAIT, h.orchestrator.shutdown_trading(SYMBOL))
        .await
        .expect("shutdown did not complete")
        .unwrap();
    pump.abort();

    // No replacement was started, so no new buy was placed
    assert!(h.exchange.open_orders(SYMBOL).is_empty());
}
