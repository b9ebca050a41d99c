//! Broadcast channels backing the trade feed and the order update stream

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use super::errors::{Result, TradeError};
use super::traits::{EventFeed, OrderSink};
use super::types::{OrderRecord, PriceEvent};

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// In-process trade feed with one broadcast topic per symbol
///
/// Topics are created on first use by either side.
#[derive(Clone)]
pub struct BroadcastFeed {
    capacity: usize,
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<PriceEvent>>>>,
}

impl BroadcastFeed {
    /// Create a feed with the default buffer size
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_SIZE)
    }

    /// Create a feed with a custom per-symbol buffer size
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn topic(&self, symbol: &str) -> Result<broadcast::Sender<PriceEvent>> {
        let key = symbol.to_uppercase();
        if let Some(sender) = self
            .topics
            .read()
            .map_err(|e| TradeError::Internal(e.to_string()))?
            .get(&key)
        {
            return Ok(sender.clone());
        }

        let mut topics = self
            .topics
            .write()
            .map_err(|e| TradeError::Internal(e.to_string()))?;
        let sender = topics
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }

    /// Publish a tick to its symbol's subscribers
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: PriceEvent) -> Result<usize> {
        let sender = self.topic(&event.symbol)?;
        // No subscribers is not an error: ticks before the first trader are dropped
        Ok(sender.send(event).unwrap_or(0))
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed for BroadcastFeed {
    fn subscribe(&self, symbol: &str) -> Result<broadcast::Receiver<PriceEvent>> {
        Ok(self.topic(symbol)?.subscribe())
    }
}

/// Order update stream every trader publishes to
#[derive(Clone)]
pub struct BroadcastOrderSink {
    sender: broadcast::Sender<OrderRecord>,
}

impl BroadcastOrderSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every order update published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<OrderRecord> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastOrderSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderSink for BroadcastOrderSink {
    async fn publish(&self, order: &OrderRecord) -> Result<()> {
        match self.sender.send(order.clone()) {
            Ok(receivers) => trace!(order_id = order.order_id, receivers, "Order update published"),
            Err(_) => trace!(order_id = order.order_id, "Order update published with no listeners"),
        }
        Ok(())
    }
}

/// Republish every event from an upstream stream client onto the feed
///
/// Returns once the upstream sender is dropped.
pub async fn forward_events(mut upstream: mpsc::Receiver<PriceEvent>, feed: BroadcastFeed) {
    while let Some(event) = upstream.recv().await {
        if let Err(e) = feed.publish(event) {
            warn!(error = %e, "Failed to publish trade event");
        }
    }
    debug!("Upstream trade stream closed");
}
