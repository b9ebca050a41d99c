//! Trade stream client for Binance market data

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::messages::TradeMessage;
use crate::common::errors::{Result, TradeError};
use crate::common::types::PriceEvent;

/// How a single connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Server closed or the socket dropped; reconnect
    Disconnected,
    /// Nobody listens to our events anymore; stop for good
    ReceiverGone,
}

/// Raw trade stream of one symbol, reconnecting on disconnect
pub struct BinanceTradeStream {
    url: String,
    symbol: String,
    reconnect_delay: Duration,
}

impl BinanceTradeStream {
    /// Create a stream for `symbol` against a base URL such as
    /// `wss://stream.binance.com:9443`
    pub fn new(base_url: &str, symbol: &str) -> Result<Self> {
        let url = format!(
            "{}/ws/{}@trade",
            base_url.trim_end_matches('/'),
            symbol.to_lowercase()
        );
        Url::parse(&url).map_err(|e| TradeError::WebSocketConnection(format!("{}: {}", url, e)))?;

        Ok(Self {
            url,
            symbol: symbol.to_uppercase(),
            reconnect_delay: Duration::from_secs(5),
        })
    }

    /// Set the delay between reconnection attempts
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream trades into `events` until its receiver is dropped
    ///
    /// Connection failures are logged and retried after the reconnect delay.
    #[instrument(skip(self, events), fields(symbol = %self.symbol))]
    pub async fn run(self, events: mpsc::Sender<PriceEvent>) -> Result<()> {
        loop {
            match self.stream_once(&events).await {
                Ok(StreamEnd::ReceiverGone) => {
                    info!("Event receiver closed, stopping trade stream");
                    return Ok(());
                }
                Ok(StreamEnd::Disconnected) => {
                    warn!(delay_ms = self.reconnect_delay.as_millis() as u64, "Trade stream disconnected, reconnecting");
                }
                Err(e) => {
                    error!(error = %e, delay_ms = self.reconnect_delay.as_millis() as u64, "Trade stream failed, reconnecting");
                }
            }

            if events.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn stream_once(&self, events: &mpsc::Sender<PriceEvent>) -> Result<StreamEnd> {
        info!("Connecting to Binance trade stream: {}", self.url);
        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TradeError::WebSocketConnection(e.to_string()))?;
        info!("WebSocket connection established");

        let (mut write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => match Self::parse_message(&text) {
                    Ok(Some(event)) => {
                        if events.send(event).await.is_err() {
                            return Ok(StreamEnd::ReceiverGone);
                        }
                    }
                    Ok(None) => debug!("Ignoring message: {}", text),
                    Err(e) => warn!("Failed to parse message: {} - {}", e, text),
                },
                Message::Ping(data) => {
                    debug!("Received Ping, sending Pong");
                    write.send(Message::Pong(data)).await?;
                }
                Message::Close(frame) => {
                    info!("WebSocket closed: {:?}", frame);
                    return Ok(StreamEnd::Disconnected);
                }
                _ => {}
            }
        }

        info!("WebSocket stream ended");
        Ok(StreamEnd::Disconnected)
    }

    /// Parse a stream payload; anything other than a trade is `None`
    pub fn parse_message(text: &str) -> Result<Option<PriceEvent>> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        // Combined streams wrap the payload as {"stream": ..., "data": ...}
        let payload = match value.get("data") {
            Some(data) => data.clone(),
            None => value,
        };

        if payload.get("e").and_then(|e| e.as_str()) != Some("trade") {
            return Ok(None);
        }

        let trade: TradeMessage = serde_json::from_value(payload)?;
        Ok(Some(trade.into()))
    }
}
