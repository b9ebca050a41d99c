//! REST API client for Binance spot

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::form_urlencoded;

use super::auth::{sign_query, timestamp_ms, API_KEY_HEADER};
use super::messages::*;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::ExchangeClient;
use crate::common::types::{OrderId, OrderRecord, Side, SymbolFilters, TimeInForce};
use crate::config::types::ApiCredentials;

/// Default validity window for signed requests, in milliseconds
pub const DEFAULT_RECV_WINDOW: u64 = 5000;

/// REST API client for Binance spot
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    client: Client,
    base_url: String,
    /// Needed for order endpoints; market data works without
    credentials: Option<ApiCredentials>,
    recv_window: u64,
}

impl BinanceRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            recv_window: DEFAULT_RECV_WINDOW,
        })
    }

    /// Set API credentials for signed requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window = recv_window_ms;
        self
    }

    /// Check connectivity to the REST API
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::parse::<serde_json::Value>(response).await.map(|_| ())
    }

    /// Fetch the exchange info of a single symbol
    #[instrument(skip(self))]
    pub async fn exchange_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let query = encode(&[("symbol", symbol.to_uppercase())]);
        let url = format!("{}/api/v3/exchangeInfo?{}", self.base_url, query);
        debug!("Fetching exchange info from: {}", url);

        let response = self.client.get(&url).send().await?;
        let info: ExchangeInfo = Self::parse(response).await.map_err(|e| match e {
            TradeError::Exchange { code, .. } if code == ERR_BAD_SYMBOL => {
                TradeError::UnknownSymbol(symbol.to_uppercase())
            }
            other => other,
        })?;

        info.symbols
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| TradeError::UnknownSymbol(symbol.to_uppercase()))
    }

    async fn place_limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        let params = vec![
            ("symbol", symbol.to_uppercase()),
            ("side", side.to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", time_in_force.to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("price", price.normalize().to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];

        let order: OrderResponse = self.signed(Method::POST, "/api/v3/order", params).await?;
        debug!(order_id = order.order_id, status = %order.status, "Order placed");
        Ok(order.into())
    }

    /// Send a signed request and decode the response
    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            TradeError::Authentication("API credentials required for signed endpoints".to_string())
        })?;

        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", timestamp_ms().to_string()));
        let query = encode(&params);
        let signature = sign_query(&creds.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &creds.api_key)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Decode a success body, or turn an error body into [`TradeError`]
    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                TradeError::InvalidResponse(format!("Unexpected body ({}): {}", e, body))
            });
        }

        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) if status.as_u16() == 401 => Err(TradeError::Authentication(err.msg)),
            Ok(err) => Err(TradeError::Exchange {
                code: err.code,
                message: err.msg,
            }),
            Err(_) => Err(TradeError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            ))),
        }
    }
}

fn encode(params: &[(&str, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .finish()
}

#[async_trait]
impl ExchangeClient for BinanceRestClient {
    #[instrument(skip(self))]
    async fn place_limit_buy(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        self.place_limit(symbol, Side::Buy, quantity, price, time_in_force)
            .await
    }

    #[instrument(skip(self))]
    async fn place_limit_sell(
        &self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<OrderRecord> {
        self.place_limit(symbol, Side::Sell, quantity, price, time_in_force)
            .await
    }

    #[instrument(skip(self))]
    async fn get_order(
        &self,
        symbol: &str,
        since_timestamp: i64,
        order_id: OrderId,
    ) -> Result<OrderRecord> {
        debug!(since_timestamp, "Looking up order");
        let params = vec![
            ("symbol", symbol.to_uppercase()),
            ("orderId", order_id.to_string()),
        ];

        match self.signed::<OrderResponse>(Method::GET, "/api/v3/order", params).await {
            Ok(order) => Ok(order.into()),
            Err(TradeError::Exchange { code, message }) if code == ERR_NO_SUCH_ORDER => {
                warn!(order_id, %message, "Order not found");
                Err(TradeError::OrderNotFound(order_id))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        let info = self.exchange_info(symbol).await?;
        info.filters().ok_or_else(|| {
            TradeError::InvalidResponse(format!("{} has no price or lot size filter", info.symbol))
        })
    }
}
