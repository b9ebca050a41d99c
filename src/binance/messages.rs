//! Binance wire types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{OrderRecord, OrderStatus, PriceEvent, Side, SymbolFilters};

/// Order as returned by `POST /api/v3/order` (RESULT) and `GET /api/v3/order`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: u64,
    pub price: Decimal,
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    pub status: OrderStatus,
    pub side: Side,
    /// `transactTime` on placement, `time` on lookup
    #[serde(alias = "time", default)]
    pub transact_time: i64,
}

impl From<OrderResponse> for OrderRecord {
    fn from(order: OrderResponse) -> Self {
        OrderRecord {
            order_id: order.order_id,
            symbol: order.symbol,
            side: order.side,
            price: order.price.normalize(),
            quantity: order.orig_qty.normalize(),
            status: order.status,
            transact_time: order.transact_time,
        }
    }
}

/// Body of every non-2xx Binance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Binance error code for an order that does not exist
pub const ERR_NO_SUCH_ORDER: i64 = -2013;

/// Binance error code for an unknown symbol
pub const ERR_BAD_SYMBOL: i64 = -1121;

/// `GET /api/v3/exchangeInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    pub filters: Vec<SymbolFilter>,
}

impl SymbolInfo {
    /// Tick and step size, if both filters are present
    pub fn filters(&self) -> Option<SymbolFilters> {
        let tick_size = self.filters.iter().find_map(|f| match f {
            SymbolFilter::PriceFilter { tick_size } => Some(tick_size.normalize()),
            _ => None,
        })?;
        let step_size = self.filters.iter().find_map(|f| match f {
            SymbolFilter::LotSize { step_size } => Some(step_size.normalize()),
            _ => None,
        })?;
        Some(SymbolFilters {
            tick_size,
            step_size,
        })
    }
}

/// The symbol filters we care about; the rest are ignored
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter {
        #[serde(rename = "tickSize")]
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: Decimal,
    },
    #[serde(other)]
    Other,
}

/// Raw trade stream payload (`<symbol>@trade`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Event type, always `trade`
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "t")]
    pub trade_id: u64,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "q")]
    pub quantity: Decimal,
    /// Not sent by every stream version
    #[serde(rename = "b", default)]
    pub buyer_order_id: u64,
    #[serde(rename = "a", default)]
    pub seller_order_id: u64,
    #[serde(rename = "T")]
    pub trade_time: i64,
    /// Whether the buyer was the maker
    #[serde(rename = "m", default)]
    pub buyer_is_maker: bool,
}

impl From<TradeMessage> for PriceEvent {
    fn from(trade: TradeMessage) -> Self {
        PriceEvent {
            symbol: trade.symbol,
            price: trade.price.normalize(),
            quantity: trade.quantity.normalize(),
            buyer_order_id: trade.buyer_order_id,
            seller_order_id: trade.seller_order_id,
            trade_id: trade.trade_id,
            trade_time: trade.trade_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_placed_order() {
        let json = r#"{
            "symbol": "XRPUSDT",
            "orderId": 28,
            "orderListId": -1,
            "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595,
            "price": "0.51230000",
            "origQty": "195.10000000",
            "executedQty": "0.00000000",
            "cummulativeQuoteQty": "0.00000000",
            "status": "NEW",
            "timeInForce": "GTC",
            "type": "LIMIT",
            "side": "BUY"
        }"#;

        let order: OrderRecord = serde_json::from_str::<OrderResponse>(json).unwrap().into();
        assert_eq!(order.order_id, 28);
        assert_eq!(order.price, dec!(0.5123));
        assert_eq!(order.quantity, dec!(195.1));
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.transact_time, 1507725176595);
    }

    #[test]
    fn test_parse_queried_order_uses_time() {
        let json = r#"{
            "symbol": "XRPUSDT",
            "orderId": 28,
            "price": "0.51230000",
            "origQty": "195.10000000",
            "executedQty": "50.00000000",
            "status": "PARTIALLY_FILLED",
            "side": "SELL",
            "time": 1499827319559,
            "updateTime": 1499827319600
        }"#;

        let order: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.executed_qty, dec!(50));
        assert_eq!(order.transact_time, 1499827319559);
    }

    #[test]
    fn test_parse_exchange_info_filters() {
        let json = r#"{
            "timezone": "UTC",
            "symbols": [{
                "symbol": "XRPUSDT",
                "status": "TRADING",
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.00010000", "maxPrice": "10000.00000000", "tickSize": "0.00010000"},
                    {"filterType": "PERCENT_PRICE_BY_SIDE", "bidMultiplierUp": "5"},
                    {"filterType": "LOT_SIZE", "minQty": "0.10000000", "maxQty": "9222449.00000000", "stepSize": "0.10000000"},
                    {"filterType": "NOTIONAL", "minNotional": "5.00000000"}
                ]
            }]
        }"#;

        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        let filters = info.symbols[0].filters().unwrap();
        assert_eq!(filters.tick_size, dec!(0.0001));
        assert_eq!(filters.step_size, dec!(0.1));
    }

    #[test]
    fn test_parse_trade_message() {
        let json = r#"{"e":"trade","E":1672515782136,"s":"XRPUSDT","t":12345,"p":"0.50010000","q":"100.00000000","b":88,"a":50,"T":1672515782134,"m":true,"M":true}"#;

        let event: PriceEvent = serde_json::from_str::<TradeMessage>(json).unwrap().into();
        assert_eq!(event.symbol, "XRPUSDT");
        assert_eq!(event.price, dec!(0.5001));
        assert_eq!(event.buyer_order_id, 88);
        assert_eq!(event.seller_order_id, 50);
        assert_eq!(event.trade_id, 12345);
    }

    #[test]
    fn test_trade_without_order_ids() {
        let json = r#"{"e":"trade","E":1,"s":"XRPUSDT","t":1,"p":"0.5","q":"1","T":1,"m":false}"#;
        let trade: TradeMessage = serde_json::from_str(json).unwrap();
        assert_eq!(trade.buyer_order_id, 0);
        assert_eq!(trade.seller_order_id, 0);
    }
}
