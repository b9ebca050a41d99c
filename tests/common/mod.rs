//! Common test utilities and fixtures
#![allow(dead_code)]

use naive_trader::common::types::{OrderRecord, OrderStatus, PriceEvent, Side, SymbolFilters};
use naive_trader::strategy::{PoolSettings, WorkerId, WorkerState};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const SYMBOL: &str = "XRPUSDT";

/// Cent-sized price and quantity increments
pub static CENT_FILTERS: Lazy<SymbolFilters> = Lazy::new(|| SymbolFilters {
    tick_size: dec!(0.01),
    step_size: dec!(0.01),
});

/// Pool settings with cent-sized increments and a 1% buy-down
pub fn sample_settings(chunks: usize) -> PoolSettings {
    PoolSettings {
        symbol: SYMBOL.to_string(),
        chunks,
        total_budget: dec!(100) * Decimal::from(chunks),
        buy_down_interval: dec!(0.01),
        profit_interval: dec!(0.001),
        rebuy_interval: dec!(0.01),
        tick_size: CENT_FILTERS.tick_size,
        step_size: CENT_FILTERS.step_size,
    }
}

/// A fresh worker with a 100 USDT budget
pub fn fresh_state() -> WorkerState {
    sample_settings(1).fresh_state(WorkerId(1))
}

pub fn sample_order(order_id: u64, side: Side, price: Decimal, status: OrderStatus) -> OrderRecord {
    OrderRecord {
        order_id,
        symbol: SYMBOL.to_string(),
        side,
        price,
        quantity: dec!(10.10),
        status,
        transact_time: 1_704_067_200_000,
    }
}

pub fn tick(price: Decimal) -> PriceEvent {
    PriceEvent::tick(SYMBOL, price)
}

/// Sample Binance REST responses
pub mod api_responses {
    pub const ORDER_NEW: &str = r#"{
        "symbol": "XRPUSDT",
        "orderId": 28,
        "orderListId": -1,
        "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
        "transactTime": 1704067200000,
        "price": "0.51230000",
        "origQty": "195.10000000",
        "executedQty": "0.00000000",
        "cummulativeQuoteQty": "0.00000000",
        "status": "NEW",
        "timeInForce": "GTC",
        "type": "LIMIT",
        "side": "BUY"
    }"#;

    pub const ORDER_FILLED: &str = r#"{
        "symbol": "XRPUSDT",
        "orderId": 28,
        "orderListId": -1,
        "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
        "price": "0.51230000",
        "origQty": "195.10000000",
        "executedQty": "195.10000000",
        "cummulativeQuoteQty": "99.94973000",
        "status": "FILLED",
        "timeInForce": "GTC",
        "type": "LIMIT",
        "side": "BUY",
        "time": 1704067200000,
        "updateTime": 1704067260000,
        "isWorking": true
    }"#;

    pub const EXCHANGE_INFO: &str = r#"{
        "timezone": "UTC",
        "serverTime": 1704067200000,
        "symbols": [{
            "symbol": "XRPUSDT",
            "status": "TRADING",
            "baseAsset": "XRP",
            "quoteAsset": "USDT",
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.00010000", "maxPrice": "10000.00000000", "tickSize": "0.00010000"},
                {"filterType": "LOT_SIZE", "minQty": "0.10000000", "maxQty": "9222449.00000000", "stepSize": "0.10000000"},
                {"filterType": "ICEBERG_PARTS", "limit": 10}
            ]
        }]
    }"#;

    pub const INSUFFICIENT_BALANCE: &str =
        r#"{"code": -2010, "msg": "Account has insufficient balance for requested action."}"#;

    pub const NO_SUCH_ORDER: &str = r#"{"code": -2013, "msg": "Order does not exist."}"#;

    pub const BAD_SYMBOL: &str = r#"{"code": -1121, "msg": "Invalid symbol."}"#;

    pub const BAD_API_KEY: &str = r#"{"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_settings_are_valid() {
        assert!(sample_settings(3).validate().is_ok());
        assert_eq!(fresh_state().budget, dec!(100));
    }
}
