//! Decision engine: maps a price event and a worker's state to an action
//!
//! Pure and total. The match arms below are evaluated top to bottom and the
//! first one that applies wins, so their order is part of the contract:
//!
//! 1. no buy order yet                       -> place buy
//! 2. buy filled, fill echo, sell placed     -> skip
//! 3. buy filled, no sell yet                -> place sell
//! 4. event trades against our buy order     -> fetch buy
//! 5. sell filled                            -> exit
//! 6. event trades against our sell order    -> fetch sell
//! 7. buy placed, rebuy not yet requested    -> rebuy or skip
//! 8. anything else                          -> skip

use rust_decimal::Decimal;

use super::rounding::{ceil_to_increment, floor_to_increment};
use super::types::{Decision, WorkerState};
use crate::common::types::{OrderRecord, PriceEvent};

/// Decide what a worker should do with one price event
pub fn decide(event: &PriceEvent, state: &WorkerState) -> Decision {
    match (&state.buy_order, &state.sell_order) {
        (None, _) => place_buy(event.price, state),
        (Some(buy), Some(_)) if buy.is_filled() && event.buyer_order_id == buy.order_id => {
            Decision::Skip
        }
        (Some(buy), None) if buy.is_filled() => Decision::PlaceSellOrder {
            price: sell_price(buy.price, state),
        },
        (Some(buy), _) if event.buyer_order_id == buy.order_id => Decision::FetchBuyOrder,
        (Some(_), Some(sell)) if sell.is_filled() => Decision::Exit,
        (Some(_), Some(sell)) if event.seller_order_id == sell.order_id => {
            Decision::FetchSellOrder
        }
        (Some(buy), _) if !state.rebuy_notified => rebuy_check(event.price, buy, state),
        _ => Decision::Skip,
    }
}

fn place_buy(current_price: Decimal, state: &WorkerState) -> Decision {
    let price = buy_price(current_price, state);
    Decision::PlaceBuyOrder {
        price,
        quantity: quantity(state.budget, price, state.step_size),
    }
}

/// Limit price for the opening buy, floored to the tick size
pub fn buy_price(current_price: Decimal, state: &WorkerState) -> Decimal {
    let target = current_price - current_price * state.buy_down_interval;
    floor_to_increment(target, state.tick_size)
}

/// Largest quantity, in whole steps, that the budget buys at `price`
pub fn quantity(budget: Decimal, price: Decimal, step_size: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    floor_to_increment(budget / price, step_size)
}

/// Limit price for the closing sell
///
/// Rounded up so tick truncation never erodes the profit margin.
pub fn sell_price(buy_price: Decimal, state: &WorkerState) -> Decimal {
    let target = buy_price + buy_price * state.profit_interval;
    ceil_to_increment(target, state.tick_size)
}

/// Price below which a rebuy is requested
pub fn rebuy_price(buy_price: Decimal, state: &WorkerState) -> Decimal {
    buy_price - buy_price * state.rebuy_interval
}

fn rebuy_check(current_price: Decimal, buy: &OrderRecord, state: &WorkerState) -> Decision {
    if current_price < rebuy_price(buy.price, state) {
        Decision::Rebuy
    } else {
        Decision::Skip
    }
}
