//! Rounding to exchange-mandated price and quantity increments

use rust_decimal::Decimal;

/// Round down to a whole multiple of `increment`
///
/// A non-positive increment leaves the value untouched.
pub fn floor_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    ((value / increment).floor() * increment).normalize()
}

/// Round up to a whole multiple of `increment`
pub fn ceil_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    ((value / increment).ceil() * increment).normalize()
}
