//! Weighted-average cost arithmetic.
//!
//! Pure functions over [`Holding`]; persistence and price lookup live in
//! [`super::portfolio_service`]. Averages are rounded to 2 decimal places with
//! banker's rounding (`MidpointNearestEven`) after every buy.

use std::str::FromStr;

use chrono::{ DateTime, Utc };
use rust_decimal::{ Decimal, RoundingStrategy };
use uuid::Uuid;

use crate::error::{ AppError, Result };
use crate::models::Holding;

pub const AVERAGE_PRICE_DP: u32 = 2;

/// Parse user supplied numeric text.
///
/// Accepts plain (`0.5`) and exponent (`5e-1`) forms. A comma is taken as the
/// decimal separator. Negative values are rejected.
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let raw = text.trim().replace(',', ".");
    if raw.is_empty() {
        return Err(AppError::InvalidAmount("amount is empty".to_string()));
    }

    let value = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| AppError::InvalidAmount(format!("'{}' is not a number", text.trim())))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::InvalidAmount(format!("'{}' must not be negative", text.trim())));
    }
    Ok(value)
}

/// Canonical form of a coin identifier (CoinGecko ids are lowercase slugs).
pub fn normalize_coin_id(coin_id: &str) -> Result<String> {
    let id = coin_id.trim().to_lowercase();
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(AppError::CoinNotFound(coin_id.trim().to_string()));
    }
    Ok(id)
}

/// `round((q0*a0 + q*p) / (q0+q), 2)`
pub fn weighted_average(
    old_quantity: Decimal,
    old_average: Decimal,
    quantity: Decimal,
    unit_price: Decimal
) -> Result<Decimal> {
    let total_quantity = old_quantity
        .checked_add(quantity)
        .ok_or_else(|| AppError::InvalidAmount("quantity overflow".to_string()))?;
    if total_quantity.is_zero() {
        return Ok(unit_price.round_dp_with_strategy(AVERAGE_PRICE_DP, RoundingStrategy::MidpointNearestEven));
    }

    let old_cost = old_quantity
        .checked_mul(old_average)
        .ok_or_else(|| AppError::InvalidAmount("cost overflow".to_string()))?;
    let new_cost = quantity
        .checked_mul(unit_price)
        .ok_or_else(|| AppError::InvalidAmount("cost overflow".to_string()))?;
    let total_cost = old_cost
        .checked_add(new_cost)
        .ok_or_else(|| AppError::InvalidAmount("cost overflow".to_string()))?;

    let average = total_cost
        .checked_div(total_quantity)
        .ok_or_else(|| AppError::InvalidAmount("average overflow".to_string()))?;

    Ok(average.round_dp_with_strategy(AVERAGE_PRICE_DP, RoundingStrategy::MidpointNearestEven))
}

/// New holding state after buying `quantity` units at `unit_price`.
///
/// With no existing holding the result is unsaved (`version == 0`) and its
/// average is the unit price itself.
pub fn apply_buy(
    existing: Option<&Holding>,
    portfolio_id: Uuid,
    coin_id: &str,
    quantity: Decimal,
    unit_price: Decimal,
    now: DateTime<Utc>
) -> Result<Holding> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(format!("quantity must be positive, got {}", quantity)));
    }
    if unit_price.is_sign_negative() && !unit_price.is_zero() {
        return Err(AppError::InvalidAmount(format!("price must not be negative, got {}", unit_price)));
    }

    match existing {
        None => Ok(Holding::new(portfolio_id, coin_id, quantity, unit_price, now)),
        Some(h) => {
            let mut next = h.clone();
            next.average_price = weighted_average(h.quantity, h.average_price, quantity, unit_price)?;
            next.quantity = h.quantity + quantity;
            next.updated_at = now;
            Ok(next)
        }
    }
}

/// New holding state after selling `quantity` units. The average price is kept.
pub fn apply_sell(
    existing: Option<&Holding>,
    coin_id: &str,
    quantity: Decimal,
    now: DateTime<Utc>
) -> Result<Holding> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(format!("quantity must be positive, got {}", quantity)));
    }

    let h = existing
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::HoldingNotFound(coin_id.to_string()))?;

    if h.quantity < quantity {
        return Err(AppError::InsufficientQuantity {
            held: h.quantity,
            requested: quantity,
        });
    }

    let mut next = h.clone();
    next.quantity = h.quantity - quantity;
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn holding(quantity: Decimal, average: Decimal) -> Holding {
        let mut h = Holding::new(Uuid::new_v4(), "bitcoin", quantity, average, Utc::now());
        h.version = 1;
        h
    }

    #[test]
    fn test_first_buy_uses_unit_price_exactly() {
        let h = apply_buy(None, Uuid::new_v4(), "bitcoin", dec!(0.5), dec!(27123.456), Utc::now()).unwrap();
        assert_eq!(h.quantity, dec!(0.5));
        assert_eq!(h.average_price, dec!(27123.456));
        assert_eq!(h.version, 0);
    }

    #[test]
    fn test_two_buys_average_to_150() {
        let first = apply_buy(None, Uuid::new_v4(), "bitcoin", dec!(1), dec!(100), Utc::now()).unwrap();
        let second = apply_buy(Some(&first), first.portfolio_id, "bitcoin", dec!(1), dec!(200), Utc::now()).unwrap();
        assert_eq!(second.quantity, dec!(2));
        assert_eq!(second.average_price, dec!(150.00));
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn test_weighted_average_rounds_half_even() {
        // (1*0.01 + 1*0.02) / 2 = 0.015 -> 0.02
        assert_eq!(weighted_average(dec!(1), dec!(0.01), dec!(1), dec!(0.02)).unwrap(), dec!(0.02));
        // (1*0.02 + 1*0.03) / 2 = 0.025 -> 0.02
        assert_eq!(weighted_average(dec!(1), dec!(0.02), dec!(1), dec!(0.03)).unwrap(), dec!(0.02));
        // (3*10 + 1*11) / 4 = 10.25
        assert_eq!(weighted_average(dec!(3), dec!(10), dec!(1), dec!(11)).unwrap(), dec!(10.25));
    }

    #[test]
    fn test_buy_rejects_non_positive_quantity_and_negative_price() {
        let id = Uuid::new_v4();
        assert!(matches!(
            apply_buy(None, id, "eth", dec!(0), dec!(1), Utc::now()),
            Err(AppError::InvalidAmount(_))
        ));
        assert!(matches!(
            apply_buy(None, id, "eth", dec!(1), dec!(-1), Utc::now()),
            Err(AppError::InvalidAmount(_))
        ));
        assert!(apply_buy(None, id, "eth", dec!(1), dec!(0), Utc::now()).is_ok());
    }

    #[test]
    fn test_sell_keeps_average_price() {
        let h = holding(dec!(2), dec!(100));
        let after = apply_sell(Some(&h), "bitcoin", dec!(1), Utc::now()).unwrap();
        assert_eq!(after.quantity, dec!(1));
        assert_eq!(after.average_price, dec!(100.00));
    }

    #[test]
    fn test_sell_more_than_held_fails() {
        let h = holding(dec!(1), dec!(100));
        let err = apply_sell(Some(&h), "bitcoin", dec!(1.5), Utc::now()).unwrap_err();
        match err {
            AppError::InsufficientQuantity { held, requested } => {
                assert_eq!(held, dec!(1));
                assert_eq!(requested, dec!(1.5));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sell_against_missing_or_empty_holding_fails() {
        assert!(matches!(
            apply_sell(None, "bitcoin", dec!(1), Utc::now()),
            Err(AppError::HoldingNotFound(_))
        ));
        let empty = holding(dec!(0), dec!(100));
        assert!(matches!(
            apply_sell(Some(&empty), "bitcoin", dec!(1), Utc::now()),
            Err(AppError::HoldingNotFound(_))
        ));
    }

    #[test]
    fn test_sell_entire_position() {
        let h = holding(dec!(0.25), dec!(40000));
        let after = apply_sell(Some(&h), "bitcoin", dec!(0.25), Utc::now()).unwrap();
        assert!(after.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 1.5 ").unwrap(), dec!(1.5));
        assert_eq!(parse_amount("0,25").unwrap(), dec!(0.25));
        assert_eq!(parse_amount("2e-3").unwrap(), dec!(0.002));
        assert!(matches!(parse_amount("abc"), Err(AppError::InvalidAmount(_))));
        assert!(matches!(parse_amount(""), Err(AppError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-3"), Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_normalize_coin_id() {
        assert_eq!(normalize_coin_id(" Bitcoin ").unwrap(), "bitcoin");
        assert!(normalize_coin_id("").is_err());
        assert!(normalize_coin_id("bit coin").is_err());
    }
}
