//! Decimal amounts and provider minor units
//!
//! Amounts arrive as decimals in major units (roubles). The provider wants
//! an integer number of minor units (kopecks). Conversion is exact decimal
//! arithmetic, never floating point:
//!
//! 1. the amount must be positive and fit `NUMERIC(10, 2)`
//! 2. it is rounded to 2 decimal places, half away from zero
//! 3. minor units = rounded amount × 100
//!
//! So `19.995` is stored as `20.00` and charged as `2000`; `19.994` becomes
//! `19.99` and `1999`. The stored amount and the charged amount always agree.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::validation::FieldError;

/// Largest amount accepted (fits NUMERIC(10, 2))
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 0);

/// Rounds an amount to 2 decimal places and checks its range
pub fn normalize_amount(amount: Decimal) -> Result<Decimal, FieldError> {
    if amount <= Decimal::ZERO {
        return Err(FieldError::new("amount", "Amount must be greater than zero"));
    }

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    if rounded.is_zero() {
        return Err(FieldError::new("amount", "Amount must be at least 0.01"));
    }
    if rounded > MAX_AMOUNT {
        return Err(FieldError::new("amount", "Amount is too large"));
    }

    if rounded != amount {
        debug!(amount = %amount, rounded = %rounded, "Amount rounded to two decimal places");
    }

    Ok(rounded)
}

/// Converts a major-unit amount to provider minor units
///
/// # Example
///
/// ```
/// use lms_shared::payments::money::to_minor_units;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(to_minor_units(Decimal::from_str("19.995").unwrap()).unwrap(), 2000);
/// assert_eq!(to_minor_units(Decimal::from_str("19.994").unwrap()).unwrap(), 1999);
/// ```
pub fn to_minor_units(amount: Decimal) -> Result<i64, FieldError> {
    let rounded = normalize_amount(amount)?;

    rounded
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| FieldError::new("amount", "Amount is too large"))
}
