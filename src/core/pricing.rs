//! Weight-based pricing.
//!
//! Foods are priced in cents per 100 grams. A line price is
//! `unit_price / 100 * weight`, rounded half-up to a whole cent before it is
//! added to the order total, so the total never drifts from the sum of the
//! printed line prices.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy, prelude::*};

/// Weight in grams used when a caller supplies zero or a negative weight.
pub const DEFAULT_PORTION_GRAMS: f64 = 100.0;

/// Resolves the weight a line is priced at.
///
/// Non-positive weights fall back to [`DEFAULT_PORTION_GRAMS`]; NaN and
/// infinities are rejected.
pub fn effective_weight(requested: f64) -> Result<f64> {
    if !requested.is_finite() {
        return Err(Error::InvalidWeight { weight: requested });
    }
    if requested <= 0.0 {
        return Ok(DEFAULT_PORTION_GRAMS);
    }
    Ok(requested)
}

/// Prices one line in cents, rounding half-up to the cent.
///
/// A weight whose price does not fit the decimal range or an `i64` of cents is
/// an [`Error::InvalidWeight`].
pub fn line_price(unit_price: i64, weight: f64) -> Result<i64> {
    let grams = Decimal::from_f64(weight).ok_or(Error::InvalidWeight { weight })?;
    let exact = Decimal::from(unit_price)
        .checked_mul(grams)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(Error::InvalidWeight { weight })?;

    exact
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(Error::InvalidWeight { weight })
}

/// Renders a cent amount with two decimal places.
#[must_use]
pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
