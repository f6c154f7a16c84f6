// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Exact money arithmetic.
//!
//! Totals and gateway amounts are computed with [`Decimal`]; a value that
//! cannot be represented exactly is rejected rather than rounded.

use crate::BookingError;
use crate::overlap::DateRange;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// ISO 4217 currencies without a minor unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// ISO 4217 currencies with three decimal places.
const THREE_DECIMAL_CURRENCIES: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// `price × nights`.
///
/// # Errors
///
/// Returns [`BookingError::InvalidInput`] if the product overflows, and an
/// internal error if the catalog reports a negative price.
pub fn stay_total(nightly_price: Decimal, range: &DateRange) -> Result<Decimal, BookingError> {
    if nightly_price.is_sign_negative() {
        return Err(BookingError::internal(format!(
            "catalog returned a negative nightly price: {nightly_price}"
        )));
    }
    nightly_price
        .checked_mul(Decimal::from(range.nights()))
        .ok_or_else(|| BookingError::InvalidInput("total amount is out of range".to_string()))
}

/// Number of minor-unit digits for `currency`.
pub fn minor_unit_exponent(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&currency) {
        3
    } else {
        2
    }
}

/// Converts `amount` to the gateway's integer minor units (paise, cents, ...).
///
/// # Errors
///
/// Returns [`BookingError::InvalidInput`] if `amount` is negative, has more
/// decimals than the currency allows, or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, BookingError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(BookingError::InvalidInput(format!(
            "amount {amount} is negative"
        )));
    }

    let factor = Decimal::from(10_i64.pow(minor_unit_exponent(currency)));
    let scaled = amount.checked_mul(factor).ok_or_else(|| {
        BookingError::InvalidInput(format!("amount {amount} {currency} is out of range"))
    })?;
    if !scaled.fract().is_zero() {
        return Err(BookingError::InvalidInput(format!(
            "amount {amount} cannot be expressed exactly in {currency} minor units"
        )));
    }
    scaled.trunc().to_i64().ok_or_else(|| {
        BookingError::InvalidInput(format!("amount {amount} {currency} is out of range"))
    })
}
