//! Conversion between display amounts (HTN, decimal) and sompi (integer).
//!
//! Parsing is exact: no floating point is involved in either direction.

use crate::config::{HTN_DECIMALS, SOMPI_PER_HTN};
use crate::{HoosatError, Result};

/// Parse an unsigned decimal HTN string into sompi.
pub fn htn_to_sompi(amount: &str) -> Result<u64> {
    let invalid = || HoosatError::InvalidPaymentAmount(amount.to_string());

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > HTN_DECIMALS {
        return Err(invalid());
    }

    let whole_value: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let mut fraction_value: u64 = 0;
    for digit in fraction.bytes().chain(std::iter::repeat(b'0')).take(HTN_DECIMALS) {
        fraction_value = fraction_value * 10 + u64::from(digit - b'0');
    }

    whole_value
        .checked_mul(SOMPI_PER_HTN)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(invalid)
}

/// Render sompi as the shortest exact HTN decimal (`2550000000` -> `25.5`).
pub fn sompi_to_htn(sompi: u64) -> String {
    let whole = sompi / SOMPI_PER_HTN;
    let fraction = sompi % SOMPI_PER_HTN;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = HTN_DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
