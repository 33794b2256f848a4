//! Duration string parsing
//!
//! Format: `<number><unit>` with no whitespace, where the number is an
//! integer or decimal with an optional sign and the unit is one of
//! `s ms us ns ps fs`. The decimal is converted with exact rational
//! arithmetic and rounded once, to the nearest tick.

use cosim_core::{CosimError, CosimResult, SimTime, TimeUnit};

use crate::Resolution;

/// Fractional digits beyond this are below a femtosecond of a second
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a duration string into raw ticks of `resolution`
pub fn parse_duration(text: &str, resolution: &Resolution) -> CosimResult<SimTime> {
    let invalid = || CosimError::InvalidDuration(text.to_string());

    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;
    let (number, suffix) = text.split_at(split);
    let unit = TimeUnit::from_suffix(suffix).ok_or_else(invalid)?;

    let (negative, digits) = match number.as_bytes().first() {
        Some(b'-') => (true, &number[1..]),
        Some(b'+') => (false, &number[1..]),
        _ => (false, number),
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }

    let frac_part = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac_value: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().map_err(|_| invalid())?
    };

    // value = numerator / scale, in `unit`
    let scale = 10i128.pow(frac_part.len() as u32);
    let numerator = int_value
        .checked_mul(scale)
        .and_then(|n| n.checked_add(frac_value))
        .ok_or_else(invalid)?;

    let info = resolution.info(unit);
    let factor = info.factor as i128;
    let (num, den) = if info.from_mul {
        (numerator.checked_mul(factor).ok_or_else(invalid)?, scale)
    } else {
        (numerator, scale.checked_mul(factor).ok_or_else(invalid)?)
    };

    // numerator is non-negative here, so this rounds half away from zero
    let ticks = num.checked_add(den / 2).ok_or_else(invalid)? / den;
    let ticks = if negative { -ticks } else { ticks };
    let ticks = i64::try_from(ticks).map_err(|_| invalid())?;

    Ok(SimTime::from_ticks(ticks))
}
