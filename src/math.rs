//! Fixed-point decimal helpers.
//!
//! Amounts are decimals quantized to the token's native precision, which makes them
//! exactly the on-chain integers divided by `10^decimals`. Everything that rounds
//! takes an explicit [`Rounding`] so callers decide who absorbs the dust: the vault
//! rounds in its own disfavour when paying out and in its favour when collecting.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

use crate::types::Amount;

pub const MIN_DECIMALS: u32 = 6;
pub const MAX_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Rounding::Down => RoundingStrategy::ToZero,
            Rounding::Up => RoundingStrategy::AwayFromZero,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("Square root of negative value {0}")]
    NegativeSqrt(Decimal),

    #[error("Tick {tick} outside [{min}, {max}]")]
    TickOutOfRange { tick: i32, min: i32, max: i32 },

    #[error("Price {0} cannot be mapped to a tick")]
    InvalidPrice(Decimal),

    #[error("Unsupported decimal precision {0}")]
    UnsupportedDecimals(u32),
}

pub fn check_decimals(decimals: u32) -> Result<u32, MathError> {
    if (MIN_DECIMALS..=MAX_DECIMALS).contains(&decimals) {
        Ok(decimals)
    } else {
        Err(MathError::UnsupportedDecimals(decimals))
    }
}

/// `10^decimals`. Precision is limited to 18 digits so the power fits a u64.
pub fn pow10(decimals: u32) -> Result<Decimal, MathError> {
    let decimals = check_decimals(decimals)?;
    Ok(Decimal::from(10u64.pow(decimals)))
}

/// Smallest representable amount at this precision.
pub fn dust(decimals: u32) -> Decimal {
    Decimal::new(1, decimals)
}

pub fn quantize(value: Decimal, decimals: u32, rounding: Rounding) -> Decimal {
    value.round_dp_with_strategy(decimals, rounding.strategy())
}

pub fn quantize_amount(value: Decimal, decimals: u32, rounding: Rounding) -> Amount {
    Amount::new_unchecked(quantize(value.max(Decimal::ZERO), decimals, rounding))
}

/// `a * b / denominator` quantized to `decimals`.
///
/// Falls back to dividing first when the product does not fit, trading the last
/// digits of precision for range.
pub fn mul_div(
    a: Decimal,
    b: Decimal,
    denominator: Decimal,
    decimals: u32,
    rounding: Rounding,
) -> Result<Decimal, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    let raw = match a.checked_mul(b) {
        Some(product) => product
            .checked_div(denominator)
            .ok_or(MathError::Overflow("mul_div"))?,
        None => a
            .checked_div(denominator)
            .and_then(|q| q.checked_mul(b))
            .ok_or(MathError::Overflow("mul_div"))?,
    };
    Ok(quantize(raw, decimals, rounding))
}

pub fn checked_sqrt(value: Decimal) -> Result<Decimal, MathError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MathError::NegativeSqrt(value));
    }
    value.sqrt().ok_or(MathError::Overflow("sqrt"))
}

/// Whole-unit decimal to native integer units, rounded down.
pub fn to_native_units(value: Decimal, decimals: u32) -> Result<u128, MathError> {
    if value.is_sign_negative() {
        return Ok(0);
    }
    let scale = 10u128.pow(check_decimals(decimals)?);
    let whole = value
        .trunc()
        .to_u128()
        .ok_or(MathError::Overflow("to_native_units"))?;
    let fraction = (value.fract() * Decimal::from(10u64.pow(decimals)))
        .trunc()
        .to_u128()
        .ok_or(MathError::Overflow("to_native_units"))?;
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(MathError::Overflow("to_native_units"))
}

/// Native integer units back to a whole-unit decimal. Exact.
pub fn from_native_units(raw: u128, decimals: u32) -> Result<Decimal, MathError> {
    let scale = 10u128.pow(check_decimals(decimals)?);
    let whole = Decimal::from_u128(raw / scale).ok_or(MathError::Overflow("from_native_units"))?;
    let fraction = Decimal::from_u128(raw % scale).ok_or(MathError::Overflow("from_native_units"))?;
    Ok(whole + fraction / pow10(decimals)?)
}
