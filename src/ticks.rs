// 2.0 ticks.rs: discretized price ranges. price = 1.0001^tick, same encoding as the exchange.
// 2.1 tick <-> price conversion, 2.2 alignment to spacing, 2.3 liquidity <-> token amounts.
//
// the tick domain is narrower than a 256-bit exchange's so every price fits a 96-bit decimal
// with at least ten significant digits.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::math::{self, MathError, Rounding};
use crate::types::{Amount, Bps, Liquidity, Tick};

pub const MIN_TICK: i32 = -400_000;
pub const MAX_TICK: i32 = 400_000;

const TICK_BASE: Decimal = dec!(1.0001);
// ln(1.0001)
const LN_TICK_BASE: Decimal = dec!(0.0000999950003333083353331667);

pub fn check_tick(tick: Tick) -> Result<Tick, MathError> {
    if tick.0 < MIN_TICK || tick.0 > MAX_TICK {
        return Err(MathError::TickOutOfRange {
            tick: tick.0,
            min: MIN_TICK,
            max: MAX_TICK,
        });
    }
    Ok(tick)
}

// 2.1: exact repeated squaring, no series approximation
pub fn tick_to_price(tick: Tick) -> Result<Decimal, MathError> {
    check_tick(tick)?;
    TICK_BASE
        .checked_powi(i64::from(tick.0))
        .ok_or(MathError::Overflow("tick_to_price"))
}

pub fn sqrt_price_at_tick(tick: Tick) -> Result<Decimal, MathError> {
    math::checked_sqrt(tick_to_price(tick)?)
}

/// Greatest tick whose price does not exceed `price`.
///
/// The logarithm only seeds the search; the result is settled against
/// [`tick_to_price`] so the two functions agree exactly on tick boundaries.
pub fn price_to_tick(price: Decimal) -> Result<Tick, MathError> {
    if price <= Decimal::ZERO {
        return Err(MathError::InvalidPrice(price));
    }
    let ln = price.checked_ln().ok_or(MathError::InvalidPrice(price))?;
    let estimate = (ln / LN_TICK_BASE)
        .floor()
        .to_i64()
        .ok_or(MathError::InvalidPrice(price))?;
    if estimate < i64::from(MIN_TICK) - 1 || estimate > i64::from(MAX_TICK) + 1 {
        return Err(MathError::TickOutOfRange {
            tick: estimate.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            min: MIN_TICK,
            max: MAX_TICK,
        });
    }

    let mut tick = (estimate as i32).clamp(MIN_TICK, MAX_TICK);
    while tick < MAX_TICK && tick_to_price(Tick(tick + 1))? <= price {
        tick += 1;
    }
    while tick_to_price(Tick(tick))? > price {
        if tick == MIN_TICK {
            return Err(MathError::TickOutOfRange {
                tick: MIN_TICK - 1,
                min: MIN_TICK,
                max: MAX_TICK,
            });
        }
        tick -= 1;
    }
    Ok(Tick(tick))
}

// 2.2: alignment. ranges on the exchange must start and end on multiples of the spacing.
pub fn align_down(tick: Tick, spacing: i32) -> Tick {
    Tick(tick.0.div_euclid(spacing) * spacing)
}

pub fn align_up(tick: Tick, spacing: i32) -> Tick {
    let down = align_down(tick, spacing);
    if down == tick {
        tick
    } else {
        Tick(down.0 + spacing)
    }
}

/// Number of ticks spanned by a relative price move of `width`.
pub fn ticks_for_width(width: Bps) -> Result<i32, MathError> {
    let multiplier = Decimal::ONE + width.as_fraction();
    Ok(price_to_tick(multiplier)?.0)
}

// 2.3: concentrated-liquidity amounts. token is the issued asset, reserve the backing asset.

/// Token and reserve held by `liquidity` over `[lower, upper]` with spot at `spot_sqrt`.
pub fn amounts_for_liquidity(
    spot_sqrt: Decimal,
    lower: Tick,
    upper: Tick,
    liquidity: Liquidity,
    decimals: u32,
    rounding: Rounding,
) -> Result<(Amount, Amount), MathError> {
    if liquidity.is_zero() {
        return Ok((Amount::ZERO, Amount::ZERO));
    }
    let sa = sqrt_price_at_tick(lower)?;
    let sb = sqrt_price_at_tick(upper)?;
    let l = math::from_native_units(liquidity.0, decimals)?;

    let (token, reserve) = if spot_sqrt <= sa {
        (token_delta(l, sa, sb)?, Decimal::ZERO)
    } else if spot_sqrt >= sb {
        (Decimal::ZERO, reserve_delta(l, sa, sb)?)
    } else {
        (token_delta(l, spot_sqrt, sb)?, reserve_delta(l, sa, spot_sqrt)?)
    };

    Ok((
        math::quantize_amount(token, decimals, rounding),
        math::quantize_amount(reserve, decimals, rounding),
    ))
}

fn token_delta(l: Decimal, lo: Decimal, hi: Decimal) -> Result<Decimal, MathError> {
    let width = hi - lo;
    l.checked_mul(width)
        .and_then(|n| n.checked_div(lo * hi))
        .ok_or(MathError::Overflow("token_delta"))
}

fn reserve_delta(l: Decimal, lo: Decimal, hi: Decimal) -> Result<Decimal, MathError> {
    l.checked_mul(hi - lo).ok_or(MathError::Overflow("reserve_delta"))
}

// liquidity is sized from `amount` less two units of dust so the amounts owed at mint,
// rounded up, never exceed `amount`.
fn sizing_budget(amount: Amount, decimals: u32) -> Decimal {
    (amount.value() - math::dust(decimals) * Decimal::TWO).max(Decimal::ZERO)
}

/// Liquidity that deposits at most `amount` of reserve into `[lower, upper]`.
/// Zero when the range sits entirely above spot.
pub fn liquidity_for_reserve(
    spot_sqrt: Decimal,
    lower: Tick,
    upper: Tick,
    amount: Amount,
    decimals: u32,
) -> Result<Liquidity, MathError> {
    let sa = sqrt_price_at_tick(lower)?;
    let sb = sqrt_price_at_tick(upper)?;
    let top = spot_sqrt.min(sb);
    if top <= sa {
        return Ok(Liquidity::ZERO);
    }
    let l = sizing_budget(amount, decimals)
        .checked_div(top - sa)
        .ok_or(MathError::Overflow("liquidity_for_reserve"))?;
    Ok(Liquidity(math::to_native_units(l, decimals)?))
}

/// Liquidity that deposits at most `amount` of token into `[lower, upper]`.
/// Zero when the range sits entirely below spot.
pub fn liquidity_for_token(
    spot_sqrt: Decimal,
    lower: Tick,
    upper: Tick,
    amount: Amount,
    decimals: u32,
) -> Result<Liquidity, MathError> {
    let sa = sqrt_price_at_tick(lower)?;
    let sb = sqrt_price_at_tick(upper)?;
    let bottom = spot_sqrt.max(sa);
    if bottom >= sb {
        return Ok(Liquidity::ZERO);
    }
    let l = sizing_budget(amount, decimals)
        .checked_mul(bottom)
        .and_then(|v| v.checked_mul(sb))
        .and_then(|v| v.checked_div(sb - bottom))
        .ok_or(MathError::Overflow("liquidity_for_token"))?;
    Ok(Liquidity(math::to_native_units(l, decimals)?))
}

/// Most liquidity `[lower, upper]` can hold with at most `token` and `reserve`.
/// Below spot only reserve counts, above spot only token, across spot the scarcer side.
pub fn liquidity_for_amounts(
    spot_sqrt: Decimal,
    lower: Tick,
    upper: Tick,
    token: Amount,
    reserve: Amount,
    decimals: u32,
) -> Result<Liquidity, MathError> {
    let sa = sqrt_price_at_tick(lower)?;
    let sb = sqrt_price_at_tick(upper)?;
    if spot_sqrt <= sa {
        liquidity_for_token(spot_sqrt, lower, upper, token, decimals)
    } else if spot_sqrt < sb {
        let by_token = liquidity_for_token(spot_sqrt, lower, upper, token, decimals)?;
        let by_reserve = liquidity_for_reserve(spot_sqrt, lower, upper, reserve, decimals)?;
        Ok(by_token.min(by_reserve))
    } else {
        liquidity_for_reserve(spot_sqrt, lower, upper, reserve, decimals)
    }
}
