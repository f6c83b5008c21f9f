// 6.0: solvency. every token in circulation must be redeemable against the reserve
// the vault keeps in its floor and anchor ranges.
//   floor capacity  = floor reserve / IMV
//   anchor capacity = tokens the anchor reserve absorbs while the price walks from
//                     spot down to the anchor's lower bound
// circulating <= floor capacity + anchor capacity, checked after every mutation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::math::{self, MathError};
use crate::position::PositionError;
use crate::ticks;
use crate::types::{Amount, Tick};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolvencyError {
    #[error("Insolvent: circulating {circulating} exceeds capacity {capacity}")]
    Insolvent { circulating: Amount, capacity: Decimal },

    #[error("Intrinsic minimum value must be positive, got {0}")]
    ZeroIntrinsicValue(Decimal),

    #[error("Position layout violated: {0}")]
    Layout(#[from] PositionError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, Copy)]
pub struct SolvencyInputs {
    pub circulating: Amount,
    pub imv: Decimal,
    pub floor_reserve: Amount,
    pub anchor_reserve: Amount,
    pub anchor_lower: Tick,
    pub anchor_upper: Tick,
    pub spot_sqrt: Decimal,
    // reserve lent out against escrowed collateral
    pub outstanding_debt: Amount,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvencyReport {
    pub circulating: Amount,
    pub imv: Decimal,
    pub floor_capacity: Decimal,
    pub anchor_capacity: Decimal,
    pub total_capacity: Decimal,
    pub is_solvent: bool,
    pub floor_reserve: Amount,
    /// Floor reserve that would cover circulating supply at the IMV without the anchor.
    pub required_floor_reserve: Amount,
    pub outstanding_debt: Amount,
}

impl SolvencyReport {
    /// Capacity left over after covering circulating supply. Negative when insolvent.
    pub fn headroom(&self) -> Decimal {
        self.total_capacity - self.circulating.value()
    }

    pub fn enforce(&self) -> Result<(), SolvencyError> {
        if self.is_solvent {
            Ok(())
        } else {
            Err(SolvencyError::Insolvent {
                circulating: self.circulating,
                capacity: self.total_capacity,
            })
        }
    }
}

pub fn floor_capacity(floor_reserve: Amount, imv: Decimal) -> Result<Decimal, SolvencyError> {
    if imv <= Decimal::ZERO {
        return Err(SolvencyError::ZeroIntrinsicValue(imv));
    }
    floor_reserve
        .value()
        .checked_div(imv)
        .ok_or(SolvencyError::Math(MathError::Overflow("floor_capacity")))
}

// reserve / (sqrt(p_lower) * sqrt(p_top)), p_top being spot clipped to the range
pub fn anchor_capacity(
    anchor_reserve: Amount,
    lower: Tick,
    upper: Tick,
    spot_sqrt: Decimal,
) -> Result<Decimal, SolvencyError> {
    if anchor_reserve.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let sa = ticks::sqrt_price_at_tick(lower)?;
    let sb = ticks::sqrt_price_at_tick(upper)?;
    let top = spot_sqrt.min(sb);
    if top <= sa {
        return Ok(Decimal::ZERO);
    }
    let denominator = sa.checked_mul(top).ok_or(MathError::Overflow("anchor_capacity"))?;
    anchor_reserve
        .value()
        .checked_div(denominator)
        .ok_or(SolvencyError::Math(MathError::Overflow("anchor_capacity")))
}

pub fn assess(inputs: &SolvencyInputs) -> Result<SolvencyReport, SolvencyError> {
    let floor = floor_capacity(inputs.floor_reserve, inputs.imv)?;
    let anchor = anchor_capacity(
        inputs.anchor_reserve,
        inputs.anchor_lower,
        inputs.anchor_upper,
        inputs.spot_sqrt,
    )?;
    let total = floor
        .checked_add(anchor)
        .ok_or(MathError::Overflow("total_capacity"))?;

    Ok(SolvencyReport {
        circulating: inputs.circulating,
        imv: inputs.imv,
        floor_capacity: floor,
        anchor_capacity: anchor,
        total_capacity: total,
        is_solvent: inputs.circulating.value() <= total,
        floor_reserve: inputs.floor_reserve,
        required_floor_reserve: required_floor_reserve(inputs.circulating, inputs.imv, inputs.decimals)?,
        outstanding_debt: inputs.outstanding_debt,
    })
}

/// Reserve needed in the floor for `circulating` to be covered at `imv` on its own.
pub fn required_floor_reserve(circulating: Amount, imv: Decimal, decimals: u32) -> Result<Amount, SolvencyError> {
    let needed = circulating
        .value()
        .checked_mul(imv)
        .ok_or(MathError::Overflow("required_floor_reserve"))?;
    Ok(math::quantize_amount(needed, decimals, math::Rounding::Up))
}
