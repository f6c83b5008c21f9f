//! Adaptive issuance controller.
//!
//! Turns observed demand into a raw mint (or, on the way down, burn) amount. The
//! signal grows with the premium of spot over the intrinsic minimum value and is
//! damped by a sigmoid of the demand ratio `delta / (delta + elapsed)`, where the
//! supply delta counts native token units. Everything is evaluated in whole tokens
//! so the native-unit product is never formed. The controller is pure: it never
//! caps its own output and never touches vault state. Capping against balance
//! policy is the caller's job.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::math::{self, MathError, Rounding};
use crate::types::Amount;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceParams {
    /// Sigmoid steepness `k`.
    pub steepness: Decimal,
    /// Upper clamp of the demand ratio `r`.
    pub max_demand_ratio: Decimal,
    /// Absolute clamp on the sigmoid exponent so `exp` stays representable.
    pub max_exponent: Decimal,
    /// Native decimal precision of the reserve (and issued) token.
    pub decimals: u32,
}

impl Default for IssuanceParams {
    fn default() -> Self {
        Self {
            steepness: dec!(10),
            max_demand_ratio: dec!(0.99),
            max_exponent: dec!(40),
            decimals: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    #[error("Time elapsed since last issuance must be positive")]
    ZeroTimeElapsed,

    #[error("Supply delta must be positive")]
    ZeroDeltaSupply,

    #[error("Intrinsic minimum value must be positive")]
    ZeroIntrinsicValue,

    #[error("Spot price {spot} is below intrinsic minimum value {imv}")]
    SpotPriceLowerThanIMV { spot: Decimal, imv: Decimal },

    #[error("Unsupported reserve decimals {0}, expected 6 to 18")]
    UnsupportedDecimals(u32),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone)]
pub struct AdaptiveIssuanceController {
    params: IssuanceParams,
    scale_factor: Decimal,
}

impl AdaptiveIssuanceController {
    pub fn new(params: IssuanceParams) -> Result<Self, IssuanceError> {
        let scale_factor = Self::scale_factor(params.decimals)?;
        Ok(Self {
            params,
            scale_factor,
        })
    }

    pub fn params(&self) -> &IssuanceParams {
        &self.params
    }

    /// Native units per whole token.
    pub fn scale_factor(decimals: u32) -> Result<Decimal, IssuanceError> {
        math::pow10(decimals).map_err(|_| IssuanceError::UnsupportedDecimals(decimals))
    }

    /// Raw, uncapped amount to mint for the observed demand.
    pub fn compute_mint_amount(
        &self,
        delta_supply: Amount,
        time_elapsed: u64,
        spot_price: Decimal,
        intrinsic_minimum_value: Decimal,
    ) -> Result<Amount, IssuanceError> {
        if time_elapsed == 0 {
            return Err(IssuanceError::ZeroTimeElapsed);
        }
        if delta_supply.is_zero() {
            return Err(IssuanceError::ZeroDeltaSupply);
        }
        if intrinsic_minimum_value <= Decimal::ZERO {
            return Err(IssuanceError::ZeroIntrinsicValue);
        }
        if spot_price < intrinsic_minimum_value {
            return Err(IssuanceError::SpotPriceLowerThanIMV {
                spot: spot_price,
                imv: intrinsic_minimum_value,
            });
        }

        let elapsed = Decimal::from(time_elapsed);
        let delta = delta_supply.value();

        let ratio = spot_price
            .checked_div(intrinsic_minimum_value)
            .ok_or(MathError::Overflow("price_ratio"))?;
        let r = self.demand_ratio(delta, elapsed)?;
        let sigmoid = self.sigmoid(r)?;

        let sqrt_elapsed = math::checked_sqrt(elapsed)?;
        let time_adj = ratio
            .checked_mul(sqrt_elapsed)
            .ok_or(MathError::Overflow("time_adj"))?;
        // native base over the scale factor, in whole tokens
        let base = delta
            .checked_div(sqrt_elapsed)
            .ok_or(MathError::Overflow("mint_base"))?;

        let amount = base
            .checked_mul(sigmoid)
            .and_then(|v| v.checked_mul(time_adj))
            .ok_or(MathError::Overflow("mint_amount"))?;

        Ok(math::quantize_amount(amount, self.params.decimals, Rounding::Down))
    }

    /// `delta / (delta + elapsed)` over native units, clamped to `[0, max_demand_ratio]`.
    /// `delta` is in whole tokens, so this is `delta / (delta + elapsed / scale_factor)`.
    pub fn demand_ratio(&self, delta: Decimal, elapsed: Decimal) -> Result<Decimal, IssuanceError> {
        let denominator = delta
            .checked_add(elapsed / self.scale_factor)
            .ok_or(MathError::Overflow("demand_ratio"))?;
        if denominator.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let r = delta / denominator;
        Ok(r.max(Decimal::ZERO).min(self.params.max_demand_ratio))
    }

    /// `1 / (1 + exp(-k * (0.5 - r)))` with the exponent clamped.
    pub fn sigmoid(&self, r: Decimal) -> Result<Decimal, IssuanceError> {
        let limit = self.params.max_exponent;
        let exponent = (-self.params.steepness * (dec!(0.5) - r)).max(-limit).min(limit);
        let e = exponent
            .checked_exp()
            .ok_or(MathError::Overflow("sigmoid_exp"))?;
        Ok(Decimal::ONE / (Decimal::ONE + e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdaptiveIssuanceController {
        AdaptiveIssuanceController::new(IssuanceParams::default()).unwrap()
    }

    fn amount(v: Decimal) -> Amount {
        Amount::new_unchecked(v)
    }

    #[test]
    fn preconditions_fail_in_order() {
        let c = controller();
        assert_eq!(
            c.compute_mint_amount(Amount::ZERO, 0, dec!(1), dec!(1)),
            Err(IssuanceError::ZeroTimeElapsed)
        );
        assert_eq!(
            c.compute_mint_amount(Amount::ZERO, 60, dec!(1), dec!(1)),
            Err(IssuanceError::ZeroDeltaSupply)
        );
        assert_eq!(
            c.compute_mint_amount(amount(dec!(10)), 60, dec!(1), Decimal::ZERO),
            Err(IssuanceError::ZeroIntrinsicValue)
        );
        assert_eq!(
            c.compute_mint_amount(amount(dec!(10)), 60, dec!(0.9), dec!(1)),
            Err(IssuanceError::SpotPriceLowerThanIMV {
                spot: dec!(0.9),
                imv: dec!(1)
            })
        );
    }

    #[test]
    fn decimals_outside_supported_range_rejected() {
        let mut params = IssuanceParams::default();
        params.decimals = 4;
        assert!(matches!(
            AdaptiveIssuanceController::new(params),
            Err(IssuanceError::UnsupportedDecimals(4))
        ));
    }

    #[test]
    fn sigmoid_is_half_at_midpoint() {
        let c = controller();
        assert_eq!(c.sigmoid(dec!(0.5)).unwrap(), dec!(0.5));
        assert!(c.sigmoid(dec!(0.1)).unwrap() > dec!(0.5));
        assert!(c.sigmoid(dec!(0.9)).unwrap() < dec!(0.5));
    }

    #[test]
    fn sigmoid_exponent_clamped() {
        let mut params = IssuanceParams::default();
        params.steepness = dec!(1000000);
        let c = AdaptiveIssuanceController::new(params).unwrap();
        let low = c.sigmoid(dec!(0.99)).unwrap();
        let high = c.sigmoid(dec!(0)).unwrap();
        assert!(low > Decimal::ZERO);
        assert!(high < Decimal::ONE + dec!(0.0000001));
    }

    #[test]
    fn demand_ratio_clamped() {
        let c = controller();
        let r = c.demand_ratio(dec!(1000), dec!(3600)).unwrap();
        assert_eq!(r, dec!(0.99));
        assert_eq!(c.demand_ratio(Decimal::ZERO, dec!(10)).unwrap(), Decimal::ZERO);
        // one native unit against one second sits at the midpoint
        assert_eq!(c.demand_ratio(dec!(0.000000000000000001), Decimal::ONE).unwrap(), dec!(0.5));
    }

    #[test]
    fn amount_grows_with_price_premium() {
        let c = controller();
        let at_floor = c.compute_mint_amount(amount(dec!(1000)), 3600, dec!(1), dec!(1)).unwrap();
        let at_premium = c.compute_mint_amount(amount(dec!(1000)), 3600, dec!(2), dec!(1)).unwrap();
        assert!(at_floor.value() > Decimal::ZERO);
        assert!(at_premium > at_floor);
    }

    #[test]
    fn amount_matches_closed_form() {
        // with r clamped the formula collapses to delta * ratio * sigmoid(0.99)
        let c = controller();
        let result = c.compute_mint_amount(amount(dec!(1000)), 3600, dec!(1.5), dec!(1)).unwrap();
        let expected = dec!(1000) * dec!(1.5) * c.sigmoid(dec!(0.99)).unwrap();
        assert!((result.value() - expected).abs() < dec!(0.000001));
    }

    #[test]
    fn large_supply_delta_does_not_overflow() {
        // 1e11 whole tokens is past what fits a decimal once scaled to 18-decimal units
        let c = controller();
        let delta = dec!(100_000_000_000);
        let result = c.compute_mint_amount(amount(delta), 3600, dec!(1.5), dec!(1)).unwrap();
        let expected = delta * dec!(1.5) * c.sigmoid(dec!(0.99)).unwrap();
        assert!((result.value() - expected).abs() < dec!(0.001));
    }

    #[test]
    fn six_decimal_reserve_supported() {
        let mut params = IssuanceParams::default();
        params.decimals = 6;
        let c = AdaptiveIssuanceController::new(params).unwrap();
        let result = c.compute_mint_amount(amount(dec!(50)), 120, dec!(1.2), dec!(1)).unwrap();
        assert!(result.value() > Decimal::ZERO);
        assert!(result.value().scale() <= 6);
    }
}
