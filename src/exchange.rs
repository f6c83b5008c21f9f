// 9.3 exchange.rs: concentrated-liquidity exchange seam. the vault mints and burns
// ranges through `Exchange` and pays what a mint owes through `PoolSettlement`.
// `ConcentratedPool` is the in-memory exchange used by tests and the simulation.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::ledger::{LedgerError, TokenLedger};
use crate::math::{MathError, Rounding};
use crate::ticks;
use crate::types::{Amount, Holder, Liquidity, Tick};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("Mint underpaid: owed {token_owed}/{reserve_owed}, paid {token_paid}/{reserve_paid}")]
    MintUnderpaid {
        token_owed: Amount,
        reserve_owed: Amount,
        token_paid: Amount,
        reserve_paid: Amount,
    },

    #[error("Unexpected mint callback for [{lower}, {upper})")]
    UnexpectedCallback { lower: Tick, upper: Tick },

    #[error("No position at [{lower}, {upper})")]
    UnknownPosition { lower: Tick, upper: Tick },

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Liquidity, available: Liquidity },

    #[error("Range [{lower}, {upper}) invalid for spacing {spacing}")]
    InvalidRange { lower: Tick, upper: Tick, spacing: i32 },

    #[error("Cannot mint zero liquidity")]
    ZeroLiquidity,

    #[error("Settlement failed: {0}")]
    Settlement(#[from] LedgerError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

/// Pays for and receives the tokens of a position. Amounts are (token, reserve).
pub trait PoolSettlement {
    // must deliver at least the owed amounts into the pool, returns what was delivered
    fn pay_owed(
        &mut self,
        lower: Tick,
        upper: Tick,
        token_owed: Amount,
        reserve_owed: Amount,
    ) -> Result<(Amount, Amount), ExchangeError>;

    fn receive(&mut self, token: Amount, reserve: Amount) -> Result<(), ExchangeError>;
}

pub trait Exchange {
    fn spot_tick(&self) -> Tick;

    fn spot_sqrt_price(&self) -> Decimal;

    fn tick_spacing(&self) -> i32;

    fn decimals(&self) -> u32;

    fn spot_price(&self) -> Result<Decimal, ExchangeError> {
        Ok(ticks::tick_to_price(self.spot_tick())?)
    }

    fn liquidity_of(&self, lower: Tick, upper: Tick) -> Liquidity;

    /// Amounts the range would return if burned now, rounded down.
    fn position_amounts(&self, lower: Tick, upper: Tick) -> Result<(Amount, Amount), ExchangeError>;

    /// Amounts a mint of `liquidity` would owe now, rounded up.
    fn quote_mint(&self, lower: Tick, upper: Tick, liquidity: Liquidity) -> Result<(Amount, Amount), ExchangeError>;

    fn mint(
        &mut self,
        lower: Tick,
        upper: Tick,
        liquidity: Liquidity,
        settlement: &mut dyn PoolSettlement,
    ) -> Result<(Amount, Amount), ExchangeError>;

    /// Removes liquidity. The amounts become owed and are paid out by `collect`.
    fn burn(&mut self, lower: Tick, upper: Tick, liquidity: Liquidity) -> Result<(Amount, Amount), ExchangeError>;

    fn collect(
        &mut self,
        lower: Tick,
        upper: Tick,
        settlement: &mut dyn PoolSettlement,
    ) -> Result<(Amount, Amount), ExchangeError>;
}

/// What a trader paid and received when the price was moved. (token, reserve) each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceMove {
    pub token_paid: Amount,
    pub token_received: Amount,
    pub reserve_paid: Amount,
    pub reserve_received: Amount,
}

#[derive(Debug, Clone)]
pub struct ConcentratedPool {
    spot_tick: Tick,
    spot_sqrt: Decimal,
    tick_spacing: i32,
    decimals: u32,
    positions: HashMap<(Tick, Tick), Liquidity>,
    owed: HashMap<(Tick, Tick), (Amount, Amount)>,
}

impl ConcentratedPool {
    pub fn new(spot_tick: Tick, tick_spacing: i32, decimals: u32) -> Result<Self, ExchangeError> {
        crate::math::check_decimals(decimals)?;
        Ok(Self {
            spot_tick,
            spot_sqrt: ticks::sqrt_price_at_tick(spot_tick)?,
            tick_spacing,
            decimals,
            positions: HashMap::new(),
            owed: HashMap::new(),
        })
    }

    pub fn at_price(price: Decimal, tick_spacing: i32, decimals: u32) -> Result<Self, ExchangeError> {
        Self::new(ticks::price_to_tick(price)?, tick_spacing, decimals)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    fn check_range(&self, lower: Tick, upper: Tick) -> Result<(), ExchangeError> {
        let aligned = lower.0 % self.tick_spacing == 0 && upper.0 % self.tick_spacing == 0;
        if !aligned || lower >= upper {
            return Err(ExchangeError::InvalidRange {
                lower,
                upper,
                spacing: self.tick_spacing,
            });
        }
        ticks::check_tick(lower)?;
        ticks::check_tick(upper)?;
        Ok(())
    }

    fn totals_at(&self, spot_sqrt: Decimal) -> Result<(Decimal, Decimal), ExchangeError> {
        let mut token = Decimal::ZERO;
        let mut reserve = Decimal::ZERO;
        for ((lower, upper), liquidity) in &self.positions {
            let (t, r) =
                ticks::amounts_for_liquidity(spot_sqrt, *lower, *upper, *liquidity, self.decimals, Rounding::Down)?;
            token += t.value();
            reserve += r.value();
        }
        Ok((token, reserve))
    }

    /// Teleports the price to `tick`, settling the flow against `trader` as a swap would.
    /// The trader pays first; the pool's payout cannot fail once that succeeds.
    pub fn move_to_tick(
        &mut self,
        tick: Tick,
        token: &mut dyn TokenLedger,
        reserve: &mut dyn TokenLedger,
        trader: Holder,
    ) -> Result<PriceMove, ExchangeError> {
        let new_sqrt = ticks::sqrt_price_at_tick(tick)?;
        let (token_before, reserve_before) = self.totals_at(self.spot_sqrt)?;
        let (token_after, reserve_after) = self.totals_at(new_sqrt)?;

        let mut flow = PriceMove::default();
        let token_delta = token_after - token_before;
        let reserve_delta = reserve_after - reserve_before;

        if token_delta > Decimal::ZERO {
            flow.token_paid = Amount::new_unchecked(token_delta);
        } else {
            flow.token_received = Amount::new_unchecked(-token_delta);
        }
        if reserve_delta > Decimal::ZERO {
            flow.reserve_paid = Amount::new_unchecked(reserve_delta);
        } else {
            flow.reserve_received = Amount::new_unchecked(-reserve_delta);
        }

        token.transfer(trader, Holder::Pool, flow.token_paid)?;
        reserve.transfer(trader, Holder::Pool, flow.reserve_paid)?;
        token.transfer(Holder::Pool, trader, flow.token_received)?;
        reserve.transfer(Holder::Pool, trader, flow.reserve_received)?;

        self.spot_tick = tick;
        self.spot_sqrt = new_sqrt;
        Ok(flow)
    }
}

impl Exchange for ConcentratedPool {
    fn spot_tick(&self) -> Tick {
        self.spot_tick
    }

    fn spot_sqrt_price(&self) -> Decimal {
        self.spot_sqrt
    }

    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn decimals(&self) -> u32 {
        self.decimals
    }

    fn liquidity_of(&self, lower: Tick, upper: Tick) -> Liquidity {
        self.positions
            .get(&(lower, upper))
            .copied()
            .unwrap_or(Liquidity::ZERO)
    }

    fn position_amounts(&self, lower: Tick, upper: Tick) -> Result<(Amount, Amount), ExchangeError> {
        let liquidity = self.liquidity_of(lower, upper);
        Ok(ticks::amounts_for_liquidity(
            self.spot_sqrt,
            lower,
            upper,
            liquidity,
            self.decimals,
            Rounding::Down,
        )?)
    }

    fn quote_mint(&self, lower: Tick, upper: Tick, liquidity: Liquidity) -> Result<(Amount, Amount), ExchangeError> {
        self.check_range(lower, upper)?;
        Ok(ticks::amounts_for_liquidity(
            self.spot_sqrt,
            lower,
            upper,
            liquidity,
            self.decimals,
            Rounding::Up,
        )?)
    }

    fn mint(
        &mut self,
        lower: Tick,
        upper: Tick,
        liquidity: Liquidity,
        settlement: &mut dyn PoolSettlement,
    ) -> Result<(Amount, Amount), ExchangeError> {
        if liquidity.is_zero() {
            return Err(ExchangeError::ZeroLiquidity);
        }
        let (token_owed, reserve_owed) = self.quote_mint(lower, upper, liquidity)?;
        let (token_paid, reserve_paid) = settlement.pay_owed(lower, upper, token_owed, reserve_owed)?;
        if token_paid < token_owed || reserve_paid < reserve_owed {
            return Err(ExchangeError::MintUnderpaid {
                token_owed,
                reserve_owed,
                token_paid,
                reserve_paid,
            });
        }

        let entry = self.positions.entry((lower, upper)).or_insert(Liquidity::ZERO);
        entry.0 += liquidity.0;
        Ok((token_owed, reserve_owed))
    }

    fn burn(&mut self, lower: Tick, upper: Tick, liquidity: Liquidity) -> Result<(Amount, Amount), ExchangeError> {
        let available = self.liquidity_of(lower, upper);
        if available.is_zero() {
            return Err(ExchangeError::UnknownPosition { lower, upper });
        }
        if liquidity > available {
            return Err(ExchangeError::InsufficientLiquidity {
                requested: liquidity,
                available,
            });
        }

        let (token, reserve) =
            ticks::amounts_for_liquidity(self.spot_sqrt, lower, upper, liquidity, self.decimals, Rounding::Down)?;

        let remaining = available.0 - liquidity.0;
        if remaining == 0 {
            self.positions.remove(&(lower, upper));
        } else {
            self.positions.insert((lower, upper), Liquidity(remaining));
        }

        let owed = self.owed.entry((lower, upper)).or_insert((Amount::ZERO, Amount::ZERO));
        owed.0 = owed.0.add(token);
        owed.1 = owed.1.add(reserve);
        Ok((token, reserve))
    }

    fn collect(
        &mut self,
        lower: Tick,
        upper: Tick,
        settlement: &mut dyn PoolSettlement,
    ) -> Result<(Amount, Amount), ExchangeError> {
        let (token, reserve) = self
            .owed
            .get(&(lower, upper))
            .copied()
            .unwrap_or((Amount::ZERO, Amount::ZERO));
        settlement.receive(token, reserve)?;
        self.owed.remove(&(lower, upper));
        Ok((token, reserve))
    }
}
