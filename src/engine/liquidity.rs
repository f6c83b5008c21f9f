// 8.5 engine/liquidity.rs: range deployment and the shift/slide rebalances.
// floor is one tick-spacing wide at the IMV, anchor runs from floor.upper to a
// width above spot, discovery holds the unsold supply above the anchor.

use rust_decimal::Decimal;

use super::core::Vault;
use super::results::{LiquidityError, ShiftResult, SlideResult, VaultError};
use crate::events::{EventPayload, InitializedEvent, RangeEvent, ShiftEvent, SlideEvent};
use crate::exchange::{Exchange, ExchangeError, PoolSettlement};
use crate::ledger::{TokenLedger, TokenSupply};
use crate::math::{self, MathError, Rounding};
use crate::position::{LiquidityPosition, Slot};
use crate::ticks;
use crate::types::{Amount, Bps, Holder, Liquidity, Price, Tick, Timestamp};

/// Rejects re-entry into a public liquidity operation while another one runs.
#[derive(Debug, Clone, Default)]
pub struct SequenceLock {
    held_by: Option<&'static str>,
}

impl SequenceLock {
    pub fn acquire(&mut self, op: &'static str) -> Result<(), LiquidityError> {
        if let Some(held_by) = self.held_by {
            return Err(LiquidityError::Reentrant { op, held_by });
        }
        self.held_by = Some(op);
        Ok(())
    }

    pub fn release(&mut self) {
        self.held_by = None;
    }

    pub fn is_held(&self) -> bool {
        self.held_by.is_some()
    }
}

// pays mint debts from the vault's balances. armed for exactly one range and one callback.
struct VaultSettlement<'a, T, R> {
    token: &'a mut T,
    reserve: &'a mut R,
    armed: Option<(Tick, Tick)>,
}

impl<'a, T: TokenLedger, R: TokenLedger> VaultSettlement<'a, T, R> {
    fn armed(token: &'a mut T, reserve: &'a mut R, lower: Tick, upper: Tick) -> Self {
        Self {
            token,
            reserve,
            armed: Some((lower, upper)),
        }
    }

    fn collecting(token: &'a mut T, reserve: &'a mut R) -> Self {
        Self {
            token,
            reserve,
            armed: None,
        }
    }
}

impl<T: TokenLedger, R: TokenLedger> PoolSettlement for VaultSettlement<'_, T, R> {
    fn pay_owed(
        &mut self,
        lower: Tick,
        upper: Tick,
        token_owed: Amount,
        reserve_owed: Amount,
    ) -> Result<(Amount, Amount), ExchangeError> {
        if self.armed.take() != Some((lower, upper)) {
            return Err(ExchangeError::UnexpectedCallback { lower, upper });
        }
        self.token.transfer(Holder::Vault, Holder::Pool, token_owed)?;
        self.reserve.transfer(Holder::Vault, Holder::Pool, reserve_owed)?;
        Ok((token_owed, reserve_owed))
    }

    fn receive(&mut self, token: Amount, reserve: Amount) -> Result<(), ExchangeError> {
        self.token.transfer(Holder::Pool, Holder::Vault, token)?;
        self.reserve.transfer(Holder::Pool, Holder::Vault, reserve)?;
        Ok(())
    }
}

/// Launch parameters. The vault must already hold the floor and anchor reserve.
/// `discovery_supply` is minted once; the anchor draws its token side from it and
/// discovery holds the rest.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub floor_price: Decimal,
    pub floor_reserve: Amount,
    pub anchor_reserve: Amount,
    pub discovery_price: Decimal,
    pub discovery_supply: Amount,
}

impl<X, T, R> Vault<X, T, R>
where
    X: Exchange + Clone,
    T: TokenSupply + Clone,
    R: TokenLedger + Clone,
{
    // 8.5.1: public entry points. each is one atomic unit.

    pub fn initialize(&mut self, bootstrap: Bootstrap, now: Timestamp) -> Result<(), VaultError> {
        self.transact("initialize", |v| {
            v.observe(now);
            for slot in Slot::ALL {
                if v.state.positions.get(slot).is_some() {
                    return Err(LiquidityError::AlreadyDeployed(slot).into());
                }
            }

            v.token.mint(Holder::Vault, bootstrap.discovery_supply);
            v.place_floor(bootstrap.floor_price, bootstrap.floor_reserve)?;
            let anchor_tokens = v.anchor_token_budget();
            v.place_anchor(v.config.liquidity.anchor_width_bips, bootstrap.anchor_reserve, anchor_tokens)?;
            v.place_discovery(bootstrap.discovery_price, v.idle_tokens())?;

            v.state.last_issuance = now;
            v.state.supply_snapshot = v.circulating_supply();
            v.state.rebalance_spot = v.exchange.spot_tick();
            let floor_price = v.imv()?;
            let total_supply = v.token.total_supply();
            let spot_tick = v.exchange.spot_tick();
            tracing::info!(%spot_tick, %floor_price, %total_supply, "vault initialized");
            v.emit_event(EventPayload::Initialized(InitializedEvent {
                spot_tick,
                floor_price,
                total_supply,
            }));
            Ok(())
        })
    }

    pub fn deploy_floor(&mut self, target_price: Decimal, amount: Amount) -> Result<LiquidityPosition, VaultError> {
        self.transact("deploy_floor", |v| {
            if v.state.positions.floor().is_some() {
                return Err(LiquidityError::AlreadyDeployed(Slot::Floor).into());
            }
            v.place_floor(target_price, amount)
        })
    }

    pub fn deploy_anchor(&mut self, width: Bps, amount: Amount) -> Result<LiquidityPosition, VaultError> {
        self.transact("deploy_anchor", |v| {
            if v.state.positions.anchor().is_some() {
                return Err(LiquidityError::AlreadyDeployed(Slot::Anchor).into());
            }
            v.place_anchor(width, amount, v.idle_tokens())
        })
    }

    pub fn deploy_discovery(&mut self, target_price: Decimal) -> Result<LiquidityPosition, VaultError> {
        self.transact("deploy_discovery", |v| {
            if v.state.positions.discovery().is_some() {
                return Err(LiquidityError::AlreadyDeployed(Slot::Discovery).into());
            }
            v.place_discovery(target_price, v.idle_tokens())
        })
    }

    /// Re-mints the floor at its current tick holding `new_reserve`.
    pub fn redeploy_floor(&mut self, new_reserve: Amount) -> Result<LiquidityPosition, VaultError> {
        self.transact("redeploy_floor", |v| v.resize_floor(new_reserve))
    }

    // 8.5.2: shift. spot has run past the anchor; re-center on it and raise the floor.
    pub fn shift(&mut self, now: Timestamp) -> Result<ShiftResult, VaultError> {
        self.transact("shift", |v| {
            v.observe(now);
            v.require_initialized()?;
            let spot = v.exchange.spot_tick();
            let anchor = *v.state.positions.require(Slot::Anchor)?;
            if spot <= anchor.upper {
                return Err(LiquidityError::ShiftNotNeeded {
                    spot,
                    anchor_upper: anchor.upper,
                }
                .into());
            }

            let previous_floor = *v.state.positions.require(Slot::Floor)?;
            let imv = v.imv()?;
            let supply_before = v.token.total_supply();
            let (_, discovery_reserve) = v.withdraw(Slot::Discovery)?;
            let (_, anchor_reserve) = v.withdraw(Slot::Anchor)?;
            let withdrawn = discovery_reserve.add(anchor_reserve);

            // 1. issuance against the supply that left since the last one
            let circulating = v.circulating_supply();
            let delta = circulating.saturating_sub(v.state.supply_snapshot);
            let elapsed = v.state.last_issuance.secs_until(now);
            let minted = if delta.is_zero() || elapsed == 0 {
                Amount::ZERO
            } else {
                let raw = v
                    .controller
                    .compute_mint_amount(delta, elapsed, v.spot_price()?, imv)?;
                let cap = v.share_of(circulating, v.config.liquidity.max_issuance_bps);
                raw.min(cap)
            };
            if !minted.is_zero() {
                v.token.mint(Holder::Vault, minted);
            }

            // 2. skim into the floor and lift it to what the reserve now backs
            let skimmed = v.share_of(withdrawn, v.config.liquidity.skim_bps);
            let (_, floor_reserve) = v.withdraw(Slot::Floor)?;
            let backing = floor_reserve.add(skimmed);
            let new_floor_tick = v.next_floor_tick(backing, circulating, previous_floor.lower, spot)?;
            v.place_floor_at(new_floor_tick, backing)?;

            // 3. anchor and discovery around the new spot, from the tokens already held
            let anchor_budget = withdrawn.saturating_sub(skimmed);
            let unpaired = v.redeploy_upper_legs(v.config.liquidity.anchor_width_bips, anchor_budget)?;
            let floor_top_up = v.park_unpaired_reserve(unpaired)?;
            debug_assert_eq!(v.token.total_supply(), supply_before.add(minted));

            v.state.supply_snapshot = v.circulating_supply();
            v.state.last_issuance = now;
            v.state.rebalance_spot = spot;

            tracing::info!(
                %spot,
                from = %previous_floor.lower,
                to = %new_floor_tick,
                %minted,
                %skimmed,
                %floor_top_up,
                %circulating,
                "shift"
            );
            v.emit_event(EventPayload::Shifted(ShiftEvent {
                spot_tick: spot,
                previous_floor_tick: previous_floor.lower,
                new_floor_tick,
                minted,
                skimmed,
                circulating,
                floor_top_up,
            }));
            Ok(ShiftResult {
                previous_floor_tick: previous_floor.lower,
                new_floor_tick,
                minted,
                skimmed,
                circulating,
                floor_top_up,
            })
        })
    }

    // 8.5.3: slide. spot fell below where the last rebalance left it; pull the anchor
    // down around spot and burn part of the supply that came back. floor tick stays.
    pub fn slide(&mut self, now: Timestamp) -> Result<SlideResult, VaultError> {
        self.transact("slide", |v| {
            v.observe(now);
            v.require_initialized()?;
            let spot = v.exchange.spot_tick();
            let reference = v.state.rebalance_spot;
            if spot >= reference {
                return Err(LiquidityError::SlideNotNeeded { spot, reference }.into());
            }

            let imv = v.imv()?;
            let supply_before = v.token.total_supply();
            let (_, discovery_reserve) = v.withdraw(Slot::Discovery)?;
            let (_, anchor_reserve) = v.withdraw(Slot::Anchor)?;
            let withdrawn = discovery_reserve.add(anchor_reserve);

            let circulating = v.circulating_supply();
            let delta = v.state.supply_snapshot.saturating_sub(circulating);
            let elapsed = v.state.last_issuance.secs_until(now);
            let burned = if delta.is_zero() || elapsed == 0 {
                Amount::ZERO
            } else {
                // below the floor there is no premium left to measure
                let price = v.spot_price()?.max(imv);
                let raw = v.controller.compute_mint_amount(delta, elapsed, price, imv)?;
                let cap = v.share_of(circulating, v.config.liquidity.max_issuance_bps);
                raw.min(cap).min(v.idle_tokens())
            };
            if !burned.is_zero() {
                v.token.burn_from(Holder::Vault, burned)?;
            }

            let unpaired = v.redeploy_upper_legs(v.config.liquidity.slide_anchor_width_bips, withdrawn)?;
            let floor_top_up = v.park_unpaired_reserve(unpaired)?;
            let anchor = *v.state.positions.require(Slot::Anchor)?;
            debug_assert_eq!(v.token.total_supply().add(burned), supply_before);

            v.state.supply_snapshot = circulating;
            v.state.last_issuance = now;
            v.state.rebalance_spot = spot;

            tracing::info!(
                %spot,
                %burned,
                %floor_top_up,
                %circulating,
                lower = %anchor.lower,
                upper = %anchor.upper,
                "slide"
            );
            v.emit_event(EventPayload::Slid(SlideEvent {
                spot_tick: spot,
                burned,
                circulating,
                floor_top_up,
                anchor_lower: anchor.lower,
                anchor_upper: anchor.upper,
            }));
            Ok(SlideResult {
                burned,
                circulating,
                floor_top_up,
                anchor_lower: anchor.lower,
                anchor_upper: anchor.upper,
            })
        })
    }

    // 8.5.4: legs. these run inside a transaction and never take the lock.

    pub(super) fn place_floor(&mut self, target_price: Decimal, amount: Amount) -> Result<LiquidityPosition, VaultError> {
        let tick = ticks::align_down(ticks::price_to_tick(target_price)?, self.config.tick_spacing);
        self.place_floor_at(tick, amount)
    }

    // the floor is reserve backing; one at or above spot would hold none
    pub(super) fn place_floor_at(&mut self, lower: Tick, amount: Amount) -> Result<LiquidityPosition, VaultError> {
        let upper = lower.offset(self.config.tick_spacing);
        let spot = self.exchange.spot_sqrt_price();
        if spot <= ticks::sqrt_price_at_tick(lower)? {
            return Err(LiquidityError::ZeroLiquidity(Slot::Floor).into());
        }
        let liquidity =
            ticks::liquidity_for_amounts(spot, lower, upper, self.idle_tokens(), amount, self.config.decimals)?;
        self.mint_leg(Slot::Floor, lower, upper, liquidity)
    }

    /// Anchor over `[floor.upper, spot + width]` holding at most `amount` reserve and
    /// `tokens` tokens. Entirely above spot it is sized from the tokens alone.
    pub(super) fn place_anchor(
        &mut self,
        width: Bps,
        amount: Amount,
        tokens: Amount,
    ) -> Result<LiquidityPosition, VaultError> {
        let floor = *self.state.positions.require(Slot::Floor)?;
        let lower = floor.upper;
        let above = self.exchange.spot_tick().offset(ticks::ticks_for_width(width)?);
        let upper = ticks::align_up(above, self.config.tick_spacing);
        if upper <= lower {
            return Err(LiquidityError::InvalidTicks {
                slot: Slot::Anchor,
                lower,
                upper,
            }
            .into());
        }
        let liquidity = ticks::liquidity_for_amounts(
            self.exchange.spot_sqrt_price(),
            lower,
            upper,
            tokens,
            amount,
            self.config.decimals,
        )?;
        self.mint_leg(Slot::Anchor, lower, upper, liquidity)
    }

    pub(super) fn place_discovery(&mut self, target_price: Decimal, tokens: Amount) -> Result<LiquidityPosition, VaultError> {
        let anchor = *self.state.positions.require(Slot::Anchor)?;
        let lower = anchor.upper;
        let upper = ticks::align_up(ticks::price_to_tick(target_price)?, self.config.tick_spacing);
        if upper <= lower {
            return Err(LiquidityError::InvalidTicks {
                slot: Slot::Discovery,
                lower,
                upper,
            }
            .into());
        }
        let liquidity = ticks::liquidity_for_token(
            self.exchange.spot_sqrt_price(),
            lower,
            upper,
            tokens,
            self.config.decimals,
        )?;
        self.mint_leg(Slot::Discovery, lower, upper, liquidity)
    }

    // withdraw the floor and re-mint it in place with `new_reserve`
    pub(super) fn resize_floor(&mut self, new_reserve: Amount) -> Result<LiquidityPosition, VaultError> {
        self.require_initialized()?;
        let floor = *self.state.positions.require(Slot::Floor)?;
        self.withdraw(Slot::Floor)?;
        self.place_floor_at(floor.lower, new_reserve)
    }

    // anchor from `reserve` and its share of the idle tokens, discovery from the
    // tokens left. returns the reserve the anchor could not pair with tokens.
    fn redeploy_upper_legs(&mut self, width: Bps, reserve: Amount) -> Result<Amount, VaultError> {
        let idle_before = self.idle_reserve();
        let tokens = self.anchor_token_budget();
        self.place_anchor(width, reserve, tokens)?;
        let deposited = idle_before.saturating_sub(self.idle_reserve());
        self.place_discovery(self.discovery_target()?, self.idle_tokens())?;
        Ok(reserve.saturating_sub(deposited))
    }

    // unpaired reserve joins the floor at its current tick. it stays idle while spot
    // sits at or inside the floor, where a re-mint would need tokens.
    fn park_unpaired_reserve(&mut self, unpaired: Amount) -> Result<Amount, VaultError> {
        let floor = *self.state.positions.require(Slot::Floor)?;
        let floor_top = ticks::sqrt_price_at_tick(floor.upper)?;
        if unpaired.is_zero() || self.exchange.spot_sqrt_price() < floor_top {
            return Ok(Amount::ZERO);
        }
        let (_, reserve) = self.withdraw(Slot::Floor)?;
        self.place_floor_at(floor.lower, reserve.add(unpaired))?;
        Ok(unpaired)
    }

    fn anchor_token_budget(&self) -> Amount {
        self.share_of(self.idle_tokens(), self.config.liquidity.anchor_token_share_bps)
    }

    fn discovery_target(&self) -> Result<Decimal, VaultError> {
        let anchor = self.state.positions.require(Slot::Anchor)?;
        let top = ticks::tick_to_price(anchor.upper)?;
        let width = Decimal::ONE + self.config.liquidity.discovery_width_bips.as_fraction();
        Ok(top * width)
    }

    // floor tick backing `circulating` with `backing` reserve, kept one spacing
    // below spot and never below the current floor
    fn next_floor_tick(
        &self,
        backing: Amount,
        circulating: Amount,
        current: Tick,
        spot: Tick,
    ) -> Result<Tick, VaultError> {
        let spacing = self.config.tick_spacing;
        let ceiling = Tick(ticks::align_down(spot.offset(-1), spacing).0 - spacing);
        let target = if circulating.is_zero() {
            current
        } else {
            let price = backing
                .value()
                .checked_div(circulating.value())
                .ok_or(MathError::Overflow("floor_price"))?;
            match ticks::price_to_tick(price) {
                Ok(tick) => ticks::align_down(tick, spacing),
                // a target past the tick domain is clamped by the ceiling anyway
                Err(_) => ceiling,
            }
        };
        Ok(target.min(ceiling).max(current))
    }

    fn share_of(&self, amount: Amount, share: Bps) -> Amount {
        math::quantize_amount(amount.value() * share.as_fraction(), self.config.decimals, Rounding::Down)
    }

    fn mint_leg(
        &mut self,
        slot: Slot,
        lower: Tick,
        upper: Tick,
        liquidity: Liquidity,
    ) -> Result<LiquidityPosition, VaultError> {
        if liquidity.is_zero() {
            return Err(LiquidityError::ZeroLiquidity(slot).into());
        }
        let (token_owed, reserve_owed) = self.exchange.quote_mint(lower, upper, liquidity)?;

        let available = self.idle_reserve();
        if reserve_owed > available {
            return Err(LiquidityError::InsufficientReserve {
                requested: reserve_owed,
                available,
            }
            .into());
        }
        let held = self.idle_tokens();
        if token_owed > held {
            return Err(LiquidityError::InsufficientTokens {
                requested: token_owed,
                available: held,
            }
            .into());
        }

        let mut settlement = VaultSettlement::armed(&mut self.token, &mut self.reserve, lower, upper);
        let (token, reserve) = self.exchange.mint(lower, upper, liquidity, &mut settlement)?;

        let position = LiquidityPosition::new(lower, upper, liquidity, Price::new_unchecked(ticks::tick_to_price(lower)?));
        self.state.positions.set(slot, position);
        tracing::debug!(%slot, %lower, %upper, %liquidity, %token, %reserve, "range deployed");
        self.emit_event(EventPayload::RangeDeployed(RangeEvent {
            slot,
            lower,
            upper,
            liquidity,
            token,
            reserve,
        }));
        Ok(position)
    }

    // burns the whole range and collects it into the vault
    pub(super) fn withdraw(&mut self, slot: Slot) -> Result<(Amount, Amount), VaultError> {
        let position = self
            .state
            .positions
            .take(slot)
            .ok_or(crate::position::PositionError::NotDeployed(slot))?;
        self.exchange.burn(position.lower, position.upper, position.liquidity)?;
        let mut settlement = VaultSettlement::collecting(&mut self.token, &mut self.reserve);
        let (token, reserve) = self.exchange.collect(position.lower, position.upper, &mut settlement)?;

        tracing::debug!(%slot, %token, %reserve, "range withdrawn");
        self.emit_event(EventPayload::RangeWithdrawn(RangeEvent {
            slot,
            lower: position.lower,
            upper: position.upper,
            liquidity: position.liquidity,
            token,
            reserve,
        }));
        Ok((token, reserve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::exchange::ConcentratedPool;
    use crate::ledger::InMemoryLedger;
    use rust_decimal_macros::dec;

    type TestVault = Vault<ConcentratedPool, InMemoryLedger, InMemoryLedger>;

    fn vault() -> TestVault {
        let config = VaultConfig::default();
        let pool = ConcentratedPool::at_price(dec!(1.5), config.tick_spacing, config.decimals).unwrap();
        let mut reserve = InMemoryLedger::new("WETH");
        reserve.credit(Holder::Vault, Amount::new_unchecked(dec!(2000)));
        Vault::new(config, pool, InMemoryLedger::new("FLR"), reserve).unwrap()
    }

    fn bootstrap() -> Bootstrap {
        Bootstrap {
            floor_price: dec!(1),
            floor_reserve: Amount::new_unchecked(dec!(1000)),
            anchor_reserve: Amount::new_unchecked(dec!(200)),
            discovery_price: dec!(3),
            discovery_supply: Amount::new_unchecked(dec!(5000)),
        }
    }

    #[test]
    fn sequence_lock_rejects_reentry() {
        let mut lock = SequenceLock::default();
        lock.acquire("shift").unwrap();
        assert_eq!(
            lock.acquire("slide"),
            Err(LiquidityError::Reentrant {
                op: "slide",
                held_by: "shift"
            })
        );
        lock.release();
        assert!(lock.acquire("slide").is_ok());
    }

    #[test]
    fn settlement_honours_armed_range_once() {
        let mut token = InMemoryLedger::new("FLR");
        let mut reserve = InMemoryLedger::new("WETH");
        reserve.credit(Holder::Vault, Amount::new_unchecked(dec!(10)));
        let mut s = VaultSettlement::armed(&mut token, &mut reserve, Tick(0), Tick(60));

        assert!(matches!(
            s.pay_owed(Tick(60), Tick(120), Amount::ZERO, Amount::ZERO),
            Err(ExchangeError::UnexpectedCallback { .. })
        ));
        // a wrong callback disarms the settlement too
        assert!(s.pay_owed(Tick(0), Tick(60), Amount::ZERO, Amount::ZERO).is_err());

        let mut s = VaultSettlement::armed(&mut token, &mut reserve, Tick(0), Tick(60));
        s.pay_owed(Tick(0), Tick(60), Amount::ZERO, Amount::new_unchecked(dec!(1))).unwrap();
        assert!(s.pay_owed(Tick(0), Tick(60), Amount::ZERO, Amount::ZERO).is_err());
        assert_eq!(reserve.balance_of(Holder::Pool).value(), dec!(1));
    }

    #[test]
    fn initialize_lays_out_contiguous_ranges() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();

        let floor = v.positions().floor().unwrap();
        let anchor = v.positions().anchor().unwrap();
        let discovery = v.positions().discovery().unwrap();
        assert_eq!(floor.lower, Tick(0));
        assert_eq!(floor.upper, anchor.lower);
        assert!(anchor.upper <= discovery.lower);
        assert!(anchor.contains(v.exchange().spot_tick()));
        assert_eq!(v.imv().unwrap(), Decimal::ONE);
        assert!(v.floor_reserve().unwrap().value() > dec!(999.99));
        assert_eq!(v.circulating_supply(), Amount::ZERO);
    }

    #[test]
    fn initialize_twice_rejected() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        let err = v.initialize(bootstrap(), Timestamp::from_secs(1)).unwrap_err();
        assert_eq!(err, VaultError::Liquidity(LiquidityError::AlreadyDeployed(Slot::Floor)));
    }

    #[test]
    fn floor_above_spot_has_zero_liquidity() {
        let mut v = vault();
        let err = v.deploy_floor(dec!(2), Amount::new_unchecked(dec!(100))).unwrap_err();
        assert_eq!(err, VaultError::Liquidity(LiquidityError::ZeroLiquidity(Slot::Floor)));
        assert!(v.positions().floor().is_none());
        assert_eq!(v.reserve().balance_of(Holder::Vault).value(), dec!(2000));
    }

    #[test]
    fn legs_deploy_one_by_one() {
        let mut v = vault();
        v.parts_mut().1.mint(Holder::Vault, Amount::new_unchecked(dec!(1000)));
        v.deploy_floor(dec!(1), Amount::new_unchecked(dec!(500))).unwrap();
        let anchor = v.deploy_anchor(Bps::new(1000), Amount::new_unchecked(dec!(100))).unwrap();
        let discovery = v.deploy_discovery(dec!(2.5)).unwrap();
        assert_eq!(anchor.upper, discovery.lower);
        assert!(v.is_initialized());
        assert!(v.enforce_invariants().is_ok());
    }

    #[test]
    fn discovery_below_anchor_is_invalid() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        v.withdraw(Slot::Discovery).unwrap();
        let err = v.place_discovery(dec!(1.1), v.idle_tokens()).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Liquidity(LiquidityError::InvalidTicks { slot: Slot::Discovery, .. })
        ));
    }

    #[test]
    fn redeploy_floor_keeps_tick() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        let before = *v.positions().floor().unwrap();
        let after = v.redeploy_floor(Amount::new_unchecked(dec!(1100))).unwrap();
        assert_eq!(after.lower, before.lower);
        assert!(after.liquidity > before.liquidity);
        assert!(v.floor_reserve().unwrap().value() > dec!(1099.99));
    }

    #[test]
    fn redeploy_floor_beyond_idle_reserve_rolls_back() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        let before = *v.positions().floor().unwrap();
        let err = v.redeploy_floor(Amount::new_unchecked(dec!(5000))).unwrap_err();
        assert!(matches!(err, VaultError::Liquidity(LiquidityError::InsufficientReserve { .. })));
        assert_eq!(*v.positions().floor().unwrap(), before);
    }

    #[test]
    fn shift_rejected_inside_anchor() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        assert!(matches!(
            v.shift(Timestamp::from_secs(60)),
            Err(VaultError::Liquidity(LiquidityError::ShiftNotNeeded { .. }))
        ));
    }

    #[test]
    fn slide_rejected_without_price_drop() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        // spot is still where initialize left it
        assert_eq!(
            v.slide(Timestamp::from_secs(60)),
            Err(VaultError::Liquidity(LiquidityError::SlideNotNeeded {
                spot: Tick(4054),
                reference: Tick(4054),
            }))
        );
    }

    #[test]
    fn anchor_without_tokens_is_not_minted_for() {
        let mut v = vault();
        v.deploy_floor(dec!(1), Amount::new_unchecked(dec!(500))).unwrap();
        // straddles spot with no idle tokens to pair with the reserve
        let err = v.deploy_anchor(Bps::new(1000), Amount::new_unchecked(dec!(100))).unwrap_err();
        assert_eq!(err, VaultError::Liquidity(LiquidityError::ZeroLiquidity(Slot::Anchor)));
        assert_eq!(v.token().total_supply(), Amount::ZERO);
    }

    #[test]
    fn initialize_mints_only_the_launch_supply() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        assert_eq!(v.token().total_supply().value(), dec!(5000));
        // discovery takes what the anchor left, less sizing dust
        assert!(v.idle_tokens().value() < dec!(0.000001));
        assert_eq!(v.state().rebalance_spot, v.exchange().spot_tick());
    }

    #[test]
    fn nested_operation_is_rejected() {
        let mut v = vault();
        v.initialize(bootstrap(), Timestamp::from_secs(0)).unwrap();
        let floor = *v.positions().floor().unwrap();
        let events = v.events().len();

        let err = v
            .transact("shift", |draft| draft.redeploy_floor(Amount::new_unchecked(dec!(900))))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::Liquidity(LiquidityError::Reentrant {
                op: "redeploy_floor",
                held_by: "shift"
            })
        );
        assert_eq!(*v.positions().floor().unwrap(), floor);
        assert_eq!(v.events().len(), events);
        // the lock is free again once the outer call returns
        assert!(v.redeploy_floor(Amount::new_unchecked(dec!(900))).is_ok());
    }
}
