// 8.0 engine/core.rs: vault struct, draft/commit wrapper, read-side queries.

use rust_decimal::Decimal;

use super::liquidity::SequenceLock;
use super::results::{LiquidityError, VaultError};
use crate::config::VaultConfig;
use crate::custody::Escrow;
use crate::events::{Event, EventId, EventLog, EventPayload, ProtocolFundedEvent};
use crate::exchange::Exchange;
use crate::issuance::AdaptiveIssuanceController;
use crate::ledger::{TokenLedger, TokenSupply};
use crate::loan::{LendingError, LoanBook};
use crate::position::{PositionLedger, Slot};
use crate::solvency::{self, SolvencyError, SolvencyInputs, SolvencyReport};
use crate::ticks;
use crate::types::{AccountId, Amount, Holder, Tick, Timestamp};

/** 8.1: everything the vault books on its own side of the ledgers */
#[derive(Debug, Clone, Default)]
pub struct VaultState {
    pub positions: PositionLedger,
    pub loans: LoanBook,
    // reserve held by the vault that belongs to the self-repay pool
    pub protocol_fees: Amount,
    pub last_issuance: Timestamp,
    // circulating supply at the last issuance, the basis for the next delta
    pub supply_snapshot: Amount,
    // spot when the ranges were last laid out; slide needs spot below it
    pub rebalance_spot: Tick,
}

#[derive(Debug, Clone)]
pub struct Vault<X, T, R> {
    pub(super) config: VaultConfig,
    pub(super) exchange: X,
    pub(super) token: T,
    pub(super) reserve: R,
    pub(super) escrow: Escrow,
    pub(super) state: VaultState,
    pub(super) controller: AdaptiveIssuanceController,
    pub(super) lock: SequenceLock,
    pub(super) events: EventLog,
    pub(super) current_time: Timestamp,
}

impl<X, T, R> Vault<X, T, R>
where
    X: Exchange + Clone,
    T: TokenSupply + Clone,
    R: TokenLedger + Clone,
{
    pub fn new(config: VaultConfig, exchange: X, token: T, reserve: R) -> Result<Self, VaultError> {
        config.validate()?;
        if exchange.decimals() != config.decimals {
            return Err(VaultError::ExchangeMismatch {
                reason: format!("exchange decimals {} != {}", exchange.decimals(), config.decimals),
            });
        }
        if exchange.tick_spacing() != config.tick_spacing {
            return Err(VaultError::ExchangeMismatch {
                reason: format!("tick spacing {} != {}", exchange.tick_spacing(), config.tick_spacing),
            });
        }
        let controller = AdaptiveIssuanceController::new(config.issuance.clone())?;
        let events = EventLog::new(config.max_events);

        Ok(Self {
            config,
            exchange,
            token,
            reserve,
            escrow: Escrow::new(),
            state: VaultState::default(),
            controller,
            lock: SequenceLock::default(),
            events,
            current_time: Timestamp::from_secs(0),
        })
    }

    // 8.2: runs `op` on a draft and commits only if it and the invariant checks pass.
    // the draft holds the sequence lock, so a nested public call inside `op` fails.
    pub(super) fn transact<O, F>(&mut self, name: &'static str, op: F) -> Result<O, VaultError>
    where
        F: FnOnce(&mut Self) -> Result<O, VaultError>,
    {
        self.lock.acquire(name)?;
        let mut draft = self.clone();
        self.lock.release();

        let out = op(&mut draft).and_then(|out| {
            draft.enforce_invariants()?;
            Ok(out)
        });
        match out {
            Ok(out) => {
                draft.lock.release();
                *self = draft;
                Ok(out)
            }
            Err(e) => {
                tracing::debug!(op = name, error = %e, "vault operation rolled back");
                Err(e)
            }
        }
    }

    pub(super) fn observe(&mut self, now: Timestamp) {
        if now > self.current_time {
            self.current_time = now;
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn positions(&self) -> &PositionLedger {
        &self.state.positions
    }

    pub fn loans(&self) -> &LoanBook {
        &self.state.loans
    }

    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    pub fn exchange(&self) -> &X {
        &self.exchange
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn reserve(&self) -> &R {
        &self.reserve
    }

    pub fn controller(&self) -> &AdaptiveIssuanceController {
        &self.controller
    }

    /// The outside world: the exchange and both ledgers, for trades and wallet funding.
    pub fn parts_mut(&mut self) -> (&mut X, &mut T, &mut R) {
        (&mut self.exchange, &mut self.token, &mut self.reserve)
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn protocol_fees(&self) -> Amount {
        self.state.protocol_fees
    }

    pub fn is_initialized(&self) -> bool {
        self.state.positions.is_initialized()
    }

    // total supply less everything the vault, its positions and the escrow hold
    pub fn circulating_supply(&self) -> Amount {
        self.token
            .total_supply()
            .saturating_sub(self.token.balance_of(Holder::Vault))
            .saturating_sub(self.token.balance_of(Holder::Pool))
            .saturating_sub(self.token.balance_of(Holder::Escrow))
    }

    /// Intrinsic minimum value: the price at the floor's lower bound.
    pub fn imv(&self) -> Result<Decimal, VaultError> {
        let floor = self.state.positions.require(Slot::Floor)?;
        Ok(ticks::tick_to_price(floor.lower)?)
    }

    pub fn spot_price(&self) -> Result<Decimal, VaultError> {
        Ok(self.exchange.spot_price()?)
    }

    pub fn floor_reserve(&self) -> Result<Amount, VaultError> {
        self.slot_reserve(Slot::Floor)
    }

    pub(super) fn slot_reserve(&self, slot: Slot) -> Result<Amount, VaultError> {
        let p = self.state.positions.require(slot)?;
        let (_, reserve) = self.exchange.position_amounts(p.lower, p.upper)?;
        Ok(reserve)
    }

    // vault reserve not earmarked for the self-repay pool
    pub fn idle_reserve(&self) -> Amount {
        self.reserve
            .balance_of(Holder::Vault)
            .saturating_sub(self.state.protocol_fees)
    }

    pub fn idle_tokens(&self) -> Amount {
        self.token.balance_of(Holder::Vault)
    }

    pub fn solvency_report(&self) -> Result<SolvencyReport, VaultError> {
        let anchor = self.state.positions.require(Slot::Anchor)?;
        let inputs = SolvencyInputs {
            circulating: self.circulating_supply(),
            imv: self.imv()?,
            floor_reserve: self.floor_reserve()?,
            anchor_reserve: self.slot_reserve(Slot::Anchor)?,
            anchor_lower: anchor.lower,
            anchor_upper: anchor.upper,
            spot_sqrt: self.exchange.spot_sqrt_price(),
            outstanding_debt: self.state.loans.total_borrowed(),
            decimals: self.config.decimals,
        };
        Ok(solvency::assess(&inputs)?)
    }

    // 8.3: layout and solvency. before the ranges exist nothing may circulate.
    pub fn enforce_invariants(&self) -> Result<(), VaultError> {
        if !self.state.positions.is_initialized() {
            let circulating = self.circulating_supply();
            if !circulating.is_zero() {
                return Err(SolvencyError::Insolvent {
                    circulating,
                    capacity: Decimal::ZERO,
                }
                .into());
            }
            return Ok(());
        }
        self.state
            .positions
            .check_layout()
            .map_err(SolvencyError::Layout)?;
        self.solvency_report()?.enforce()?;
        Ok(())
    }

    // 8.4: operator top-up of the reserve pool used by self-repay sweeps
    pub fn deposit_protocol_funds(&mut self, from: AccountId, amount: Amount) -> Result<Amount, VaultError> {
        self.transact("deposit_protocol_funds", |v| {
            if amount.is_zero() {
                return Err(LendingError::ZeroAmount.into());
            }
            v.reserve.transfer(Holder::Account(from), Holder::Vault, amount)?;
            v.state.protocol_fees = v.state.protocol_fees.add(amount);
            let balance = v.state.protocol_fees;
            v.emit_event(EventPayload::ProtocolFunded(ProtocolFundedEvent {
                from: Holder::Account(from),
                amount,
                balance,
            }));
            Ok(balance)
        })
    }

    pub(super) fn require_initialized(&self) -> Result<(), VaultError> {
        if !self.state.positions.is_initialized() {
            return Err(LiquidityError::NotInitialized.into());
        }
        Ok(())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) -> EventId {
        self.events.record(self.current_time, payload)
    }
}
