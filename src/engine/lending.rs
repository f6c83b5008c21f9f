// 8.6 engine/lending.rs: borrow reserve out of the floor against escrowed tokens.
// every change to what the floor lends out goes through resize_floor, so the floor
// range always holds exactly the reserve the vault still owns.

use super::core::Vault;
use super::results::{BorrowResult, RepayResult, RollResult, VaultError};
use crate::events::{CollateralAddedEvent, EventPayload, LoanOpenedEvent, LoanRepaidEvent, LoanRolledEvent};
use crate::exchange::Exchange;
use crate::ledger::{TokenLedger, TokenSupply};
use crate::loan::{loan_fee, LendingError, LoanPosition};
use crate::math::{self, MathError, Rounding};
use crate::types::{AccountId, Amount, Holder, Timestamp};

/// Who funds a repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RepaySource {
    Borrower,
    // the self-repay pool; released collateral is burned instead of returned
    ProtocolFees,
}

impl<X, T, R> Vault<X, T, R>
where
    X: Exchange + Clone,
    T: TokenSupply + Clone,
    R: TokenLedger + Clone,
{
    pub fn borrow(
        &mut self,
        who: AccountId,
        amount: Amount,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<BorrowResult, VaultError> {
        self.transact("borrow", |v| {
            v.observe(now);
            v.require_initialized()?;
            if v.state.loans.has_loan(who) {
                return Err(LendingError::ActiveLoan(who).into());
            }
            v.check_duration(duration_secs)?;

            let decimals = v.config.decimals;
            let imv = v.imv()?;
            let raw_collateral = amount
                .value()
                .checked_div(imv)
                .ok_or(MathError::Overflow("collateral"))?;
            let collateral = math::quantize_amount(raw_collateral, decimals, Rounding::Up);
            if amount.is_zero() || collateral.is_zero() {
                return Err(LendingError::InsufficientLoanAmount.into());
            }
            let fee = loan_fee(amount, duration_secs, v.config.lending.daily_fee_rate, decimals)?;
            if fee >= amount {
                return Err(LendingError::InsufficientLoanAmount.into());
            }

            let held = v.token.balance_of(Holder::Account(who));
            if held < collateral {
                return Err(LendingError::InsufficientCollateral {
                    required: collateral,
                    available: held,
                }
                .into());
            }
            let floor_reserve = v.floor_reserve()?;
            if floor_reserve < amount {
                return Err(LendingError::InsufficientFloorBalance {
                    requested: amount,
                    available: floor_reserve,
                }
                .into());
            }

            v.escrow.pledge(&mut v.token, who, collateral)?;
            v.resize_floor(floor_reserve.saturating_sub(amount))?;

            let received = amount.saturating_sub(fee);
            v.reserve.transfer(Holder::Vault, Holder::Account(who), received)?;
            v.state.protocol_fees = v.state.protocol_fees.add(fee);

            let loan = LoanPosition::new(who, amount, collateral, fee, now, duration_secs);
            let expiry = loan.expiry;
            v.state.loans.open(loan)?;

            tracing::info!(borrower = who.0, %amount, %collateral, %fee, %expiry, "loan opened");
            v.emit_event(EventPayload::LoanOpened(LoanOpenedEvent {
                borrower: who,
                borrowed: amount,
                collateral,
                fee,
                expiry,
            }));
            Ok(BorrowResult {
                collateral,
                fee,
                received,
                expiry,
            })
        })
    }

    /// Repays `repay` of the loan from the borrower's reserve. Zero repays in full.
    pub fn payback_loan(&mut self, who: AccountId, repay: Amount, now: Timestamp) -> Result<RepayResult, VaultError> {
        self.transact("payback_loan", |v| {
            v.observe(now);
            v.require_initialized()?;
            let result = v.apply_repayment(who, repay, RepaySource::Borrower, now)?;
            let floor_reserve = v.floor_reserve()?;
            v.resize_floor(floor_reserve.add(result.repaid))?;
            Ok(result)
        })
    }

    // extend the loan and borrow whatever the collateral now covers at the current IMV
    pub fn roll_loan(&mut self, who: AccountId, new_duration_secs: u64, now: Timestamp) -> Result<RollResult, VaultError> {
        self.transact("roll_loan", |v| {
            v.observe(now);
            v.require_initialized()?;
            let mut loan = v.state.loans.require(who)?.clone();
            if loan.is_expired(now) {
                return Err(LendingError::LoanExpired {
                    borrower: who,
                    expiry: loan.expiry,
                }
                .into());
            }
            v.check_duration(new_duration_secs)?;

            let decimals = v.config.decimals;
            let imv = v.imv()?;
            let raw_value = loan
                .collateral
                .value()
                .checked_mul(imv)
                .ok_or(MathError::Overflow("collateral_value"))?;
            let value = math::quantize_amount(raw_value, decimals, Rounding::Down);
            let increment = value
                .checked_sub(loan.borrowed)
                .filter(|i| !i.is_zero())
                .ok_or(LendingError::CantRollLoan)?;
            let fee = loan_fee(increment, new_duration_secs, v.config.lending.daily_fee_rate, decimals)?;
            if fee >= increment {
                return Err(LendingError::InsufficientLoanAmount.into());
            }
            let floor_reserve = v.floor_reserve()?;
            if floor_reserve < increment {
                return Err(LendingError::InsufficientFloorBalance {
                    requested: increment,
                    available: floor_reserve,
                }
                .into());
            }

            v.resize_floor(floor_reserve.saturating_sub(increment))?;
            v.reserve
                .transfer(Holder::Vault, Holder::Account(who), increment.saturating_sub(fee))?;
            v.state.protocol_fees = v.state.protocol_fees.add(fee);

            loan.borrowed = loan.borrowed.add(increment);
            loan.fee_accrued = loan.fee_accrued.add(fee);
            loan.expiry = now.plus_secs(new_duration_secs);
            loan.duration_secs = new_duration_secs;
            let new_expiry = loan.expiry;
            v.state.loans.update(loan)?;

            tracing::info!(borrower = who.0, %increment, %fee, %new_expiry, "loan rolled");
            v.emit_event(EventPayload::LoanRolled(LoanRolledEvent {
                borrower: who,
                increment,
                fee,
                new_expiry,
            }));
            Ok(RollResult {
                increment,
                fee,
                new_expiry,
            })
        })
    }

    pub fn add_collateral(&mut self, who: AccountId, amount: Amount, now: Timestamp) -> Result<Amount, VaultError> {
        self.transact("add_collateral", |v| {
            v.observe(now);
            let mut loan = v.state.loans.require(who)?.clone();
            if amount.is_zero() {
                return Err(LendingError::ZeroAmount.into());
            }
            let held = v.token.balance_of(Holder::Account(who));
            if held < amount {
                return Err(LendingError::InsufficientCollateral {
                    required: amount,
                    available: held,
                }
                .into());
            }

            v.escrow.pledge(&mut v.token, who, amount)?;
            loan.collateral = loan.collateral.add(amount);
            let total_collateral = loan.collateral;
            v.state.loans.update(loan)?;

            v.emit_event(EventPayload::CollateralAdded(CollateralAddedEvent {
                borrower: who,
                amount,
                total_collateral,
            }));
            Ok(total_collateral)
        })
    }

    // settles the debt side of a repayment. the caller grows the floor by `repaid`.
    pub(super) fn apply_repayment(
        &mut self,
        who: AccountId,
        repay: Amount,
        source: RepaySource,
        now: Timestamp,
    ) -> Result<RepayResult, VaultError> {
        let loan = self.state.loans.require(who)?.clone();
        if loan.is_expired(now) {
            return Err(LendingError::LoanExpired {
                borrower: who,
                expiry: loan.expiry,
            }
            .into());
        }
        let repay = if repay.is_zero() { loan.borrowed } else { repay };
        if repay > loan.borrowed {
            return Err(LendingError::InvalidRepayAmount {
                repay,
                outstanding: loan.borrowed,
            }
            .into());
        }

        match source {
            RepaySource::Borrower => {
                self.reserve.transfer(Holder::Account(who), Holder::Vault, repay)?;
            }
            RepaySource::ProtocolFees => {
                let available = self.state.protocol_fees;
                self.state.protocol_fees = available.checked_sub(repay).ok_or(LendingError::InsufficientFunds {
                    requested: repay,
                    available,
                })?;
            }
        }

        let released = loan.collateral_release(repay, self.config.decimals)?;
        match source {
            RepaySource::Borrower => {
                self.escrow
                    .release(Holder::Vault, &mut self.token, who, Holder::Account(who), released)?;
            }
            RepaySource::ProtocolFees => {
                self.escrow
                    .release(Holder::Vault, &mut self.token, who, Holder::Vault, released)?;
                self.token.burn_from(Holder::Vault, released)?;
            }
        }

        let closed = repay == loan.borrowed;
        if closed {
            self.state.loans.close(who)?;
        } else {
            let mut updated = loan;
            updated.borrowed = updated.borrowed.saturating_sub(repay);
            updated.collateral = updated.collateral.saturating_sub(released);
            self.state.loans.update(updated)?;
        }

        let self_repaid = source == RepaySource::ProtocolFees;
        tracing::debug!(borrower = who.0, %repay, %released, closed, self_repaid, "loan repaid");
        self.emit_event(EventPayload::LoanRepaid(LoanRepaidEvent {
            borrower: who,
            repaid: repay,
            collateral_released: released,
            self_repaid,
            closed,
        }));
        Ok(RepayResult {
            repaid: repay,
            collateral_released: released,
            closed,
        })
    }

    fn check_duration(&self, duration_secs: u64) -> Result<(), LendingError> {
        let min = self.config.lending.min_duration_secs;
        let max = self.config.lending.max_duration_secs;
        if duration_secs < min || duration_secs > max {
            return Err(LendingError::InvalidDuration {
                duration: duration_secs,
                min,
                max,
            });
        }
        Ok(())
    }
}
