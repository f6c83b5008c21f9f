// 8.7 engine/sweeps.rs: paginated passes over the active-borrower index.
// callers feed next_index back in as start to walk the whole book.

use super::core::Vault;
use super::lending::RepaySource;
use super::results::{DefaultResult, SelfRepayResult, VaultError};
use crate::events::{EventPayload, LoanDefaultedEvent, SelfRepaySweptEvent};
use crate::exchange::Exchange;
use crate::ledger::{TokenLedger, TokenSupply};
use crate::loan::{allocate_pro_rata, LendingError};
use crate::types::{AccountId, Amount, Holder, Timestamp};

impl<X, T, R> Vault<X, T, R>
where
    X: Exchange + Clone,
    T: TokenSupply + Clone,
    R: TokenLedger + Clone,
{
    /// Spends `funds` of the protocol fee pool paying down high-LTV loans in
    /// `[start, start + limit)`, split pro rata by outstanding debt.
    pub fn self_repay_loans(
        &mut self,
        funds: Amount,
        start: usize,
        limit: usize,
        now: Timestamp,
    ) -> Result<SelfRepayResult, VaultError> {
        self.transact("self_repay_loans", |v| {
            v.observe(now);
            v.require_initialized()?;
            let available = v.state.protocol_fees;
            if funds > available {
                return Err(LendingError::InsufficientFunds {
                    requested: funds,
                    available,
                }
                .into());
            }

            let len = v.state.loans.len();
            let start = start.min(len);
            let end = start.saturating_add(limit).min(len);
            let imv = v.imv()?;
            let threshold = v.config.lending.self_repay_ltv;

            // pass 1: who qualifies and what they owe
            let eligible: Vec<(AccountId, Amount)> = v.state.loans.active()[start..end]
                .iter()
                .filter_map(|who| {
                    let loan = v.state.loans.get(*who)?;
                    (!loan.is_expired(now) && loan.ltv(imv) >= threshold).then_some((*who, loan.borrowed))
                })
                .collect();
            let outstanding: Vec<Amount> = eligible.iter().map(|(_, owed)| *owed).collect();
            let allocation = allocate_pro_rata(funds, &outstanding, v.config.decimals)?;

            // pass 2: apply. fully repaid loans leave the index in order.
            let mut total_repaid = Amount::ZERO;
            let mut removed = 0;
            for ((who, _), share) in eligible.iter().zip(&allocation.shares) {
                if share.is_zero() {
                    continue;
                }
                let repaid = v.apply_repayment(*who, *share, RepaySource::ProtocolFees, now)?;
                total_repaid = total_repaid.add(repaid.repaid);
                if repaid.closed {
                    removed += 1;
                }
            }
            if !total_repaid.is_zero() {
                let floor_reserve = v.floor_reserve()?;
                v.resize_floor(floor_reserve.add(total_repaid))?;
            }

            let next_index = end - removed;
            tracing::info!(eligible = eligible.len(), %total_repaid, next_index, "self-repay sweep");
            v.emit_event(EventPayload::SelfRepaySwept(SelfRepaySweptEvent {
                eligible: eligible.len(),
                total_repaid,
                next_index,
            }));
            Ok(SelfRepayResult {
                eligible: eligible.len(),
                total_repaid,
                next_index,
            })
        })
    }

    /// Seizes and burns the collateral of expired loans among the next `limit`
    /// entries from `start`. A defaulted slot is refilled by the last entry and
    /// examined again, so the cursor only advances past live loans.
    pub fn default_loans_range(&mut self, start: usize, limit: usize, now: Timestamp) -> Result<DefaultResult, VaultError> {
        self.transact("default_loans_range", |v| {
            v.observe(now);
            let mut index = start;
            let mut visited = 0;
            let mut defaulted = 0;
            let mut seized = Amount::ZERO;

            while visited < limit && index < v.state.loans.len() {
                let who = v.state.loans.active()[index];
                let expired = v
                    .state
                    .loans
                    .get(who)
                    .map(|loan| loan.is_expired(now))
                    .unwrap_or(false);
                visited += 1;
                if !expired {
                    index += 1;
                    continue;
                }

                let loan = v
                    .state
                    .loans
                    .swap_close(index)
                    .ok_or(LendingError::NoActiveLoan(who))?;
                let collateral = v.escrow.seize(Holder::Vault, &mut v.token, who)?;
                v.token.burn_from(Holder::Vault, collateral)?;
                defaulted += 1;
                seized = seized.add(collateral);

                tracing::info!(borrower = who.0, borrowed = %loan.borrowed, %collateral, "loan defaulted");
                v.emit_event(EventPayload::LoanDefaulted(LoanDefaultedEvent {
                    borrower: who,
                    borrowed: loan.borrowed,
                    seized: collateral,
                }));
            }

            Ok(DefaultResult {
                defaulted,
                seized,
                next_index: index,
            })
        })
    }
}
