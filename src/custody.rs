// 9.2 custody.rs: collateral escrow. pledged tokens sit under Holder::Escrow and
// are booked per borrower. only the vault can move them back out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::{LedgerError, TokenLedger};
use crate::types::{AccountId, Amount, Holder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("{0} is not allowed to withdraw from escrow")]
    Unauthorized(Holder),

    #[error("Escrow holds {held} for {owner:?}, requested {requested}")]
    InsufficientEscrow {
        owner: AccountId,
        requested: Amount,
        held: Amount,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Escrow {
    held: HashMap<AccountId, Amount>,
    total_held: Amount,
}

impl Escrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_for(&self, owner: AccountId) -> Amount {
        self.held.get(&owner).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total_held(&self) -> Amount {
        self.total_held
    }

    pub fn pledge(
        &mut self,
        token: &mut dyn TokenLedger,
        owner: AccountId,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        token.transfer(Holder::Account(owner), Holder::Escrow, amount)?;
        let entry = self.held.entry(owner).or_insert(Amount::ZERO);
        *entry = entry.add(amount);
        self.total_held = self.total_held.add(amount);
        Ok(())
    }

    /// Moves `amount` of `owner`'s pledge to `to`. The vault is the only permitted caller.
    pub fn release(
        &mut self,
        caller: Holder,
        token: &mut dyn TokenLedger,
        owner: AccountId,
        to: Holder,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        if caller != Holder::Vault {
            return Err(CustodyError::Unauthorized(caller));
        }
        let held = self.held_for(owner);
        let remaining = held.checked_sub(amount).ok_or(CustodyError::InsufficientEscrow {
            owner,
            requested: amount,
            held,
        })?;

        token.transfer(Holder::Escrow, to, amount)?;
        if remaining.is_zero() {
            self.held.remove(&owner);
        } else {
            self.held.insert(owner, remaining);
        }
        self.total_held = self.total_held.saturating_sub(amount);
        Ok(())
    }

    // seized collateral lands in the vault, which burns it
    pub fn seize(
        &mut self,
        caller: Holder,
        token: &mut dyn TokenLedger,
        owner: AccountId,
    ) -> Result<Amount, CustodyError> {
        let held = self.held_for(owner);
        self.release(caller, token, owner, Holder::Vault, held)?;
        Ok(held)
    }
}
