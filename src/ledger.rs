// 9.4 ledger.rs: token balances. the vault only sees these traits, the in-memory
// ledger backs tests and the simulation binary.

use crate::types::{Amount, Holder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{holder} holds {available}, requested {requested}")]
    InsufficientBalance {
        holder: Holder,
        requested: Amount,
        available: Amount,
    },
}

pub trait TokenLedger {
    fn symbol(&self) -> &str;

    fn balance_of(&self, holder: Holder) -> Amount;

    fn transfer(&mut self, from: Holder, to: Holder, amount: Amount) -> Result<(), LedgerError>;
}

/// A ledger whose supply the vault controls.
pub trait TokenSupply: TokenLedger {
    fn total_supply(&self) -> Amount;

    fn mint(&mut self, to: Holder, amount: Amount);

    fn burn_from(&mut self, holder: Holder, amount: Amount) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    symbol: String,
    balances: HashMap<Holder, Amount>,
    total_supply: Amount,
}

impl InMemoryLedger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: HashMap::new(),
            total_supply: Amount::ZERO,
        }
    }

    // seeds a balance from outside the system, e.g. a user's reserve wallet
    pub fn credit(&mut self, to: Holder, amount: Amount) {
        let entry = self.balances.entry(to).or_insert(Amount::ZERO);
        *entry = entry.add(amount);
        self.total_supply = self.total_supply.add(amount);
    }

    fn debit(&mut self, from: Holder, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                holder: from,
                requested: amount,
                available,
            })?;
        if remaining.is_zero() {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, remaining);
        }
        Ok(())
    }
}

impl TokenLedger for InMemoryLedger {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn balance_of(&self, holder: Holder) -> Amount {
        self.balances.get(&holder).copied().unwrap_or(Amount::ZERO)
    }

    fn transfer(&mut self, from: Holder, to: Holder, amount: Amount) -> Result<(), LedgerError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.debit(from, amount)?;
        let entry = self.balances.entry(to).or_insert(Amount::ZERO);
        *entry = entry.add(amount);
        Ok(())
    }
}

impl TokenSupply for InMemoryLedger {
    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn mint(&mut self, to: Holder, amount: Amount) {
        self.credit(to, amount);
    }

    fn burn_from(&mut self, holder: Holder, amount: Amount) -> Result<(), LedgerError> {
        self.debit(holder, amount)?;
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_moves_balance() {
        let mut l = InMemoryLedger::new("RES");
        let alice = Holder::Account(AccountId(1));
        l.credit(alice, Amount::new_unchecked(dec!(10)));
        l.transfer(alice, Holder::Vault, Amount::new_unchecked(dec!(4))).unwrap();
        assert_eq!(l.balance_of(alice).value(), dec!(6));
        assert_eq!(l.balance_of(Holder::Vault).value(), dec!(4));
        assert_eq!(l.total_supply().value(), dec!(10));
    }

    #[test]
    fn overdraft_rejected() {
        let mut l = InMemoryLedger::new("RES");
        let err = l
            .transfer(Holder::Vault, Holder::Pool, Amount::new_unchecked(dec!(1)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { holder: Holder::Vault, .. }));
    }

    #[test]
    fn burn_reduces_supply() {
        let mut l = InMemoryLedger::new("TOK");
        l.mint(Holder::Vault, Amount::new_unchecked(dec!(100)));
        l.burn_from(Holder::Vault, Amount::new_unchecked(dec!(30))).unwrap();
        assert_eq!(l.total_supply().value(), dec!(70));
        assert!(l.burn_from(Holder::Vault, Amount::new_unchecked(dec!(71))).is_err());
    }
}
