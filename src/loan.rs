// 5.0: loan records and the active-borrower index.
// one loan per borrower. collateral is the issued token, debt is the reserve asset.
// 5.1 loan book, 5.2 fee schedule, 5.3 pro-rata allocator for self-repay sweeps.

use crate::math::{self, MathError, Rounding};
use crate::types::{AccountId, Amount, Timestamp, SECONDS_PER_DAY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPosition {
    pub borrower: AccountId,
    pub borrowed: Amount,
    pub collateral: Amount,
    pub fee_accrued: Amount,
    pub opened_at: Timestamp,
    pub expiry: Timestamp,
    pub duration_secs: u64,
}

impl LoanPosition {
    pub fn new(
        borrower: AccountId,
        borrowed: Amount,
        collateral: Amount,
        fee: Amount,
        now: Timestamp,
        duration_secs: u64,
    ) -> Self {
        Self {
            borrower,
            borrowed,
            collateral,
            fee_accrued: fee,
            opened_at: now,
            expiry: now.plus_secs(duration_secs),
            duration_secs,
        }
    }

    // expiry itself is still a live block
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiry
    }

    /// Debt over collateral valued at `imv`. Zero for a loan without collateral value.
    pub fn ltv(&self, imv: Decimal) -> Decimal {
        let value = self.collateral.value() * imv;
        if value.is_zero() {
            return Decimal::ZERO;
        }
        self.borrowed.value() / value
    }

    /// Collateral released for repaying `repay` of the outstanding debt, rounded down.
    pub fn collateral_release(&self, repay: Amount, decimals: u32) -> Result<Amount, MathError> {
        if repay >= self.borrowed {
            return Ok(self.collateral);
        }
        let released = math::mul_div(
            self.collateral.value(),
            repay.value(),
            self.borrowed.value(),
            decimals,
            Rounding::Down,
        )?;
        Ok(Amount::new_unchecked(released))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LendingError {
    #[error("Loan amount too small to borrow against")]
    InsufficientLoanAmount,

    #[error("Duration {duration}s outside [{min}, {max}]")]
    InvalidDuration { duration: u64, min: u64, max: u64 },

    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral { required: Amount, available: Amount },

    #[error("Insufficient floor balance: requested {requested}, available {available}")]
    InsufficientFloorBalance { requested: Amount, available: Amount },

    #[error("No active loan for {0:?}")]
    NoActiveLoan(AccountId),

    #[error("{0:?} already has an active loan")]
    ActiveLoan(AccountId),

    #[error("Loan for {borrower:?} expired at {expiry}")]
    LoanExpired { borrower: AccountId, expiry: Timestamp },

    #[error("Loan has no collateral headroom to roll")]
    CantRollLoan,

    #[error("Repay amount {repay} exceeds outstanding {outstanding}")]
    InvalidRepayAmount { repay: Amount, outstanding: Amount },

    #[error("Insufficient protocol funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

// 5.1: loan book. `active` keeps borrowers in insertion order for paginated sweeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoanBook {
    loans: HashMap<AccountId, LoanPosition>,
    active: Vec<AccountId>,
    total_pledged: Amount,
}

impl LoanBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, borrower: AccountId) -> Option<&LoanPosition> {
        self.loans.get(&borrower)
    }

    pub fn require(&self, borrower: AccountId) -> Result<&LoanPosition, LendingError> {
        self.loans.get(&borrower).ok_or(LendingError::NoActiveLoan(borrower))
    }

    pub fn has_loan(&self, borrower: AccountId) -> bool {
        self.loans.contains_key(&borrower)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> &[AccountId] {
        &self.active
    }

    pub fn total_pledged(&self) -> Amount {
        self.total_pledged
    }

    pub fn total_borrowed(&self) -> Amount {
        self.loans.values().map(|l| l.borrowed).sum()
    }

    pub fn open(&mut self, loan: LoanPosition) -> Result<(), LendingError> {
        if self.loans.contains_key(&loan.borrower) {
            return Err(LendingError::ActiveLoan(loan.borrower));
        }
        self.total_pledged = self.total_pledged.add(loan.collateral);
        self.active.push(loan.borrower);
        self.loans.insert(loan.borrower, loan);
        Ok(())
    }

    /// Replaces a loan record, keeping `total_pledged` in step with the collateral change.
    pub fn update(&mut self, loan: LoanPosition) -> Result<(), LendingError> {
        let previous = self
            .loans
            .get_mut(&loan.borrower)
            .ok_or(LendingError::NoActiveLoan(loan.borrower))?;
        self.total_pledged = self
            .total_pledged
            .saturating_sub(previous.collateral)
            .add(loan.collateral);
        *previous = loan;
        Ok(())
    }

    // order-preserving removal, used on repayment so sweep cursors stay valid
    pub fn close(&mut self, borrower: AccountId) -> Result<LoanPosition, LendingError> {
        let loan = self
            .loans
            .remove(&borrower)
            .ok_or(LendingError::NoActiveLoan(borrower))?;
        self.active.retain(|b| *b != borrower);
        self.total_pledged = self.total_pledged.saturating_sub(loan.collateral);
        Ok(loan)
    }

    // swap-with-last removal, used by the default sweep which re-reads the same index
    pub fn swap_close(&mut self, index: usize) -> Option<LoanPosition> {
        if index >= self.active.len() {
            return None;
        }
        let borrower = self.active.swap_remove(index);
        let loan = self.loans.remove(&borrower)?;
        self.total_pledged = self.total_pledged.saturating_sub(loan.collateral);
        Some(loan)
    }
}

// 5.2: flat daily fee. partial days count as whole days, rounded in the vault's favour.
pub fn loan_fee(amount: Amount, duration_secs: u64, daily_rate: Decimal, decimals: u32) -> Result<Amount, MathError> {
    let days = duration_secs.div_ceil(SECONDS_PER_DAY);
    let fee = amount
        .value()
        .checked_mul(daily_rate)
        .and_then(|v| v.checked_mul(Decimal::from(days)))
        .ok_or(MathError::Overflow("loan_fee"))?;
    Ok(math::quantize_amount(fee, decimals, Rounding::Up))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub shares: Vec<Amount>,
    pub spent: Amount,
}

// 5.3: split `funds` across debts proportionally. each share is capped at its debt,
// the rounding remainder goes to the earliest loans with room. never spends more
// than `funds` or more than the total owed.
pub fn allocate_pro_rata(funds: Amount, outstanding: &[Amount], decimals: u32) -> Result<Allocation, MathError> {
    let total: Amount = outstanding.iter().sum();
    if total.is_zero() || funds.is_zero() {
        return Ok(Allocation {
            shares: vec![Amount::ZERO; outstanding.len()],
            spent: Amount::ZERO,
        });
    }
    if funds >= total {
        return Ok(Allocation {
            shares: outstanding.to_vec(),
            spent: total,
        });
    }

    let mut shares = Vec::with_capacity(outstanding.len());
    for owed in outstanding {
        let share = math::mul_div(funds.value(), owed.value(), total.value(), decimals, Rounding::Down)?;
        shares.push(Amount::new_unchecked(share).min(*owed));
    }

    let mut spent: Amount = shares.iter().sum();
    let mut remainder = funds.saturating_sub(spent);
    for (share, owed) in shares.iter_mut().zip(outstanding) {
        if remainder.is_zero() {
            break;
        }
        let top_up = owed.saturating_sub(*share).min(remainder);
        *share = share.add(top_up);
        remainder = remainder.saturating_sub(top_up);
        spent = spent.add(top_up);
    }

    Ok(Allocation { shares, spent })
}
