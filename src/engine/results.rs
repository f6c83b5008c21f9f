// 8.0.2: result types and errors for vault operations.

use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::exchange::ExchangeError;
use crate::issuance::IssuanceError;
use crate::ledger::LedgerError;
use crate::loan::LendingError;
use crate::math::MathError;
use crate::position::{PositionError, Slot};
use crate::solvency::SolvencyError;
use crate::types::{Amount, Tick, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftResult {
    pub previous_floor_tick: Tick,
    pub new_floor_tick: Tick,
    pub minted: Amount,
    pub skimmed: Amount,
    pub circulating: Amount,
    // anchor reserve that found no tokens to pair with and went into the floor
    pub floor_top_up: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideResult {
    pub burned: Amount,
    pub circulating: Amount,
    pub floor_top_up: Amount,
    pub anchor_lower: Tick,
    pub anchor_upper: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowResult {
    pub collateral: Amount,
    pub fee: Amount,
    pub received: Amount,
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayResult {
    pub repaid: Amount,
    pub collateral_released: Amount,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub increment: Amount,
    pub fee: Amount,
    pub new_expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfRepayResult {
    pub eligible: usize,
    pub total_repaid: Amount,
    pub next_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultResult {
    pub defaulted: usize,
    pub seized: Amount,
    pub next_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidityError {
    #[error("{0} range resolves to zero liquidity")]
    ZeroLiquidity(Slot),

    #[error("Invalid {slot} range [{lower}, {upper})")]
    InvalidTicks { slot: Slot, lower: Tick, upper: Tick },

    #[error("{op} re-entered while {held_by} is running")]
    Reentrant { op: &'static str, held_by: &'static str },

    #[error("Vault positions are not initialized")]
    NotInitialized,

    #[error("{0} position already deployed")]
    AlreadyDeployed(Slot),

    #[error("Spot tick {spot} is not above the anchor band (upper {anchor_upper})")]
    ShiftNotNeeded { spot: Tick, anchor_upper: Tick },

    #[error("Spot tick {spot} has not fallen below {reference}, the spot at the last rebalance")]
    SlideNotNeeded { spot: Tick, reference: Tick },

    #[error("Insufficient idle reserve: requested {requested}, available {available}")]
    InsufficientReserve { requested: Amount, available: Amount },

    #[error("Insufficient idle tokens: requested {requested}, available {available}")]
    InsufficientTokens { requested: Amount, available: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("Exchange does not match vault config: {reason}")]
    ExchangeMismatch { reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Liquidity error: {0}")]
    Liquidity(#[from] LiquidityError),

    #[error("Lending error: {0}")]
    Lending(#[from] LendingError),

    #[error("Issuance error: {0}")]
    Issuance(#[from] IssuanceError),

    #[error("Solvency error: {0}")]
    Solvency(#[from] SolvencyError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),
}
