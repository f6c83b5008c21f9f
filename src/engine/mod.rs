// 8.0: the vault. owns the floor/anchor/discovery ranges, the loan book, the
// collateral escrow and the protocol fee pool. every public operation runs on a
// draft copy and only commits when the post-conditions hold.

mod core;
mod lending;
mod liquidity;
mod results;
mod sweeps;

pub use core::{Vault, VaultState};
pub use liquidity::{Bootstrap, SequenceLock};
pub use results::{
    BorrowResult, DefaultResult, LiquidityError, RepayResult, RollResult, SelfRepayResult, ShiftResult,
    SlideResult, VaultError,
};
