// floor-core: floor-backed market-making and lending vault.
// solvency-first architecture: every state change re-checks that the reserve
// parked in the floor and anchor ranges can buy back the circulating supply.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Holder, Amount, Tick, Liquidity, Bps
//   2.x  math.rs: decimal scaling, rounding, mul_div, sqrt
//   2.1x ticks.rs: tick <-> price, range amounts and liquidity sizing
//   3.x  issuance.rs: adaptive mint/burn controller
//   4.x  position.rs: floor/anchor/discovery slots and their layout
//   5.x  loan.rs: loan positions, fees, pro-rata allocation
//   6.x  ledger.rs: token ledgers (in-memory)
//   6.1  exchange.rs: concentrated-liquidity pool abstraction
//   6.2  custody.rs: collateral escrow
//   6.3  solvency.rs: buy-back capacity check
//   7.x  config.rs: liquidity, lending, issuance params, env presets
//   8.x  engine/: the vault: ranges, shift/slide, lending, sweeps
//   11.x events.rs: state transition events for audit

// core vault modules
pub mod engine;
pub mod events;
pub mod issuance;
pub mod loan;
pub mod position;
pub mod types;

// maths
pub mod math;
pub mod ticks;

// risk and safety modules
pub mod solvency;

// integration modules
pub mod config;
pub mod custody;
pub mod exchange;
pub mod ledger;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use issuance::*;
pub use loan::*;
pub use position::*;
pub use types::*;
pub use config::{ConfigError, Environment, LendingParams, LiquidityParams, VaultConfig};
pub use custody::{CustodyError, Escrow};
pub use exchange::{ConcentratedPool, Exchange, ExchangeError, PoolSettlement, PriceMove};
pub use ledger::{InMemoryLedger, LedgerError, TokenLedger, TokenSupply};
pub use math::{MathError, Rounding};
pub use solvency::{SolvencyError, SolvencyReport};
