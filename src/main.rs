//! Floor Vault Simulation.
//!
//! Walks one vault through its lifecycle: bootstrap, a buying wave that triggers
//! a shift, a loan against the raised floor, a sell-off that triggers a slide,
//! a self-repay sweep and finally a default sweep after expiry.

use floor_core::*;
use rust_decimal_macros::dec;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type SimVault = Vault<ConcentratedPool, InMemoryLedger, InMemoryLedger>;

// scenario clock: whole days after the wall-clock launch time
fn day(start: Timestamp, n: u64) -> Timestamp {
    start.plus_secs(n * SECONDS_PER_DAY)
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "floor_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Floor Vault Simulation");
    println!("Single Pool, Floor/Anchor/Discovery, Full Lifecycle\n");

    if let Err(e) = run() {
        eprintln!("simulation aborted: {e}");
        std::process::exit(1);
    }

    println!("\nAll simulations completed successfully.");
}

fn run() -> Result<(), VaultError> {
    let trader = AccountId(1);
    let start = Timestamp::now();
    let mut vault = scenario_1_bootstrap(start)?;
    scenario_2_buying_wave(&mut vault, trader, start)?;
    scenario_3_borrow(&mut vault, trader, start)?;
    scenario_4_sell_off(&mut vault, trader, start)?;
    scenario_5_self_repay(&mut vault, trader, start)?;
    scenario_6_defaults(&mut vault, start)?;
    print_solvency(&vault)
}

/// Vault funded with reserve, ranges placed around a 1.5 spot.
fn scenario_1_bootstrap(start: Timestamp) -> Result<SimVault, VaultError> {
    println!("Scenario 1: Bootstrap\n");

    let config = Environment::Testnet.config();
    let pool = ConcentratedPool::at_price(dec!(1.5), config.tick_spacing, config.decimals)?;
    let mut reserve = InMemoryLedger::new(config.reserve_symbol.clone());
    reserve.credit(Holder::Vault, Amount::new_unchecked(dec!(2000)));
    let token = InMemoryLedger::new(config.token_symbol.clone());

    let mut vault = Vault::new(config, pool, token, reserve)?;
    vault.initialize(
        Bootstrap {
            floor_price: dec!(1),
            floor_reserve: Amount::new_unchecked(dec!(1000)),
            anchor_reserve: Amount::new_unchecked(dec!(200)),
            discovery_price: dec!(3),
            discovery_supply: Amount::new_unchecked(dec!(5000)),
        },
        start,
    )?;

    print_ranges(&vault);
    println!("  IMV: {}, floor reserve: {}\n", vault.imv()?, vault.floor_reserve()?);
    Ok(vault)
}

/// Buyers push spot past the anchor; shift raises the floor.
fn scenario_2_buying_wave(vault: &mut SimVault, trader: AccountId, start: Timestamp) -> Result<(), VaultError> {
    println!("Scenario 2: Buying Wave and Shift\n");

    let (pool, token, reserve) = vault.parts_mut();
    reserve.credit(Holder::Account(trader), Amount::new_unchecked(dec!(10000)));
    let flow = pool.move_to_tick(Tick(5400), token, reserve, Holder::Account(trader))?;
    println!("  Trader pays {} reserve for {} tokens", flow.reserve_paid, flow.token_received);
    println!("  Spot now {}, circulating {}", vault.spot_price()?, vault.circulating_supply());

    let result = vault.shift(day(start, 1))?;
    println!(
        "  Shift: floor tick {} -> {}, minted {}, skimmed {}",
        result.previous_floor_tick, result.new_floor_tick, result.minted, result.skimmed
    );
    print_ranges(vault);
    println!("  IMV: {}\n", vault.imv()?);
    Ok(())
}

/// Trader borrows reserve against tokens at the new IMV.
fn scenario_3_borrow(vault: &mut SimVault, trader: AccountId, start: Timestamp) -> Result<(), VaultError> {
    println!("Scenario 3: Floor Loan\n");

    let now = day(start, 2);
    let loan = vault.borrow(trader, Amount::new_unchecked(dec!(10)), 30 * SECONDS_PER_DAY, now)?;
    println!("  Borrowed 10 for 30 days");
    println!("  Collateral: {}, fee: {}, received: {}", loan.collateral, loan.fee, loan.received);

    let err = vault
        .borrow(trader, Amount::new_unchecked(dec!(1)), 30 * SECONDS_PER_DAY, now)
        .unwrap_err();
    println!("  Second borrow rejected: {err}");
    println!("  Floor reserve after loan: {}\n", vault.floor_reserve()?);
    Ok(())
}

/// Price falls back toward the floor; slide narrows the anchor above it.
fn scenario_4_sell_off(vault: &mut SimVault, trader: AccountId, start: Timestamp) -> Result<(), VaultError> {
    println!("Scenario 4: Sell-off and Slide\n");

    let floor_upper = vault.positions().require(Slot::Floor)?.upper;
    let spot = vault.exchange().spot_tick();
    let target = Tick(floor_upper.0 + (spot.0 - floor_upper.0) / 2);

    let (pool, token, reserve) = vault.parts_mut();
    let flow = pool.move_to_tick(target, token, reserve, Holder::Account(trader))?;
    println!("  Trader sells {} tokens for {} reserve", flow.token_paid, flow.reserve_received);

    let result = vault.slide(day(start, 3))?;
    println!(
        "  Slide: burned {}, anchor now [{}, {}]",
        result.burned, result.anchor_lower, result.anchor_upper
    );
    println!("  IMV unchanged: {}\n", vault.imv()?);
    Ok(())
}

/// Protocol fee pool pays down high-LTV loans.
fn scenario_5_self_repay(vault: &mut SimVault, trader: AccountId, start: Timestamp) -> Result<(), VaultError> {
    println!("Scenario 5: Self-Repay Sweep\n");

    let pool = vault.deposit_protocol_funds(trader, Amount::new_unchecked(dec!(5)))?;
    println!("  Protocol fee pool: {pool}");

    let result = vault.self_repay_loans(pool, 0, 50, day(start, 4))?;
    println!(
        "  {} eligible, repaid {}, next index {}",
        result.eligible, result.total_repaid, result.next_index
    );
    if let Some(loan) = vault.loans().get(trader) {
        println!("  Loan now {} against {} collateral\n", loan.borrowed, loan.collateral);
    }
    Ok(())
}

/// After expiry the collateral is seized and burned.
fn scenario_6_defaults(vault: &mut SimVault, start: Timestamp) -> Result<(), VaultError> {
    println!("Scenario 6: Default Sweep\n");

    let now = day(start, 40);
    let first = vault.default_loans_range(0, 10, now)?;
    println!("  Defaulted {}, seized {}", first.defaulted, first.seized);
    let again = vault.default_loans_range(0, 10, now)?;
    println!("  Second sweep defaulted {}, active loans {}\n", again.defaulted, vault.loans().len());
    Ok(())
}

fn print_ranges(vault: &SimVault) {
    for slot in Slot::ALL {
        if let Some(p) = vault.positions().get(slot) {
            println!("  {:<9} [{}, {}] liquidity {}", slot.to_string(), p.lower, p.upper, p.liquidity);
        }
    }
}

fn print_solvency(vault: &SimVault) -> Result<(), VaultError> {
    let report = vault.solvency_report()?;
    println!("Final Solvency\n");
    println!("  Circulating: {}", report.circulating);
    println!("  Capacity: {} (floor {}, anchor {})", report.total_capacity, report.floor_capacity, report.anchor_capacity);
    println!("  Headroom: {}", report.headroom());
    println!(
        "  Floor reserve: {} (required {} at IMV)",
        report.floor_reserve, report.required_floor_reserve
    );
    println!("  Outstanding debt: {}", report.outstanding_debt);
    println!("  Events recorded: {}", vault.events().len());
    Ok(())
}
