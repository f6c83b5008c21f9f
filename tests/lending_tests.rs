//! Lending lifecycle tests.
//!
//! Borrow, repay, roll, self-repay and default flows against a bootstrapped vault
//! with the floor at price 1.0, so collateral and debt line up one to one.

use floor_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type TestVault = Vault<ConcentratedPool, InMemoryLedger, InMemoryLedger>;

const DAY: u64 = SECONDS_PER_DAY;

fn amt(v: Decimal) -> Amount {
    Amount::new_unchecked(v)
}

fn at_day(day: u64) -> Timestamp {
    Timestamp::from_secs((day * DAY) as i64)
}

fn vault() -> TestVault {
    let config = VaultConfig::default();
    let pool = ConcentratedPool::at_price(dec!(1.5), config.tick_spacing, config.decimals).unwrap();
    let mut reserve = InMemoryLedger::new("WETH");
    reserve.credit(Holder::Vault, amt(dec!(2000)));
    let mut v = Vault::new(config, pool, InMemoryLedger::new("FLR"), reserve).unwrap();
    v.initialize(
        Bootstrap {
            floor_price: dec!(1),
            floor_reserve: amt(dec!(1000)),
            anchor_reserve: amt(dec!(200)),
            discovery_price: dec!(3),
            discovery_supply: amt(dec!(5000)),
        },
        Timestamp::from_secs(0),
    )
    .unwrap();
    v
}

/// Buys through the anchor into discovery so `trader` ends up holding tokens.
fn buy_up(v: &mut TestVault, trader: AccountId, tick: i32) -> PriceMove {
    let (pool, token, reserve) = v.parts_mut();
    reserve.credit(Holder::Account(trader), amt(dec!(10000)));
    pool.move_to_tick(Tick(tick), token, reserve, Holder::Account(trader))
        .unwrap()
}

fn hand_tokens(v: &mut TestVault, from: AccountId, to: AccountId, amount: Decimal) {
    let (_, token, _) = v.parts_mut();
    token
        .transfer(Holder::Account(from), Holder::Account(to), amt(amount))
        .unwrap();
}

fn tokens_of(v: &TestVault, who: AccountId) -> Amount {
    v.token().balance_of(Holder::Account(who))
}

fn funded() -> (TestVault, AccountId) {
    let trader = AccountId(1);
    let mut v = vault();
    buy_up(&mut v, trader, 5400);
    (v, trader)
}

mod borrow_tests {
    use super::*;

    #[test]
    fn borrow_then_immediate_payback_returns_collateral() {
        let (mut v, trader) = funded();
        assert_eq!(v.imv().unwrap(), Decimal::ONE);
        let tokens_before = tokens_of(&v, trader);

        let loan = v.borrow(trader, amt(dec!(50)), 30 * DAY, at_day(0)).unwrap();
        assert_eq!(loan.collateral.value(), dec!(50));
        // 50 * 0.00027 * 30
        assert_eq!(loan.fee.value(), dec!(0.405));
        assert_eq!(loan.received.value(), dec!(49.595));
        assert_eq!(loan.expiry, at_day(30));
        assert_eq!(v.escrow().held_for(trader).value(), dec!(50));
        assert_eq!(v.protocol_fees().value(), dec!(0.405));

        let repaid = v.payback_loan(trader, Amount::ZERO, at_day(0)).unwrap();
        assert!(repaid.closed);
        assert_eq!(repaid.repaid.value(), dec!(50));
        assert_eq!(repaid.collateral_released.value(), dec!(50));
        assert!(!v.loans().has_loan(trader));
        assert!(v.loans().is_empty());
        assert_eq!(tokens_of(&v, trader), tokens_before);
        assert_eq!(v.escrow().total_held(), Amount::ZERO);
        assert!(v.floor_reserve().unwrap().value() > dec!(999.99));
    }

    #[test]
    fn short_duration_rejected_state_unchanged() {
        let (mut v, trader) = funded();
        let tokens_before = tokens_of(&v, trader);
        let vault_reserve = v.reserve().balance_of(Holder::Vault);
        let events_before = v.events().len();
        let floor_before = *v.positions().floor().unwrap();

        let err = v.borrow(trader, amt(dec!(50)), DAY, at_day(0)).unwrap_err();
        assert_eq!(
            err,
            VaultError::Lending(LendingError::InvalidDuration {
                duration: DAY,
                min: 30 * DAY,
                max: 365 * DAY,
            })
        );
        assert!(v.loans().is_empty());
        assert_eq!(tokens_of(&v, trader), tokens_before);
        assert_eq!(v.reserve().balance_of(Holder::Vault), vault_reserve);
        assert_eq!(v.events().len(), events_before);
        assert_eq!(*v.positions().floor().unwrap(), floor_before);
    }

    #[test]
    fn second_borrow_rejected_while_active() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(20)), 30 * DAY, at_day(0)).unwrap();
        let err = v.borrow(trader, amt(dec!(5)), 30 * DAY, at_day(1)).unwrap_err();
        assert_eq!(err, VaultError::Lending(LendingError::ActiveLoan(trader)));
        assert_eq!(v.loans().len(), 1);
        assert_eq!(v.loans().get(trader).unwrap().borrowed.value(), dec!(20));
    }

    #[test]
    fn borrow_without_tokens_rejected() {
        let (mut v, _) = funded();
        let stranger = AccountId(99);
        let err = v.borrow(stranger, amt(dec!(10)), 30 * DAY, at_day(0)).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Lending(LendingError::InsufficientCollateral { .. })
        ));
    }

    #[test]
    fn borrow_beyond_floor_rejected() {
        let (mut v, trader) = funded();
        let err = v.borrow(trader, amt(dec!(1500)), 30 * DAY, at_day(0)).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Lending(LendingError::InsufficientCollateral { .. })
                | VaultError::Lending(LendingError::InsufficientFloorBalance { .. })
        ));
        assert!(v.loans().is_empty());
    }

    #[test]
    fn borrow_before_initialize_rejected() {
        let config = VaultConfig::default();
        let pool = ConcentratedPool::at_price(dec!(1.5), config.tick_spacing, config.decimals).unwrap();
        let mut v: TestVault =
            Vault::new(config, pool, InMemoryLedger::new("FLR"), InMemoryLedger::new("WETH")).unwrap();
        let err = v.borrow(AccountId(1), amt(dec!(1)), 30 * DAY, at_day(0)).unwrap_err();
        assert_eq!(err, VaultError::Liquidity(LiquidityError::NotInitialized));
    }

    #[test]
    fn borrow_shrinks_floor_by_amount() {
        let (mut v, trader) = funded();
        let before = v.floor_reserve().unwrap();
        v.borrow(trader, amt(dec!(100)), 60 * DAY, at_day(0)).unwrap();
        let after = v.floor_reserve().unwrap();
        let diff = before.value() - after.value();
        assert!((diff - dec!(100)).abs() < dec!(0.000001), "floor moved by {diff}");
        assert!(v.enforce_invariants().is_ok());
    }
}

mod repay_tests {
    use super::*;

    #[test]
    fn partial_payback_releases_pro_rata_collateral() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();

        let repaid = v.payback_loan(trader, amt(dec!(10)), at_day(5)).unwrap();
        assert!(!repaid.closed);
        assert_eq!(repaid.collateral_released.value(), dec!(10));

        let loan = v.loans().get(trader).unwrap();
        assert_eq!(loan.borrowed.value(), dec!(30));
        assert_eq!(loan.collateral.value(), dec!(30));
        assert_eq!(v.escrow().held_for(trader).value(), dec!(30));
    }

    #[test]
    fn overpayment_rejected() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        let err = v.payback_loan(trader, amt(dec!(41)), at_day(1)).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Lending(LendingError::InvalidRepayAmount { .. })
        ));
    }

    #[test]
    fn payback_after_expiry_rejected() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        // expiry itself is still repayable
        assert!(v.payback_loan(trader, amt(dec!(1)), at_day(30)).is_ok());
        let err = v
            .payback_loan(trader, Amount::ZERO, Timestamp::from_secs((30 * DAY + 1) as i64))
            .unwrap_err();
        assert!(matches!(err, VaultError::Lending(LendingError::LoanExpired { .. })));
    }

    #[test]
    fn payback_without_loan_rejected() {
        let (mut v, trader) = funded();
        let err = v.payback_loan(trader, Amount::ZERO, at_day(0)).unwrap_err();
        assert_eq!(err, VaultError::Lending(LendingError::NoActiveLoan(trader)));
    }

    #[test]
    fn add_collateral_lowers_ltv() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        let total = v.add_collateral(trader, amt(dec!(40)), at_day(1)).unwrap();
        assert_eq!(total.value(), dec!(80));
        let imv = v.imv().unwrap();
        assert_eq!(v.loans().get(trader).unwrap().ltv(imv), dec!(0.5));
        assert_eq!(v.loans().total_pledged().value(), dec!(80));
    }

    #[test]
    fn add_collateral_without_loan_rejected() {
        let (mut v, trader) = funded();
        let err = v.add_collateral(trader, amt(dec!(1)), at_day(0)).unwrap_err();
        assert_eq!(err, VaultError::Lending(LendingError::NoActiveLoan(trader)));
    }
}

mod roll_tests {
    use super::*;

    #[test]
    fn roll_borrows_against_raised_floor() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(50)), 30 * DAY, at_day(0)).unwrap();

        let shift = v.shift(at_day(1)).unwrap();
        assert!(shift.new_floor_tick > shift.previous_floor_tick);
        let imv = v.imv().unwrap();
        assert!(imv > Decimal::ONE);

        let rolled = v.roll_loan(trader, 60 * DAY, at_day(2)).unwrap();
        assert!(!rolled.increment.is_zero());
        assert_eq!(rolled.new_expiry, at_day(62));

        let loan = v.loans().get(trader).unwrap();
        assert_eq!(loan.borrowed.value(), dec!(50) + rolled.increment.value());
        assert_eq!(loan.collateral.value(), dec!(50));
        assert!(loan.ltv(imv) <= Decimal::ONE);

        // nothing left to draw at the same IMV
        let err = v.roll_loan(trader, 60 * DAY, at_day(3)).unwrap_err();
        assert_eq!(err, VaultError::Lending(LendingError::CantRollLoan));
    }

    #[test]
    fn roll_at_unchanged_floor_rejected() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(50)), 30 * DAY, at_day(0)).unwrap();
        let err = v.roll_loan(trader, 30 * DAY, at_day(1)).unwrap_err();
        assert_eq!(err, VaultError::Lending(LendingError::CantRollLoan));
    }
}

mod sweep_tests {
    use super::*;

    #[test]
    fn self_repay_splits_exactly() {
        let (mut v, trader) = funded();
        let alice = AccountId(2);
        let bob = AccountId(3);
        hand_tokens(&mut v, trader, alice, dec!(60));
        hand_tokens(&mut v, trader, bob, dec!(40));
        v.borrow(alice, amt(dec!(60)), 30 * DAY, at_day(0)).unwrap();
        v.borrow(bob, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        let fees = v.protocol_fees();
        v.deposit_protocol_funds(trader, amt(dec!(100))).unwrap();
        let supply_before = v.token().total_supply();

        let swept = v.self_repay_loans(amt(dec!(100)), 0, 10, at_day(1)).unwrap();
        assert_eq!(swept.eligible, 2);
        assert_eq!(swept.total_repaid.value(), dec!(100));
        assert_eq!(swept.next_index, 0);
        assert!(v.loans().is_empty());
        assert_eq!(v.protocol_fees(), fees);
        assert_eq!(v.escrow().total_held(), Amount::ZERO);
        assert_eq!(v.token().total_supply().value(), supply_before.value() - dec!(100));
        assert!(v.enforce_invariants().is_ok());
    }

    #[test]
    fn self_repay_skips_low_ltv_loans() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        v.add_collateral(trader, amt(dec!(40)), at_day(0)).unwrap();
        let pool = v.protocol_fees();

        let swept = v.self_repay_loans(pool, 0, 10, at_day(1)).unwrap();
        assert_eq!(swept.eligible, 0);
        assert_eq!(swept.total_repaid, Amount::ZERO);
        assert_eq!(swept.next_index, 1);
        assert_eq!(v.loans().get(trader).unwrap().borrowed.value(), dec!(40));
    }

    #[test]
    fn self_repay_beyond_pool_rejected() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        let err = v.self_repay_loans(amt(dec!(10)), 0, 10, at_day(1)).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Lending(LendingError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn default_is_idempotent() {
        let (mut v, trader) = funded();
        v.borrow(trader, amt(dec!(40)), 30 * DAY, at_day(0)).unwrap();
        let supply_before = v.token().total_supply();
        let circulating_before = v.circulating_supply();

        // not yet expired
        let early = v.default_loans_range(0, 10, at_day(30)).unwrap();
        assert_eq!(early.defaulted, 0);
        assert_eq!(early.next_index, 1);

        let first = v.default_loans_range(0, 10, at_day(31)).unwrap();
        assert_eq!(first.defaulted, 1);
        assert_eq!(first.seized.value(), dec!(40));
        assert!(v.loans().is_empty());
        assert_eq!(v.escrow().total_held(), Amount::ZERO);
        assert_eq!(v.token().total_supply().value(), supply_before.value() - dec!(40));
        assert_eq!(v.circulating_supply(), circulating_before);

        let events = v.events().len();
        let second = v.default_loans_range(0, 10, at_day(31)).unwrap();
        assert_eq!(second.defaulted, 0);
        assert_eq!(second.seized, Amount::ZERO);
        assert_eq!(v.token().total_supply().value(), supply_before.value() - dec!(40));
        assert_eq!(v.events().len(), events);
    }

    #[test]
    fn default_rechecks_swapped_slot() {
        let (mut v, trader) = funded();
        let alice = AccountId(2);
        let bob = AccountId(3);
        let carol = AccountId(4);
        for who in [alice, bob, carol] {
            hand_tokens(&mut v, trader, who, dec!(20));
        }
        v.borrow(alice, amt(dec!(10)), 30 * DAY, at_day(0)).unwrap();
        v.borrow(bob, amt(dec!(10)), 60 * DAY, at_day(0)).unwrap();
        v.borrow(carol, amt(dec!(10)), 30 * DAY, at_day(0)).unwrap();

        // alice goes, carol is swapped into slot 0 and goes too, bob survives
        let swept = v.default_loans_range(0, 10, at_day(45)).unwrap();
        assert_eq!(swept.defaulted, 2);
        assert_eq!(swept.next_index, 1);
        assert_eq!(v.loans().active(), &[bob]);
    }

    #[test]
    fn default_respects_limit() {
        let (mut v, trader) = funded();
        let borrowers: Vec<AccountId> = (2..6).map(AccountId).collect();
        for who in &borrowers {
            hand_tokens(&mut v, trader, *who, dec!(10));
            v.borrow(*who, amt(dec!(5)), 30 * DAY, at_day(0)).unwrap();
        }

        let first = v.default_loans_range(0, 2, at_day(40)).unwrap();
        assert_eq!(first.defaulted, 2);
        assert_eq!(v.loans().len(), 2);
        let rest = v.default_loans_range(first.next_index, 10, at_day(40)).unwrap();
        assert_eq!(rest.defaulted, 2);
        assert!(v.loans().is_empty());
    }
}
