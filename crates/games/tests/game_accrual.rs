//! Points earned through the game modules
//!
//! - slots: every spin counts, wearables add up to four units of bonus
//! - backgammon: opening stakes and called doubles count for both players,
//!   raises and drops do not

use loyalty_games::{Backgammon, GameError, Slots};
use loyalty_ledger::{AccrualRequest, LedgerError, MockCurrencyLedger, PointsEngine};
use loyalty_types::{AccountId, CurrencyId};
use std::sync::Arc;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn mana() -> CurrencyId {
    CurrencyId::new("MANA").unwrap()
}

fn owner() -> AccountId {
    AccountId::from_label("owner")
}

fn user(n: u8) -> AccountId {
    AccountId::from_label(&format!("user{n}"))
}

fn engine_with_module(module: AccountId, ratio: u128) -> Arc<PointsEngine> {
    let engine = Arc::new(PointsEngine::new(
        owner(),
        mana(),
        Box::new(MockCurrencyLedger::new()),
    ));
    engine.declare_caller(&owner(), module).unwrap();
    engine.set_ratio(&owner(), mana(), ratio).unwrap();
    engine
}

fn backgammon_table() -> (Arc<PointsEngine>, Backgammon) {
    let module = AccountId::from_label("backgammon");
    let engine = engine_with_module(module, 10);
    let table = Backgammon::new(module, engine.clone());
    (engine, table)
}

// =============================================================================
// SLOTS
// =============================================================================

#[test]
fn test_slots_continuous_play() {
    let module = AccountId::from_label("slots");
    let engine = engine_with_module(module, 200);
    let slots = Slots::new(module, engine.clone());

    for _ in 0..5 {
        slots.play(user(2), 1_000, mana(), 0).unwrap();
    }
    assert_eq!(engine.balance_of(&user(2)), 5_000 / 200);
}

#[test]
fn test_slots_wearables_capped_at_four() {
    let module = AccountId::from_label("slots");
    let engine = engine_with_module(module, 200);
    let slots = Slots::new(module, engine.clone());

    for _ in 0..5 {
        slots.play(user(1), 1_000, mana(), 4).unwrap();
    }
    assert_eq!(engine.balance_of(&user(1)), 5 * (1_400 / 200));

    slots.play(user(3), 1_000, mana(), 9).unwrap();
    assert_eq!(engine.balance_of(&user(3)), 1_400 / 200);
}

#[test]
fn test_undeclared_slots_earn_nothing() {
    let module = AccountId::from_label("slots");
    let engine = engine_with_module(module, 100);
    engine.undeclare_caller(&owner(), &module).unwrap();
    let slots = Slots::new(module, engine.clone());

    let outcome = slots.play(user(1), 1_000, mana(), 0).unwrap();
    assert!(!outcome.is_credited());
    assert_eq!(engine.balance_of(&user(1)), 0);
    assert_eq!(slots.stats().plays, 1);
}

// =============================================================================
// BACKGAMMON
// =============================================================================

#[test]
fn test_initialize_credits_both_players() {
    let (engine, table) = backgammon_table();
    table
        .initialize_game(100, user(1), user(2), mana(), 0, 0)
        .unwrap();

    assert_eq!(engine.balance_of(&user(1)), 10);
    assert_eq!(engine.balance_of(&user(2)), 10);
}

#[test]
fn test_raise_without_call_earns_nothing() {
    let (engine, table) = backgammon_table();
    let id = table
        .initialize_game(100, user(1), user(2), mana(), 0, 0)
        .unwrap();

    table.raise_double(&id, &user(1)).unwrap();
    assert_eq!(engine.balance_of(&user(1)), 10);
    assert_eq!(engine.balance_of(&user(2)), 10);
}

#[test]
fn test_call_double_credits_increase() {
    let (engine, table) = backgammon_table();
    let id = table
        .initialize_game(100, user(1), user(2), mana(), 0, 0)
        .unwrap();

    table.raise_double(&id, &user(1)).unwrap();
    assert_eq!(table.call_double(&id, &user(2)).unwrap(), 400);

    assert_eq!(engine.balance_of(&user(1)), 20);
    assert_eq!(engine.balance_of(&user(2)), 20);
}

#[test]
fn test_drop_after_raise_earns_nothing() {
    let (engine, table) = backgammon_table();
    let id = table
        .initialize_game(100, user(1), user(2), mana(), 0, 0)
        .unwrap();

    table.raise_double(&id, &user(1)).unwrap();
    table.drop_game(&id, &user(2)).unwrap();

    assert_eq!(engine.balance_of(&user(1)), 10);
    assert_eq!(engine.balance_of(&user(2)), 10);
    assert!(table.game(&id).is_none());
}

#[test]
fn test_wearable_bonus_is_per_player() {
    let (engine, table) = backgammon_table();
    table
        .initialize_game(100, user(1), user(2), mana(), 1, 0)
        .unwrap();

    assert_eq!(engine.balance_of(&user(1)), 11);
    assert_eq!(engine.balance_of(&user(2)), 10);
}

#[test]
fn test_ledger_overflow_leaves_no_game() {
    let (engine, table) = backgammon_table();
    engine.set_ratio(&owner(), mana(), 1).unwrap();

    let result = table.initialize_game(u128::MAX, user(1), user(2), mana(), 1, 0);
    assert!(matches!(
        result,
        Err(GameError::Ledger(LedgerError::CalculationOverflow(_)))
    ));
    assert_eq!(table.active_games(), 0);
}

#[test]
fn test_second_player_overflow_credits_nobody() {
    let (engine, table) = backgammon_table();
    engine.set_ratio(&owner(), mana(), 1).unwrap();

    // 100% fits, the second seat's 120% does not.
    let stake = u128::MAX / 110;
    let result = table.initialize_game(stake, user(1), user(2), mana(), 0, 2);
    assert!(matches!(
        result,
        Err(GameError::Ledger(LedgerError::CalculationOverflow(_)))
    ));
    assert_eq!(table.active_games(), 0);
    assert_eq!(engine.balance_of(&user(1)), 0);
    assert_eq!(engine.balance_of(&user(2)), 0);
}

#[test]
fn test_failed_call_keeps_stake_and_balances() {
    let (engine, table) = backgammon_table();
    let module = AccountId::from_label("backgammon");
    engine.set_ratio(&owner(), mana(), 1).unwrap();

    // Fill the outstanding total to 98% of its range.
    let unit = u128::MAX / 100;
    for _ in 0..98 {
        engine
            .accrue(&module, AccrualRequest::new(user(9), mana(), unit))
            .unwrap();
    }

    // Opening stake: 0.5 + 0.6 units, total now at 99.1 units.
    let stake = unit / 2;
    let id = table
        .initialize_game(stake, user(1), user(2), mana(), 0, 2)
        .unwrap();
    let before = (engine.balance_of(&user(1)), engine.balance_of(&user(2)));
    let hash = engine.state_hash().unwrap();
    let events = engine.event_count();

    // Calling reports another 1.1 units: the first seat fits, the second
    // pushes the total past the limit.
    table.raise_double(&id, &user(1)).unwrap();
    assert!(matches!(
        table.call_double(&id, &user(2)),
        Err(GameError::Ledger(LedgerError::CalculationOverflow(_)))
    ));

    assert_eq!(
        (engine.balance_of(&user(1)), engine.balance_of(&user(2))),
        before
    );
    assert_eq!(engine.state_hash().unwrap(), hash);
    assert_eq!(engine.event_count(), events);
    let game = table.game(&id).unwrap();
    assert_eq!(game.stake, stake);
    assert_eq!(game.pending_raise, Some(user(1)));
}
