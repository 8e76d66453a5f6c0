use loyalty_ledger::{AccrualRequest, LedgerEvent, MockCurrencyLedger, PointsEngine};
use loyalty_storage::{load_or_init, LedgerStore, SledStore};
use loyalty_types::{AccountId, CurrencyId};
use tempfile::TempDir;

fn mana() -> CurrencyId {
    CurrencyId::new("MANA").unwrap()
}

fn owner() -> AccountId {
    AccountId::from_label("owner")
}

fn slots() -> AccountId {
    AccountId::from_label("slots")
}

/// Run `f` against an engine loaded from `store`, then commit what it did.
fn with_engine<F: FnOnce(&PointsEngine)>(store: &SledStore, f: F) {
    let (state, events, _) = load_or_init(store, || {
        loyalty_ledger::LedgerState::new(owner(), mana())
    })
    .expect("load ledger");
    let already = events.len();
    let engine = PointsEngine::from_parts(state, events, Box::new(MockCurrencyLedger::new()));

    f(&engine);

    store
        .commit(&engine.snapshot(), &engine.events_since(already))
        .expect("commit");
    store.flush().expect("flush");
}

#[test]
fn state_survives_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let player = AccountId::from_label("player");
    let referrer = AccountId::from_label("referrer");

    let expected_hash = {
        let store = SledStore::open(&db_path).expect("open store");
        with_engine(&store, |engine| {
            engine.declare_caller(&owner(), slots()).unwrap();
            engine.set_ratio(&owner(), mana(), 150).unwrap();
            engine.assign_affiliate(&owner(), player, referrer).unwrap();
            engine
                .accrue(&slots(), AccrualRequest::new(player, mana(), 15_000).with_players(4))
                .unwrap();
        });
        store.load_state().unwrap().unwrap().state_hash().unwrap()
    };

    let reopened = SledStore::open(&db_path).expect("reopen store");
    let state = reopened.load_state().unwrap().expect("state present");
    assert_eq!(state.state_hash().unwrap(), expected_hash);
    assert_eq!(state.points.balance_of(&player), 130);
    assert_eq!(state.points.balance_of(&referrer), 13);
    assert_eq!(state.affiliates.referrer_of(&player), Some(referrer));
    assert_eq!(state.ratios.ratio_of(&mana()), 150);

    let events = reopened.load_events().unwrap();
    let names: Vec<_> = events.iter().map(LedgerEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "CallerDeclared",
            "RatioSet",
            "AffiliateAssigned",
            "PointsAccrued",
            "AffiliateCredited"
        ]
    );
}

#[test]
fn removed_rows_are_deleted() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SledStore::open(temp_dir.path().join("db")).expect("open store");

    with_engine(&store, |engine| {
        engine.declare_caller(&owner(), slots()).unwrap();
        engine.set_ratio(&owner(), mana(), 150).unwrap();
    });
    with_engine(&store, |engine| {
        engine.undeclare_caller(&owner(), &slots()).unwrap();
        engine.set_ratio(&owner(), mana(), 0).unwrap();
    });

    let state = store.load_state().unwrap().unwrap();
    assert_eq!(state.access.declared_callers().count(), 0);
    assert_eq!(state.ratios.ratio_of(&mana()), 0);
    assert_eq!(store.event_count().unwrap(), 4);
}

#[test]
fn events_keep_commit_order_across_sessions() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SledStore::open(temp_dir.path().join("db")).expect("open store");

    for enabled in [false, true, false] {
        with_engine(&store, |engine| {
            engine.enable_collecting(&owner(), enabled).unwrap();
        });
    }

    let toggles: Vec<_> = store
        .load_events()
        .unwrap()
        .into_iter()
        .map(|event| match event {
            LedgerEvent::CollectingToggled { enabled } => enabled,
            other => panic!("unexpected event {}", other.name()),
        })
        .collect();
    assert_eq!(toggles, vec![false, true, false]);
    assert!(!store.load_state().unwrap().unwrap().toggles.collecting_enabled);
}

#[test]
fn fresh_store_is_uninitialised() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SledStore::open(temp_dir.path().join("db")).expect("open store");
    assert!(store.load_state().unwrap().is_none());
    assert!(store.load_events().unwrap().is_empty());
}
