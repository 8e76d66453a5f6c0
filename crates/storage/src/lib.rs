//! Persistence for the loyalty points ledger
//!
//! The ledger state is stored as a handful of key-value tables (see
//! [`codec`]). Every commit writes all of them plus the new events in one
//! sled transaction, so a crash never leaves half an operation on disk.

pub mod codec;

use crate::codec::{LedgerTables, Table};
use loyalty_ledger::{LedgerEvent, LedgerState};
use parking_lot::RwLock;
use sled::transaction::{
    ConflictableTransactionResult, TransactionError, TransactionResult, TransactionalTree,
    Transactional,
};
use sled::{Db, Tree};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Malformed entry in {table}: {reason}")]
    Codec { table: &'static str, reason: String },
    #[error("Missing setting: {0}")]
    MissingSetting(String),
    #[error("Transaction aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Abstract ledger store
pub trait LedgerStore: Send + Sync {
    /// `None` until the first commit.
    fn load_state(&self) -> Result<Option<LedgerState>>;

    /// Events from sequence number `offset` onwards, in commit order.
    fn load_events_since(&self, offset: u64) -> Result<Vec<LedgerEvent>>;

    /// All events in commit order.
    fn load_events(&self) -> Result<Vec<LedgerEvent>> {
        self.load_events_since(0)
    }

    fn event_count(&self) -> Result<u64>;

    /// Replace the stored state and append `new_events`, atomically.
    fn commit(&self, state: &LedgerState, new_events: &[LedgerEvent]) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Sled-backed implementation
// ============================================================================

struct TableWrite {
    removals: Vec<Vec<u8>>,
    upserts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl TableWrite {
    /// Compare a tree with the rows it should hold.
    fn diff(tree: &Tree, desired: &Table) -> Result<Self> {
        let mut unchanged = BTreeSet::new();
        let mut removals = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry?;
            match desired.get(key.as_ref()) {
                Some(wanted) if wanted.as_slice() == value.as_ref() => {
                    unchanged.insert(key.to_vec());
                }
                Some(_) => {}
                None => removals.push(key.to_vec()),
            }
        }
        let upserts = desired
            .iter()
            .filter(|(key, _)| !unchanged.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self { removals, upserts })
    }

    fn apply(&self, tree: &TransactionalTree) -> ConflictableTransactionResult<(), ()> {
        for key in &self.removals {
            tree.remove(key.as_slice())?;
        }
        for (key, value) in &self.upserts {
            tree.insert(key.as_slice(), value.as_slice())?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.removals.len() + self.upserts.len()
    }
}

pub struct SledStore {
    db: Db,
    balances: Tree,
    ratios: Tree,
    affiliates: Tree,
    callers: Tree,
    settings: Tree,
    events: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let balances = db.open_tree(codec::BALANCES)?;
        let ratios = db.open_tree(codec::RATIOS)?;
        let affiliates = db.open_tree(codec::AFFILIATES)?;
        let callers = db.open_tree(codec::CALLERS)?;
        let settings = db.open_tree(codec::SETTINGS)?;
        let events = db.open_tree(codec::EVENTS)?;

        Ok(Self {
            db,
            balances,
            ratios,
            affiliates,
            callers,
            settings,
            events,
        })
    }

    fn read_table(tree: &Tree) -> Result<Table> {
        tree.iter()
            .map(|entry| {
                let (key, value) = entry?;
                Ok((key.to_vec(), value.to_vec()))
            })
            .collect()
    }

    fn read_tables(&self) -> Result<LedgerTables> {
        Ok(LedgerTables {
            balances: Self::read_table(&self.balances)?,
            ratios: Self::read_table(&self.ratios)?,
            affiliates: Self::read_table(&self.affiliates)?,
            callers: Self::read_table(&self.callers)?,
            settings: Self::read_table(&self.settings)?,
        })
    }
}

impl LedgerStore for SledStore {
    fn load_state(&self) -> Result<Option<LedgerState>> {
        self.read_tables()?.decode()
    }

    fn load_events_since(&self, offset: u64) -> Result<Vec<LedgerEvent>> {
        self.events
            .range(codec::event_key(offset)..)
            .map(|entry| {
                let (_, value) = entry?;
                codec::decode_event(&value)
            })
            .collect()
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.events.len() as u64)
    }

    fn commit(&self, state: &LedgerState, new_events: &[LedgerEvent]) -> Result<()> {
        let tables = LedgerTables::encode(state)?;
        let balances = TableWrite::diff(&self.balances, &tables.balances)?;
        let ratios = TableWrite::diff(&self.ratios, &tables.ratios)?;
        let affiliates = TableWrite::diff(&self.affiliates, &tables.affiliates)?;
        let callers = TableWrite::diff(&self.callers, &tables.callers)?;
        let settings = TableWrite::diff(&self.settings, &tables.settings)?;

        let first_sequence = self.event_count()?;
        let event_rows = new_events
            .iter()
            .zip(first_sequence..)
            .map(|(event, sequence)| Ok((codec::event_key(sequence), codec::encode_event(event)?)))
            .collect::<Result<Vec<_>>>()?;

        let result: TransactionResult<()> = (
            &self.balances,
            &self.ratios,
            &self.affiliates,
            &self.callers,
            &self.settings,
            &self.events,
        )
            .transaction(|(tx_balances, tx_ratios, tx_affiliates, tx_callers, tx_settings, tx_events)| {
                balances.apply(tx_balances)?;
                ratios.apply(tx_ratios)?;
                affiliates.apply(tx_affiliates)?;
                callers.apply(tx_callers)?;
                settings.apply(tx_settings)?;
                for (key, value) in &event_rows {
                    tx_events.insert(&key[..], value.as_slice())?;
                }
                Ok(())
            });

        result.map_err(|err| match err {
            TransactionError::Storage(err) => StorageError::Database(err),
            TransactionError::Abort(()) => StorageError::Aborted,
        })?;

        debug!(
            target: "storage",
            "Committed {} table writes and {} events",
            balances.len() + ratios.len() + affiliates.len() + callers.len() + settings.len(),
            event_rows.len()
        );
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ============================================================================
// In-memory testing backend
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    tables: LedgerTables,
    events: Vec<Vec<u8>>,
}

/// Keeps the encoded tables in memory, so it exercises the same codec as
/// the sled store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load_state(&self) -> Result<Option<LedgerState>> {
        self.inner.read().tables.decode()
    }

    fn load_events_since(&self, offset: u64) -> Result<Vec<LedgerEvent>> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.inner
            .read()
            .events
            .iter()
            .skip(offset)
            .map(|bytes| codec::decode_event(bytes))
            .collect()
    }

    fn event_count(&self) -> Result<u64> {
        Ok(self.inner.read().events.len() as u64)
    }

    fn commit(&self, state: &LedgerState, new_events: &[LedgerEvent]) -> Result<()> {
        let tables = LedgerTables::encode(state)?;
        let encoded = new_events
            .iter()
            .map(codec::encode_event)
            .collect::<Result<Vec<_>>>()?;

        let mut inner = self.inner.write();
        inner.tables = tables;
        inner.events.extend(encoded);
        Ok(())
    }
}

/// Load a store into memory, or seed it with `init` when it is empty.
///
/// Returns the state, its events and whether seeding happened.
pub fn load_or_init<S: LedgerStore + ?Sized>(
    store: &S,
    init: impl FnOnce() -> LedgerState,
) -> Result<(LedgerState, Vec<LedgerEvent>, bool)> {
    match store.load_state()? {
        Some(state) => {
            let events = store.load_events()?;
            debug!(target: "storage", "Loaded ledger with {} events", events.len());
            Ok((state, events, false))
        }
        None => {
            let state = init();
            store.commit(&state, &[])?;
            info!(target: "storage", "Initialized empty ledger");
            Ok((state, Vec::new(), true))
        }
    }
}
