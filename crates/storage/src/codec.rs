//! Key-value encoding of the ledger state
//!
//! | table        | key                   | value                    |
//! |--------------|-----------------------|--------------------------|
//! | `balances`   | account (32 bytes)    | points (u128 BE)         |
//! | `ratios`     | currency ticker       | ratio (u128 BE)          |
//! | `affiliates` | referred (32 bytes)   | referrer (32 bytes)      |
//! | `callers`    | account (32 bytes)    | empty                    |
//! | `settings`   | setting name          | account bytes or JSON    |
//! | `events`     | sequence (u64 BE)     | JSON event               |

use crate::{Result, StorageError};
use loyalty_ledger::{
    AccessControl, AffiliateRegistry, BonusConfig, CurrencyRatioRegistry, FeatureToggles,
    LedgerEvent, LedgerState, PointsLedger,
};
use loyalty_types::{AccountId, CurrencyId, ACCOUNT_BYTES};
use std::collections::BTreeMap;

pub const BALANCES: &str = "balances";
pub const RATIOS: &str = "ratios";
pub const AFFILIATES: &str = "affiliates";
pub const CALLERS: &str = "callers";
pub const SETTINGS: &str = "settings";
pub const EVENTS: &str = "events";

const OWNER_KEY: &[u8] = b"owner";
const WORKER_KEY: &[u8] = b"worker";
const TOGGLES_KEY: &[u8] = b"toggles";
const BONUS_KEY: &[u8] = b"bonus";
const DISTRIBUTION_CURRENCY_KEY: &[u8] = b"distribution_currency";

pub type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// The ledger state split into its persisted tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTables {
    pub balances: Table,
    pub ratios: Table,
    pub affiliates: Table,
    pub callers: Table,
    pub settings: Table,
}

impl LedgerTables {
    pub fn encode(state: &LedgerState) -> Result<Self> {
        let balances = state
            .points
            .accounts()
            .map(|(account, points)| (account.as_bytes().to_vec(), points.to_be_bytes().to_vec()))
            .collect();

        let ratios = state
            .ratios
            .iter()
            .map(|(currency, ratio)| (currency.as_str().as_bytes().to_vec(), ratio.to_be_bytes().to_vec()))
            .collect();

        let affiliates = state
            .affiliates
            .iter()
            .map(|(referred, referrer)| (referred.as_bytes().to_vec(), referrer.as_bytes().to_vec()))
            .collect();

        let callers = state
            .access
            .declared_callers()
            .map(|caller| (caller.as_bytes().to_vec(), Vec::new()))
            .collect();

        let mut settings = Table::new();
        settings.insert(OWNER_KEY.to_vec(), state.access.owner().as_bytes().to_vec());
        settings.insert(WORKER_KEY.to_vec(), state.access.worker().as_bytes().to_vec());
        settings.insert(TOGGLES_KEY.to_vec(), serde_json::to_vec(&state.toggles)?);
        settings.insert(BONUS_KEY.to_vec(), serde_json::to_vec(&state.bonus)?);
        settings.insert(
            DISTRIBUTION_CURRENCY_KEY.to_vec(),
            state.distribution_currency.as_str().as_bytes().to_vec(),
        );

        Ok(Self {
            balances,
            ratios,
            affiliates,
            callers,
            settings,
        })
    }

    /// `None` when no ledger has been initialised in these tables.
    pub fn decode(&self) -> Result<Option<LedgerState>> {
        let Some(owner) = self.settings.get(OWNER_KEY) else {
            return Ok(None);
        };
        let owner = decode_account(SETTINGS, owner)?;
        let worker = decode_account(SETTINGS, self.setting(WORKER_KEY)?)?;

        let toggles: FeatureToggles = serde_json::from_slice(self.setting(TOGGLES_KEY)?)?;
        let bonus: BonusConfig = serde_json::from_slice(self.setting(BONUS_KEY)?)?;
        let distribution_currency =
            decode_currency(SETTINGS, self.setting(DISTRIBUTION_CURRENCY_KEY)?)?;

        let callers = self
            .callers
            .keys()
            .map(|key| decode_account(CALLERS, key))
            .collect::<Result<Vec<_>>>()?;

        let points = self
            .balances
            .iter()
            .map(|(key, value)| Ok((decode_account(BALANCES, key)?, decode_u128(BALANCES, value)?)))
            .collect::<Result<PointsLedger>>()?;

        let ratios = self
            .ratios
            .iter()
            .map(|(key, value)| Ok((decode_currency(RATIOS, key)?, decode_u128(RATIOS, value)?)))
            .collect::<Result<CurrencyRatioRegistry>>()?;

        let affiliates = self
            .affiliates
            .iter()
            .map(|(key, value)| Ok((decode_account(AFFILIATES, key)?, decode_account(AFFILIATES, value)?)))
            .collect::<Result<AffiliateRegistry>>()?;

        Ok(Some(LedgerState {
            access: AccessControl::restore(owner, worker, callers),
            toggles,
            bonus,
            affiliates,
            ratios,
            points,
            distribution_currency,
        }))
    }

    fn setting(&self, key: &'static [u8]) -> Result<&[u8]> {
        self.settings
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| StorageError::MissingSetting(String::from_utf8_lossy(key).into_owned()))
    }
}

pub fn event_key(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

pub fn encode_event(event: &LedgerEvent) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(event)?)
}

pub fn decode_event(bytes: &[u8]) -> Result<LedgerEvent> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_account(table: &'static str, bytes: &[u8]) -> Result<AccountId> {
    <[u8; ACCOUNT_BYTES]>::try_from(bytes)
        .map(AccountId)
        .map_err(|_| StorageError::Codec {
            table,
            reason: format!("account must be {ACCOUNT_BYTES} bytes, got {}", bytes.len()),
        })
}

fn decode_u128(table: &'static str, bytes: &[u8]) -> Result<u128> {
    <[u8; 16]>::try_from(bytes)
        .map(u128::from_be_bytes)
        .map_err(|_| StorageError::Codec {
            table,
            reason: format!("integer must be 16 bytes, got {}", bytes.len()),
        })
}

fn decode_currency(table: &'static str, bytes: &[u8]) -> Result<CurrencyId> {
    let ticker = std::str::from_utf8(bytes).map_err(|err| StorageError::Codec {
        table,
        reason: err.to_string(),
    })?;
    CurrencyId::new(ticker).map_err(|err| StorageError::Codec {
        table,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_state() -> LedgerState {
        let owner = AccountId::from_label("owner");
        let mana = CurrencyId::new("MANA").unwrap();
        let mut state = LedgerState::new(owner, mana.clone());
        state.access = AccessControl::restore(
            owner,
            AccountId::from_label("worker"),
            [AccountId::from_label("slots")],
        );
        state.ratios = [(mana, 150)].into_iter().collect();
        state.affiliates = [(AccountId::from_label("player"), AccountId::from_label("referrer"))]
            .into_iter()
            .collect();
        state.points = [
            (AccountId::from_label("player"), 100),
            (AccountId::from_label("referrer"), 10),
        ]
        .into_iter()
        .collect();
        state.toggles.distribution_enabled = true;
        state.bonus.max_combined_bonus = 150;
        state
    }

    #[test]
    fn tables_rebuild_the_same_state() {
        let state = populated_state();
        let tables = LedgerTables::encode(&state).unwrap();
        let decoded = tables.decode().unwrap().unwrap();

        assert_eq!(decoded, state);
        assert_eq!(decoded.points.total_outstanding(), 110);
        assert_eq!(decoded.state_hash().unwrap(), state.state_hash().unwrap());
    }

    #[test]
    fn empty_tables_are_uninitialised() {
        assert_eq!(LedgerTables::default().decode().unwrap(), None);
    }

    #[test]
    fn missing_setting_is_reported() {
        let mut tables = LedgerTables::encode(&populated_state()).unwrap();
        tables.settings.remove(BONUS_KEY);
        assert!(matches!(
            tables.decode(),
            Err(StorageError::MissingSetting(name)) if name == "bonus"
        ));
    }

    #[test]
    fn malformed_balance_is_a_codec_error() {
        let mut tables = LedgerTables::encode(&populated_state()).unwrap();
        tables.balances.insert(vec![1, 2, 3], vec![0; 16]);
        assert!(matches!(
            tables.decode(),
            Err(StorageError::Codec { table: BALANCES, .. })
        ));
    }
}
