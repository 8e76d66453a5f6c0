//! Referral links: referred account → referring account

use crate::errors::{LedgerError, Result};
use loyalty_types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateRegistry {
    links: BTreeMap<AccountId, AccountId>,
}

impl AffiliateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `referred` to `referrer`, replacing any existing link.
    /// Returns the previous referrer so callers see the overwrite.
    ///
    /// Only direct self-referral is refused. The bonus is paid one level
    /// deep, so longer cycles credit nothing twice.
    pub(crate) fn assign(
        &mut self,
        referred: AccountId,
        referrer: AccountId,
    ) -> Result<Option<AccountId>> {
        if referred == referrer {
            return Err(LedgerError::SelfReferral);
        }
        Ok(self.links.insert(referred, referrer))
    }

    pub fn referrer_of(&self, referred: &AccountId) -> Option<AccountId> {
        self.links.get(referred).copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &AccountId)> {
        self.links.iter()
    }
}

/// Rebuild from persisted links. Self-links are dropped.
impl FromIterator<(AccountId, AccountId)> for AffiliateRegistry {
    fn from_iter<I: IntoIterator<Item = (AccountId, AccountId)>>(iter: I) -> Self {
        Self {
            links: iter
                .into_iter()
                .filter(|(referred, referrer)| referred != referrer)
                .collect(),
        }
    }
}
