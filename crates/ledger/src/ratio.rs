//! Per-currency conversion ratios

use loyalty_types::CurrencyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency → currency units per ledger point.
///
/// An unset currency reads as ratio 0, which disables accrual for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRatioRegistry {
    ratios: BTreeMap<CurrencyId, u128>,
}

impl CurrencyRatioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ratio_of(&self, currency: &CurrencyId) -> u128 {
        self.ratios.get(currency).copied().unwrap_or(0)
    }

    /// Setting 0 removes the entry. Returns the previous ratio.
    pub(crate) fn set_ratio(&mut self, currency: CurrencyId, ratio: u128) -> u128 {
        let previous = if ratio == 0 {
            self.ratios.remove(&currency)
        } else {
            self.ratios.insert(currency, ratio)
        };
        previous.unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyId, &u128)> {
        self.ratios.iter()
    }
}

impl FromIterator<(CurrencyId, u128)> for CurrencyRatioRegistry {
    fn from_iter<I: IntoIterator<Item = (CurrencyId, u128)>>(iter: I) -> Self {
        Self {
            ratios: iter.into_iter().filter(|(_, ratio)| *ratio != 0).collect(),
        }
    }
}
