use crate::errors::{GameError, Result};
use loyalty_ledger::{AccrualOutcome, AccrualRequest, PointsSink};
use loyalty_types::{AccountId, Amount, CurrencyId, Points};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsStats {
    pub plays: u64,
    pub total_wagered: Amount,
    pub points_awarded: Points,
}

/// Reel game. Every spin is a solo stake.
pub struct Slots {
    module: AccountId,
    sink: Arc<dyn PointsSink>,
    stats: RwLock<SlotsStats>,
}

impl Slots {
    /// `module` is the identity this game was declared under.
    pub fn new(module: AccountId, sink: Arc<dyn PointsSink>) -> Self {
        Self {
            module,
            sink,
            stats: RwLock::new(SlotsStats::default()),
        }
    }

    pub fn module(&self) -> AccountId {
        self.module
    }

    /// Report one spin.
    pub fn play(
        &self,
        player: AccountId,
        bet: Amount,
        currency: CurrencyId,
        wearables: u32,
    ) -> Result<AccrualOutcome> {
        if bet == 0 {
            return Err(GameError::ZeroStake);
        }

        let request = AccrualRequest::new(player, currency, bet).with_wearables(wearables);
        let outcome = self.sink.accrue(&self.module, request)?;

        let mut stats = self.stats.write();
        stats.plays += 1;
        stats.total_wagered = stats.total_wagered.saturating_add(bet);
        stats.points_awarded = stats.points_awarded.saturating_add(outcome.points());

        debug!(target: "games", "Slots: {} bet {}, {} points", player, bet, outcome.points());
        Ok(outcome)
    }

    pub fn stats(&self) -> SlotsStats {
        *self.stats.read()
    }
}
