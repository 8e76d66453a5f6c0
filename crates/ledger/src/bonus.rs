//! Bonus tables and the combined multiplier
//!
//! A stake is scaled by `min(100 + player%, max_combined_bonus) + wearable%`
//! before conversion to points. The ceiling applies to the player tier only
//! and never drops below the 100 baseline; wearables stack on top.

use crate::errors::{LedgerError, Result};
use loyalty_types::{Percent, BASE_MULTIPLIER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Smallest player count that earns a bonus.
pub const MIN_BONUS_PLAYERS: u32 = 2;

/// Player counts above this use this tier.
pub const MAX_BONUS_PLAYERS: u32 = 4;

/// Wearables beyond this count earn nothing extra.
pub const MAX_WEARABLE_UNITS: u32 = 4;

/// Upper bound accepted for any single configured percentage.
pub const MAX_BONUS_PERCENT: Percent = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusConfig {
    /// Player count (2..=4) → bonus percent
    pub player_bonuses: BTreeMap<u32, Percent>,
    /// Percent per wearable, up to MAX_WEARABLE_UNITS
    pub wearable_bonus_per_unit: Percent,
    /// Ceiling on `100 + player%`, before wearables are added
    pub max_combined_bonus: Percent,
    /// Share of a beneficiary's credited points paid to their referrer
    pub affiliate_bonus: Percent,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            player_bonuses: BTreeMap::from([(2, 10), (3, 20), (4, 30)]),
            wearable_bonus_per_unit: 10,
            max_combined_bonus: 130,
            affiliate_bonus: 10,
        }
    }
}

/// How a multiplier was assembled, kept on accrual events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusBreakdown {
    pub player_bonus: Percent,
    pub wearable_bonus: Percent,
    pub multiplier: Percent,
}

impl BonusConfig {
    /// Player bonus for a table size; solo play earns nothing.
    pub fn player_bonus(&self, num_players: u32) -> Percent {
        if num_players < MIN_BONUS_PLAYERS {
            return 0;
        }
        let tier = num_players.min(MAX_BONUS_PLAYERS);
        self.player_bonuses.get(&tier).copied().unwrap_or(0)
    }

    /// Wearable bonus: per-unit percent times min(count, 4).
    pub fn wearable_bonus(&self, num_wearables: u32) -> Percent {
        self.wearable_bonus_per_unit
            .saturating_mul(num_wearables.min(MAX_WEARABLE_UNITS))
    }

    pub fn breakdown(&self, num_players: u32, num_wearables: u32) -> BonusBreakdown {
        let player_bonus = self.player_bonus(num_players);
        let wearable_bonus = self.wearable_bonus(num_wearables);
        let ceiling = self.max_combined_bonus.max(BASE_MULTIPLIER);
        let player_tier = BASE_MULTIPLIER.saturating_add(player_bonus).min(ceiling);

        BonusBreakdown {
            player_bonus,
            wearable_bonus,
            multiplier: player_tier.saturating_add(wearable_bonus),
        }
    }

    /// Combined multiplier in percent (100 = no bonus).
    pub fn multiplier(&self, num_players: u32, num_wearables: u32) -> Percent {
        self.breakdown(num_players, num_wearables).multiplier
    }

    /// Returns the previous bonus for the tier.
    pub(crate) fn set_player_bonus(&mut self, num_players: u32, bonus: Percent) -> Result<Percent> {
        if !(MIN_BONUS_PLAYERS..=MAX_BONUS_PLAYERS).contains(&num_players) {
            return Err(LedgerError::InvalidParameter(format!(
                "player bonus tier must be between {MIN_BONUS_PLAYERS} and {MAX_BONUS_PLAYERS}, got {num_players}"
            )));
        }
        validate_percent("player bonus", bonus)?;
        Ok(self
            .player_bonuses
            .insert(num_players, bonus)
            .unwrap_or(0))
    }

    pub(crate) fn set_wearable_bonus(&mut self, bonus: Percent) -> Result<Percent> {
        validate_percent("wearable bonus", bonus)?;
        Ok(std::mem::replace(&mut self.wearable_bonus_per_unit, bonus))
    }

    /// `extra` is the bonus on top of the 100 baseline; the stored ceiling
    /// is `100 + extra`. Returns the new ceiling.
    pub(crate) fn set_max_combined_bonus(&mut self, extra: Percent) -> Result<Percent> {
        validate_percent("max combined bonus", extra)?;
        self.max_combined_bonus = BASE_MULTIPLIER + extra;
        Ok(self.max_combined_bonus)
    }

    pub(crate) fn set_affiliate_bonus(&mut self, bonus: Percent) -> Result<Percent> {
        validate_percent("affiliate bonus", bonus)?;
        Ok(std::mem::replace(&mut self.affiliate_bonus, bonus))
    }
}

fn validate_percent(name: &str, value: Percent) -> Result<()> {
    if value > MAX_BONUS_PERCENT {
        return Err(LedgerError::InvalidParameter(format!(
            "{name} must not exceed {MAX_BONUS_PERCENT}%, got {value}%"
        )));
    }
    Ok(())
}
