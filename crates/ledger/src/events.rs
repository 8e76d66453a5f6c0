//! Audit events emitted by ledger mutations

use loyalty_types::{AccountId, Amount, CurrencyId, Percent, Points};
use serde::{Deserialize, Serialize};

/// One state change, in the order it was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    PointsAccrued {
        caller: AccountId,
        beneficiary: AccountId,
        currency: CurrencyId,
        amount: Amount,
        multiplier: Percent,
        points: Points,
    },
    AffiliateCredited {
        referrer: AccountId,
        referred: AccountId,
        points: Points,
    },
    PointsRedeemed {
        account: AccountId,
        currency: CurrencyId,
        points: Points,
        payout: Amount,
    },
    CallerDeclared {
        caller: AccountId,
    },
    CallerUndeclared {
        caller: AccountId,
    },
    RatioSet {
        currency: CurrencyId,
        previous: u128,
        ratio: u128,
    },
    CollectingToggled {
        enabled: bool,
    },
    DistributionToggled {
        enabled: bool,
    },
    WorkerSet {
        previous: AccountId,
        worker: AccountId,
    },
    AffiliateAssigned {
        referred: AccountId,
        referrer: AccountId,
        previous: Option<AccountId>,
    },
    PlayerBonusUpdated {
        num_players: u32,
        previous: Percent,
        bonus: Percent,
    },
    WearableBonusUpdated {
        previous: Percent,
        bonus: Percent,
    },
    MaxCombinedBonusUpdated {
        max_combined_bonus: Percent,
    },
    AffiliateBonusUpdated {
        previous: Percent,
        bonus: Percent,
    },
    DistributionCurrencyChanged {
        previous: CurrencyId,
        currency: CurrencyId,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::PointsAccrued { .. } => "PointsAccrued",
            LedgerEvent::AffiliateCredited { .. } => "AffiliateCredited",
            LedgerEvent::PointsRedeemed { .. } => "PointsRedeemed",
            LedgerEvent::CallerDeclared { .. } => "CallerDeclared",
            LedgerEvent::CallerUndeclared { .. } => "CallerUndeclared",
            LedgerEvent::RatioSet { .. } => "RatioSet",
            LedgerEvent::CollectingToggled { .. } => "CollectingToggled",
            LedgerEvent::DistributionToggled { .. } => "DistributionToggled",
            LedgerEvent::WorkerSet { .. } => "WorkerSet",
            LedgerEvent::AffiliateAssigned { .. } => "AffiliateAssigned",
            LedgerEvent::PlayerBonusUpdated { .. } => "PlayerBonusUpdated",
            LedgerEvent::WearableBonusUpdated { .. } => "WearableBonusUpdated",
            LedgerEvent::MaxCombinedBonusUpdated { .. } => "MaxCombinedBonusUpdated",
            LedgerEvent::AffiliateBonusUpdated { .. } => "AffiliateBonusUpdated",
            LedgerEvent::DistributionCurrencyChanged { .. } => "DistributionCurrencyChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let event = LedgerEvent::CollectingToggled { enabled: false };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "CollectingToggled");
        assert_eq!(json["enabled"], false);
        assert_eq!(event.name(), "CollectingToggled");
    }

    #[test]
    fn account_fields_use_string_form() {
        let caller = AccountId::from_label("slots");
        let event = LedgerEvent::CallerDeclared { caller };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["caller"], caller.to_string());

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
