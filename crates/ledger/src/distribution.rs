//! Redemption of points into the distribution currency

use crate::currency_ledger::CurrencyLedger;
use crate::errors::{LedgerError, Result};
use crate::points::PointsLedger;
use crate::toggles::FeatureToggles;
use loyalty_types::{AccountId, Amount, CurrencyId, Points};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub account: AccountId,
    pub currency: CurrencyId,
    pub points: Points,
    pub payout: Amount,
}

/// Pays redemptions out of a treasury account on the currency ledger.
#[derive(Debug, Clone, Copy)]
pub struct DistributionGateway<'a> {
    treasury: &'a AccountId,
    currency: &'a CurrencyId,
}

impl<'a> DistributionGateway<'a> {
    pub fn new(treasury: &'a AccountId, currency: &'a CurrencyId) -> Self {
        Self { treasury, currency }
    }

    /// Zero `account`'s balance and transfer its payout.
    ///
    /// Every check and the transfer happen before the balance is touched,
    /// so any error leaves the points where they were.
    pub fn redeem(
        &self,
        toggles: &FeatureToggles,
        points: &mut PointsLedger,
        currency_ledger: &mut dyn CurrencyLedger,
        account: &AccountId,
    ) -> Result<RedemptionReceipt> {
        if !toggles.distribution_enabled {
            warn!(target: "ledger", "Redemption for {} refused: distribution disabled", account);
            return Err(LedgerError::DistributionDisabled);
        }

        let balance = points.balance_of(account);
        if balance == 0 {
            debug!(target: "ledger", "Redemption for {} skipped: empty balance", account);
            return Ok(self.receipt(account, 0, 0));
        }

        let payout = currency_ledger.quote_points(self.currency, balance)?;
        if payout == 0 {
            warn!(
                target: "ledger",
                "Redemption for {} refused: {} points quote to nothing in {}",
                account, balance, self.currency
            );
            return Err(LedgerError::InvalidParameter(format!(
                "{balance} points quote to zero {}",
                self.currency
            )));
        }
        let available = currency_ledger.balance_of(self.currency, self.treasury)?;
        if available < payout {
            warn!(
                target: "ledger",
                "Redemption for {} refused: treasury holds {} {}, needs {}",
                account, available, self.currency, payout
            );
            return Err(LedgerError::InsufficientFunds {
                currency: self.currency.clone(),
                available,
                required: payout,
            });
        }

        currency_ledger.transfer(self.currency, self.treasury, account, payout)?;
        let redeemed = points.take_balance(account);

        info!(
            target: "ledger",
            "Redeemed {} points for {} {} to {}",
            redeemed, payout, self.currency, account
        );
        Ok(self.receipt(account, redeemed, payout))
    }

    fn receipt(&self, account: &AccountId, points: Points, payout: Amount) -> RedemptionReceipt {
        RedemptionReceipt {
            account: *account,
            currency: self.currency.clone(),
            points,
            payout,
        }
    }
}
