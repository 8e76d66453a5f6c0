//! Points balances and accrual arithmetic
//!
//! Accrual runs in two phases. [`plan_accrual`] computes every number with
//! checked arithmetic and touches nothing; [`PointsLedger::apply_accrual`]
//! verifies both credits fit before writing either. A failure in any step
//! therefore leaves balances untouched.

use crate::affiliate::AffiliateRegistry;
use crate::bonus::{BonusBreakdown, BonusConfig};
use crate::errors::{LedgerError, Result};
use loyalty_types::{mul_div_u128, percent_of, AccountId, Amount, CurrencyId, Points};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stake reported by a game module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualRequest {
    pub beneficiary: AccountId,
    pub currency: CurrencyId,
    pub amount: Amount,
    pub num_players: u32,
    pub num_wearables: u32,
}

impl AccrualRequest {
    /// Solo stake without wearables; use the builders to add context.
    pub fn new(beneficiary: AccountId, currency: CurrencyId, amount: Amount) -> Self {
        Self {
            beneficiary,
            currency,
            amount,
            num_players: 1,
            num_wearables: 0,
        }
    }

    pub fn with_players(mut self, num_players: u32) -> Self {
        self.num_players = num_players;
        self
    }

    pub fn with_wearables(mut self, num_wearables: u32) -> Self {
        self.num_wearables = num_wearables;
        self
    }
}

/// Why a well-formed accrual changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    UndeclaredCaller,
    CollectingDisabled,
    CurrencyDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateCredit {
    pub referrer: AccountId,
    pub points: Points,
}

/// Fully computed effect of one accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualReceipt {
    pub beneficiary: AccountId,
    pub currency: CurrencyId,
    pub amount: Amount,
    pub bonus: BonusBreakdown,
    pub bonused_amount: Amount,
    pub ratio: u128,
    pub points: Points,
    pub affiliate: Option<AffiliateCredit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccrualOutcome {
    Credited(AccrualReceipt),
    Skipped(SkipReason),
}

impl AccrualOutcome {
    pub fn is_credited(&self) -> bool {
        matches!(self, AccrualOutcome::Credited(_))
    }

    /// Points credited to the beneficiary (0 when skipped).
    pub fn points(&self) -> Points {
        match self {
            AccrualOutcome::Credited(receipt) => receipt.points,
            AccrualOutcome::Skipped(_) => 0,
        }
    }
}

/// Compute the credits for a request against a non-zero ratio.
pub fn plan_accrual(
    request: &AccrualRequest,
    ratio: u128,
    bonus: &BonusConfig,
    affiliates: &AffiliateRegistry,
) -> Result<AccrualReceipt> {
    let breakdown = bonus.breakdown(request.num_players, request.num_wearables);

    let bonused_amount = mul_div_u128(request.amount, breakdown.multiplier as u128, 100)
        .ok_or(LedgerError::CalculationOverflow("bonused amount"))?;

    let points = bonused_amount
        .checked_div(ratio)
        .ok_or_else(|| LedgerError::InvalidParameter("ratio must be non-zero".into()))?;

    let affiliate = match affiliates.referrer_of(&request.beneficiary) {
        Some(referrer) => Some(AffiliateCredit {
            referrer,
            points: percent_of(points, bonus.affiliate_bonus)
                .ok_or(LedgerError::CalculationOverflow("affiliate bonus"))?,
        }),
        None => None,
    };

    Ok(AccrualReceipt {
        beneficiary: request.beneficiary,
        currency: request.currency.clone(),
        amount: request.amount,
        bonus: breakdown,
        bonused_amount,
        ratio,
        points,
        affiliate,
    })
}

/// Per-account point balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsLedger {
    balances: BTreeMap<AccountId, Points>,
    total_outstanding: Points,
}

impl PointsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown accounts read as zero.
    pub fn balance_of(&self, account: &AccountId) -> Points {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Points credited and not yet redeemed, across all accounts.
    pub fn total_outstanding(&self) -> Points {
        self.total_outstanding
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Points)> {
        self.balances.iter()
    }

    /// Apply both credits of a receipt, or neither.
    pub(crate) fn apply_accrual(&mut self, receipt: &AccrualReceipt) -> Result<()> {
        let affiliate_points = receipt.affiliate.map(|a| a.points).unwrap_or(0);

        let beneficiary_after = self
            .balance_of(&receipt.beneficiary)
            .checked_add(receipt.points)
            .ok_or(LedgerError::CalculationOverflow("beneficiary balance"))?;

        let referrer_after = match receipt.affiliate {
            Some(credit) => Some((
                credit.referrer,
                self.balance_of(&credit.referrer)
                    .checked_add(credit.points)
                    .ok_or(LedgerError::CalculationOverflow("referrer balance"))?,
            )),
            None => None,
        };

        let total_after = self
            .total_outstanding
            .checked_add(receipt.points)
            .and_then(|t| t.checked_add(affiliate_points))
            .ok_or(LedgerError::CalculationOverflow("outstanding points"))?;

        self.balances.insert(receipt.beneficiary, beneficiary_after);
        if let Some((referrer, balance)) = referrer_after {
            self.balances.insert(referrer, balance);
        }
        self.total_outstanding = total_after;
        Ok(())
    }

    /// Apply several receipts in order, or none of them. On failure the
    /// balances touched so far are restored.
    pub(crate) fn apply_all(&mut self, receipts: &[&AccrualReceipt]) -> Result<()> {
        let total_before = self.total_outstanding;
        let mut touched: BTreeMap<AccountId, Option<Points>> = BTreeMap::new();

        for receipt in receipts {
            let accounts = std::iter::once(receipt.beneficiary)
                .chain(receipt.affiliate.map(|credit| credit.referrer));
            for account in accounts {
                let before = self.balances.get(&account).copied();
                touched.entry(account).or_insert(before);
            }

            if let Err(err) = self.apply_accrual(receipt) {
                for (account, before) in touched {
                    match before {
                        Some(balance) => self.balances.insert(account, balance),
                        None => self.balances.remove(&account),
                    };
                }
                self.total_outstanding = total_before;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Zero an account's balance, returning what it held.
    pub(crate) fn take_balance(&mut self, account: &AccountId) -> Points {
        let taken = match self.balances.get_mut(account) {
            Some(balance) => std::mem::take(balance),
            None => 0,
        };
        self.total_outstanding = self.total_outstanding.saturating_sub(taken);
        taken
    }
}

/// Rebuild from persisted balances; the outstanding total is recomputed.
impl FromIterator<(AccountId, Points)> for PointsLedger {
    fn from_iter<I: IntoIterator<Item = (AccountId, Points)>>(iter: I) -> Self {
        let balances: BTreeMap<AccountId, Points> = iter.into_iter().collect();
        let total_outstanding = balances
            .values()
            .fold(0u128, |total, balance| total.saturating_add(*balance));
        Self {
            balances,
            total_outstanding,
        }
    }
}
