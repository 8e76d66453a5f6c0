//! Points engine
//!
//! Owns every ledger table behind a single lock. Each mutating operation
//! holds the write guard from its first check to its last write, so
//! concurrent callers observe whole operations only.

use crate::access::{AccessControl, Role};
use crate::affiliate::AffiliateRegistry;
use crate::bonus::{BonusBreakdown, BonusConfig};
use crate::currency_ledger::CurrencyLedger;
use crate::distribution::{DistributionGateway, RedemptionReceipt};
use crate::errors::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::points::{
    plan_accrual, AccrualOutcome, AccrualReceipt, AccrualRequest, PointsLedger, SkipReason,
};
use crate::ratio::CurrencyRatioRegistry;
use crate::toggles::FeatureToggles;
use loyalty_types::{treasury_account_id, AccountId, CurrencyId, Percent, Points};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespace of the treasury account used when none is configured.
pub const DEFAULT_TREASURY_NAMESPACE: &str = "loyalty";

/// Everything that makes up the ledger, serialized as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub access: AccessControl,
    pub toggles: FeatureToggles,
    pub bonus: BonusConfig,
    pub affiliates: AffiliateRegistry,
    pub ratios: CurrencyRatioRegistry,
    pub points: PointsLedger,
    pub distribution_currency: CurrencyId,
}

impl LedgerState {
    pub fn new(owner: AccountId, distribution_currency: CurrencyId) -> Self {
        Self {
            access: AccessControl::new(owner),
            toggles: FeatureToggles::default(),
            bonus: BonusConfig::default(),
            affiliates: AffiliateRegistry::new(),
            ratios: CurrencyRatioRegistry::new(),
            points: PointsLedger::new(),
            distribution_currency,
        }
    }

    /// BLAKE3 of the canonical JSON encoding. All maps are ordered, so
    /// equal states always hash equal.
    pub fn state_hash(&self) -> Result<[u8; 32]> {
        let bytes = serde_json::to_vec(self)?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Summary of configuration for operator display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub owner: AccountId,
    pub worker: AccountId,
    pub treasury: AccountId,
    pub declared_callers: Vec<AccountId>,
    pub toggles: FeatureToggles,
    pub bonus: BonusConfig,
    pub ratios: Vec<(CurrencyId, u128)>,
    pub affiliate_links: usize,
    pub accounts: usize,
    pub total_outstanding: Points,
    pub distribution_currency: CurrencyId,
    pub state_hash: String,
}

struct EngineInner {
    state: LedgerState,
    /// Events not yet handed off, starting at sequence `event_base`.
    events: Vec<LedgerEvent>,
    event_base: usize,
}

impl EngineInner {
    fn authorize(&self, role: Role, caller: &AccountId) -> Result<()> {
        self.state.access.authorize(role, caller).map_err(|err| {
            warn!(target: "ledger", "{:?} operation refused for {}: {}", role, caller, err);
            err
        })
    }

    fn emit(&mut self, event: LedgerEvent) {
        debug!(target: "ledger", "Event {}", event.name());
        self.events.push(event);
    }

    /// Gate and price a request without writing anything.
    fn plan(&self, caller: &AccountId, request: &AccrualRequest) -> Result<AccrualOutcome> {
        let ratio = self.state.ratios.ratio_of(&request.currency);
        let skip = if !self.state.access.has_role(Role::DeclaredCaller, caller) {
            Some(SkipReason::UndeclaredCaller)
        } else if !self.state.toggles.collecting_enabled {
            Some(SkipReason::CollectingDisabled)
        } else if ratio == 0 {
            Some(SkipReason::CurrencyDisabled)
        } else {
            None
        };
        if let Some(reason) = skip {
            debug!(
                target: "ledger",
                "Accrual of {} {} for {} skipped: {:?}",
                request.amount, request.currency, request.beneficiary, reason
            );
            return Ok(AccrualOutcome::Skipped(reason));
        }

        let receipt = plan_accrual(request, ratio, &self.state.bonus, &self.state.affiliates)?;
        Ok(AccrualOutcome::Credited(receipt))
    }

    fn record_accrual(&mut self, caller: &AccountId, receipt: &AccrualReceipt) {
        info!(
            target: "ledger",
            "Accrued {} points to {} ({} {} at {}%)",
            receipt.points, receipt.beneficiary, receipt.amount, receipt.currency, receipt.bonus.multiplier
        );
        self.emit(LedgerEvent::PointsAccrued {
            caller: *caller,
            beneficiary: receipt.beneficiary,
            currency: receipt.currency.clone(),
            amount: receipt.amount,
            multiplier: receipt.bonus.multiplier,
            points: receipt.points,
        });
        if let Some(credit) = receipt.affiliate {
            info!(
                target: "ledger",
                "Affiliate {} credited {} points for {}",
                credit.referrer, credit.points, receipt.beneficiary
            );
            self.emit(LedgerEvent::AffiliateCredited {
                referrer: credit.referrer,
                referred: receipt.beneficiary,
                points: credit.points,
            });
        }
    }
}

fn check_player_count(caller: &AccountId, request: &AccrualRequest) -> Result<()> {
    if request.num_players == 0 {
        warn!(target: "ledger", "Accrual from {} rejected: zero players", caller);
        return Err(LedgerError::InvalidPlayerCount);
    }
    Ok(())
}

/// The ledger's transaction boundary.
pub struct PointsEngine {
    inner: RwLock<EngineInner>,
    currency_ledger: Mutex<Box<dyn CurrencyLedger>>,
    treasury: AccountId,
}

impl PointsEngine {
    /// Fresh ledger with default configuration.
    pub fn new(
        owner: AccountId,
        distribution_currency: CurrencyId,
        currency_ledger: Box<dyn CurrencyLedger>,
    ) -> Self {
        Self::from_parts(
            LedgerState::new(owner, distribution_currency),
            Vec::new(),
            currency_ledger,
        )
    }

    /// Resume from persisted state and its full event log.
    pub fn from_parts(
        state: LedgerState,
        events: Vec<LedgerEvent>,
        currency_ledger: Box<dyn CurrencyLedger>,
    ) -> Self {
        Self::with_inner(
            EngineInner {
                state,
                events,
                event_base: 0,
            },
            currency_ledger,
        )
    }

    /// Resume from persisted state without loading the log; new events are
    /// numbered from `persisted_events`.
    pub fn resume(
        state: LedgerState,
        persisted_events: usize,
        currency_ledger: Box<dyn CurrencyLedger>,
    ) -> Self {
        Self::with_inner(
            EngineInner {
                state,
                events: Vec::new(),
                event_base: persisted_events,
            },
            currency_ledger,
        )
    }

    fn with_inner(inner: EngineInner, currency_ledger: Box<dyn CurrencyLedger>) -> Self {
        Self {
            inner: RwLock::new(inner),
            currency_ledger: Mutex::new(currency_ledger),
            treasury: treasury_account_id(DEFAULT_TREASURY_NAMESPACE),
        }
    }

    /// Pay redemptions from a different treasury account.
    pub fn with_treasury(mut self, treasury: AccountId) -> Self {
        self.treasury = treasury;
        self
    }

    // ========================================================================
    // Accrual and redemption
    // ========================================================================

    /// Credit points for a reported stake.
    ///
    /// A zero player count is an error. An undeclared caller, disabled
    /// collecting or an unpriced currency return `Skipped` and change
    /// nothing.
    pub fn accrue(&self, caller: &AccountId, request: AccrualRequest) -> Result<AccrualOutcome> {
        check_player_count(caller, &request)?;

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let outcome = inner.plan(caller, &request)?;
        if let AccrualOutcome::Credited(receipt) = &outcome {
            inner.state.points.apply_accrual(receipt)?;
            inner.record_accrual(caller, receipt);
        }
        Ok(outcome)
    }

    /// Credit several stakes under one write guard. Either every credited
    /// outcome is applied or none is; skips behave as in [`Self::accrue`].
    pub fn accrue_all(
        &self,
        caller: &AccountId,
        requests: &[AccrualRequest],
    ) -> Result<Vec<AccrualOutcome>> {
        for request in requests {
            check_player_count(caller, request)?;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let outcomes = requests
            .iter()
            .map(|request| inner.plan(caller, request))
            .collect::<Result<Vec<_>>>()?;
        let receipts: Vec<&AccrualReceipt> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                AccrualOutcome::Credited(receipt) => Some(receipt),
                AccrualOutcome::Skipped(_) => None,
            })
            .collect();

        inner.state.points.apply_all(&receipts)?;
        for receipt in receipts {
            inner.record_accrual(caller, receipt);
        }
        Ok(outcomes)
    }

    /// Convert an account's whole balance into the distribution currency.
    pub fn redeem(&self, account: &AccountId) -> Result<RedemptionReceipt> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut currency_ledger = self.currency_ledger.lock();

        let gateway = DistributionGateway::new(&self.treasury, &inner.state.distribution_currency);
        let receipt = gateway.redeem(
            &inner.state.toggles,
            &mut inner.state.points,
            currency_ledger.as_mut(),
            account,
        )?;

        if receipt.points > 0 {
            inner.emit(LedgerEvent::PointsRedeemed {
                account: receipt.account,
                currency: receipt.currency.clone(),
                points: receipt.points,
                payout: receipt.payout,
            });
        }
        Ok(receipt)
    }

    // ========================================================================
    // Owner operations
    // ========================================================================

    /// Allow `module` to report accruals. Returns false if already declared.
    pub fn declare_caller(&self, caller: &AccountId, module: AccountId) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let added = inner.state.access.declare(module);
        if added {
            info!(target: "ledger", "Declared caller {}", module);
            inner.emit(LedgerEvent::CallerDeclared { caller: module });
        }
        Ok(added)
    }

    /// Revoke a declaration. Returns false if `module` was not declared.
    pub fn undeclare_caller(&self, caller: &AccountId, module: &AccountId) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let removed = inner.state.access.undeclare(module);
        if removed {
            info!(target: "ledger", "Undeclared caller {}", module);
            inner.emit(LedgerEvent::CallerUndeclared { caller: *module });
        }
        Ok(removed)
    }

    /// Units of `currency` per point. Zero disables the currency.
    pub fn set_ratio(&self, caller: &AccountId, currency: CurrencyId, ratio: u128) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = inner.state.ratios.set_ratio(currency.clone(), ratio);
        info!(target: "ledger", "Ratio for {} set to {} (was {})", currency, ratio, previous);
        inner.emit(LedgerEvent::RatioSet {
            currency,
            previous,
            ratio,
        });
        Ok(())
    }

    pub fn enable_collecting(&self, caller: &AccountId, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        inner.state.toggles.collecting_enabled = enabled;
        info!(target: "ledger", "Collecting enabled: {}", enabled);
        inner.emit(LedgerEvent::CollectingToggled { enabled });
        Ok(())
    }

    pub fn enable_distribution(&self, caller: &AccountId, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        inner.state.toggles.distribution_enabled = enabled;
        info!(target: "ledger", "Distribution enabled: {}", enabled);
        inner.emit(LedgerEvent::DistributionToggled { enabled });
        Ok(())
    }

    /// Hand the worker role to `worker`, revoking it from the previous one.
    pub fn set_worker(&self, caller: &AccountId, worker: AccountId) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = inner.state.access.set_worker(worker);
        info!(target: "ledger", "Worker changed from {} to {}", previous, worker);
        inner.emit(LedgerEvent::WorkerSet { previous, worker });
        Ok(())
    }

    pub fn change_player_bonus(
        &self,
        caller: &AccountId,
        num_players: u32,
        bonus: Percent,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = inner.state.bonus.set_player_bonus(num_players, bonus)?;
        info!(target: "ledger", "{}-player bonus set to {}%", num_players, bonus);
        inner.emit(LedgerEvent::PlayerBonusUpdated {
            num_players,
            previous,
            bonus,
        });
        Ok(())
    }

    pub fn change_wearable_bonus(&self, caller: &AccountId, bonus: Percent) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = inner.state.bonus.set_wearable_bonus(bonus)?;
        info!(target: "ledger", "Wearable bonus set to {}% per unit", bonus);
        inner.emit(LedgerEvent::WearableBonusUpdated { previous, bonus });
        Ok(())
    }

    /// `extra` is the bonus allowed above the 100 baseline.
    pub fn change_max_combined_bonus(&self, caller: &AccountId, extra: Percent) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let max_combined_bonus = inner.state.bonus.set_max_combined_bonus(extra)?;
        info!(target: "ledger", "Combined multiplier capped at {}%", max_combined_bonus);
        inner.emit(LedgerEvent::MaxCombinedBonusUpdated { max_combined_bonus });
        Ok(())
    }

    pub fn change_affiliate_bonus(&self, caller: &AccountId, bonus: Percent) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = inner.state.bonus.set_affiliate_bonus(bonus)?;
        info!(target: "ledger", "Affiliate bonus set to {}%", bonus);
        inner.emit(LedgerEvent::AffiliateBonusUpdated { previous, bonus });
        Ok(())
    }

    pub fn change_distribution_currency(
        &self,
        caller: &AccountId,
        currency: CurrencyId,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Owner, caller)?;

        let previous = std::mem::replace(&mut inner.state.distribution_currency, currency.clone());
        info!(target: "ledger", "Distribution currency changed from {} to {}", previous, currency);
        inner.emit(LedgerEvent::DistributionCurrencyChanged { previous, currency });
        Ok(())
    }

    // ========================================================================
    // Worker operations
    // ========================================================================

    /// Link `referred` to `referrer`. Returns the replaced referrer, if any.
    pub fn assign_affiliate(
        &self,
        caller: &AccountId,
        referred: AccountId,
        referrer: AccountId,
    ) -> Result<Option<AccountId>> {
        let mut inner = self.inner.write();
        inner.authorize(Role::Worker, caller)?;

        let previous = inner.state.affiliates.assign(referred, referrer).map_err(|err| {
            warn!(target: "ledger", "Affiliate assignment for {} refused: {}", referred, err);
            err
        })?;
        match previous {
            Some(old) => info!(target: "ledger", "Referrer of {} changed from {} to {}", referred, old, referrer),
            None => info!(target: "ledger", "Referrer of {} set to {}", referred, referrer),
        }
        inner.emit(LedgerEvent::AffiliateAssigned {
            referred,
            referrer,
            previous,
        });
        Ok(previous)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn balance_of(&self, account: &AccountId) -> Points {
        self.inner.read().state.points.balance_of(account)
    }

    pub fn ratio_of(&self, currency: &CurrencyId) -> u128 {
        self.inner.read().state.ratios.ratio_of(currency)
    }

    pub fn referrer_of(&self, referred: &AccountId) -> Option<AccountId> {
        self.inner.read().state.affiliates.referrer_of(referred)
    }

    pub fn is_declared_caller(&self, module: &AccountId) -> bool {
        self.inner
            .read()
            .state
            .access
            .has_role(Role::DeclaredCaller, module)
    }

    pub fn toggles(&self) -> FeatureToggles {
        self.inner.read().state.toggles
    }

    pub fn bonus_config(&self) -> BonusConfig {
        self.inner.read().state.bonus.clone()
    }

    /// Multiplier a stake would receive right now.
    pub fn preview_bonus(&self, num_players: u32, num_wearables: u32) -> BonusBreakdown {
        self.inner.read().state.bonus.breakdown(num_players, num_wearables)
    }

    pub fn owner(&self) -> AccountId {
        self.inner.read().state.access.owner()
    }

    pub fn worker(&self) -> AccountId {
        self.inner.read().state.access.worker()
    }

    pub fn distribution_currency(&self) -> CurrencyId {
        self.inner.read().state.distribution_currency.clone()
    }

    pub fn treasury(&self) -> AccountId {
        self.treasury
    }

    /// Consistent copy of the full ledger state.
    pub fn snapshot(&self) -> LedgerState {
        self.inner.read().state.clone()
    }

    pub fn state_hash(&self) -> Result<[u8; 32]> {
        self.inner.read().state.state_hash()
    }

    /// Events still held in memory.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.inner.read().events.clone()
    }

    /// Held events with sequence number `offset` or later.
    pub fn events_since(&self, offset: usize) -> Vec<LedgerEvent> {
        let inner = self.inner.read();
        let start = offset.saturating_sub(inner.event_base);
        inner
            .events
            .get(start..)
            .map(<[LedgerEvent]>::to_vec)
            .unwrap_or_default()
    }

    /// Hand off every held event, e.g. once they are persisted. The
    /// sequence numbering carries on from where it was.
    pub fn take_events(&self) -> Vec<LedgerEvent> {
        let mut inner = self.inner.write();
        let events = std::mem::take(&mut inner.events);
        inner.event_base += events.len();
        events
    }

    /// Total events emitted, including any already handed off.
    pub fn event_count(&self) -> usize {
        let inner = self.inner.read();
        inner.event_base + inner.events.len()
    }

    /// State and held events captured under one read guard.
    pub fn snapshot_with_events(&self) -> (LedgerState, Vec<LedgerEvent>) {
        let inner = self.inner.read();
        (inner.state.clone(), inner.events.clone())
    }

    pub fn status(&self) -> Result<EngineStatus> {
        let inner = self.inner.read();
        let state = &inner.state;
        Ok(EngineStatus {
            owner: state.access.owner(),
            worker: state.access.worker(),
            treasury: self.treasury,
            declared_callers: state.access.declared_callers().copied().collect(),
            toggles: state.toggles,
            bonus: state.bonus.clone(),
            ratios: state
                .ratios
                .iter()
                .map(|(currency, ratio)| (currency.clone(), *ratio))
                .collect(),
            affiliate_links: state.affiliates.len(),
            accounts: state.points.accounts().count(),
            total_outstanding: state.points.total_outstanding(),
            distribution_currency: state.distribution_currency.clone(),
            state_hash: hex::encode(state.state_hash()?),
        })
    }
}

// ============================================================================
// Game-facing sink
// ============================================================================

/// Where game modules report stakes.
pub trait PointsSink: Send + Sync {
    fn accrue(&self, caller: &AccountId, request: AccrualRequest) -> Result<AccrualOutcome>;

    /// All-or-nothing variant for stakes reported together.
    fn accrue_all(
        &self,
        caller: &AccountId,
        requests: &[AccrualRequest],
    ) -> Result<Vec<AccrualOutcome>>;
}

impl PointsSink for PointsEngine {
    fn accrue(&self, caller: &AccountId, request: AccrualRequest) -> Result<AccrualOutcome> {
        PointsEngine::accrue(self, caller, request)
    }

    fn accrue_all(
        &self,
        caller: &AccountId,
        requests: &[AccrualRequest],
    ) -> Result<Vec<AccrualOutcome>> {
        PointsEngine::accrue_all(self, caller, requests)
    }
}

impl<T: PointsSink + ?Sized> PointsSink for Arc<T> {
    fn accrue(&self, caller: &AccountId, request: AccrualRequest) -> Result<AccrualOutcome> {
        (**self).accrue(caller, request)
    }

    fn accrue_all(
        &self,
        caller: &AccountId,
        requests: &[AccrualRequest],
    ) -> Result<Vec<AccrualOutcome>> {
        (**self).accrue_all(caller, requests)
    }
}
