//! Loyalty points ledger
//!
//! Accrues points for stakes reported by declared game modules, pays a
//! referral share to affiliates and redeems balances into an external
//! currency. [`PointsEngine`] is the entry point; the other modules hold
//! the individual tables it coordinates.

pub mod access;
pub mod affiliate;
pub mod bonus;
pub mod currency_ledger;
pub mod distribution;
pub mod engine;
pub mod errors;
pub mod events;
pub mod points;
pub mod ratio;
pub mod toggles;

pub use access::{AccessControl, Role};
pub use affiliate::AffiliateRegistry;
pub use bonus::{BonusBreakdown, BonusConfig, MAX_WEARABLE_UNITS};
pub use currency_ledger::{CurrencyLedger, InMemoryCurrencyLedger, MockCurrencyLedger};
pub use distribution::{DistributionGateway, RedemptionReceipt};
pub use engine::{EngineStatus, LedgerState, PointsEngine, PointsSink};
pub use errors::{LedgerError, Result};
pub use events::LedgerEvent;
pub use points::{AccrualOutcome, AccrualReceipt, AccrualRequest, AffiliateCredit, PointsLedger, SkipReason};
pub use ratio::CurrencyRatioRegistry;
pub use toggles::FeatureToggles;
