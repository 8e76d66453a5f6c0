//! Error types for the points ledger

use loyalty_types::{Amount, CurrencyId};
use thiserror::Error;

/// Rejections raised by ledger operations.
///
/// Every variant leaves ledger state exactly as it was before the call.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("accrual requires at least one player")]
    InvalidPlayerCount,

    #[error("owner access denied")]
    OwnerAccessDenied,

    #[error("worker access denied")]
    WorkerAccessDenied,

    /// Raised by the role guard only; `accrue` downgrades it to a no-op.
    #[error("caller is not declared")]
    UndeclaredCaller,

    #[error("distribution disabled")]
    DistributionDisabled,

    #[error("account cannot refer itself")]
    SelfReferral,

    #[error("invalid ledger parameter: {0}")]
    InvalidParameter(String),

    #[error("arithmetic overflow while computing {0}")]
    CalculationOverflow(&'static str),

    #[error("insufficient {currency} in treasury: available {available}, required {required}")]
    InsufficientFunds {
        currency: CurrencyId,
        available: Amount,
        required: Amount,
    },

    #[error("payout ledger error: {0}")]
    Payout(#[from] anyhow::Error),

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
