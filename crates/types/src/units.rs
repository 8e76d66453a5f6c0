//! Ledger units and integer helpers
//!
//! ## Units
//! - `Points`: loyalty points held on the points ledger
//! - `Amount`: smallest unit of an external currency
//! - `Percent`: whole percentage points (10 = 10%)
//!
//! NO floating point is used anywhere in bonus or conversion math.

use crate::address::AccountId;

/// Loyalty points balance.
pub type Points = u128;

/// Amount of an external currency in its smallest unit.
pub type Amount = u128;

/// Whole percentage points.
pub type Percent = u32;

/// Baseline multiplier: a stake is worth 100% of itself before bonuses.
pub const BASE_MULTIPLIER: Percent = 100;

/// Safe multiplication followed by division using u128 intermediate.
/// Returns None if the divisor is zero or the product overflows.
#[inline]
pub fn mul_div_u128(n: u128, mul: u128, div: u128) -> Option<u128> {
    if div == 0 {
        return None;
    }
    n.checked_mul(mul).map(|product| product / div)
}

/// `value * pct / 100`, truncating. None on overflow.
#[inline]
pub fn percent_of(value: u128, pct: Percent) -> Option<u128> {
    mul_div_u128(value, pct as u128, 100)
}

/// Derive the deterministic treasury account the engine pays redemptions
/// from: `BLAKE3("POINTS_TREASURY" || namespace)`.
///
/// No private key exists for it; funds leave only through redemption.
pub fn treasury_account_id(namespace: &str) -> AccountId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"POINTS_TREASURY");
    hasher.update(namespace.as_bytes());
    AccountId(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_truncates() {
        assert_eq!(mul_div_u128(15_000, 130, 100), Some(19_500));
        assert_eq!(mul_div_u128(7, 1, 2), Some(3));
    }

    #[test]
    fn mul_div_guards() {
        assert_eq!(mul_div_u128(1, 1, 0), None);
        assert_eq!(mul_div_u128(u128::MAX, 2, 1), None);
    }

    #[test]
    fn percent_of_values() {
        assert_eq!(percent_of(100, 10), Some(10));
        assert_eq!(percent_of(100, 30), Some(30));
        assert_eq!(percent_of(9, 10), Some(0));
    }

    #[test]
    fn treasury_account_is_namespaced() {
        assert_eq!(treasury_account_id("main"), treasury_account_id("main"));
        assert_ne!(treasury_account_id("main"), treasury_account_id("test"));
    }
}
