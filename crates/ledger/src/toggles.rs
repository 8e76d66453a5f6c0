//! Collecting and distribution switches

use serde::{Deserialize, Serialize};

/// Process-wide feature switches.
///
/// Collecting starts enabled so a freshly declared caller accrues
/// immediately; distribution starts disabled until the owner opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub collecting_enabled: bool,
    pub distribution_enabled: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            collecting_enabled: true,
            distribution_enabled: false,
        }
    }
}
