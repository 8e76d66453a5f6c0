//! Shared identifiers, units and integer helpers for the loyalty points
//! workspace.

pub mod address;
pub mod currency;
pub mod units;

pub use address::*;
pub use currency::*;
pub use units::*;
