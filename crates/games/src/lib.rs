//! Stake reporting for the wagering games
//!
//! Games decide outcomes elsewhere. What lives here is the bookkeeping that
//! decides *when* a stake counts for points and reports it to a
//! [`PointsSink`](loyalty_ledger::PointsSink).

pub mod backgammon;
pub mod errors;
pub mod slots;

pub use backgammon::{game_id, Backgammon, BackgammonGame, GameId};
pub use errors::{GameError, Result};
pub use slots::{Slots, SlotsStats};
