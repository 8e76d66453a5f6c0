//! Backgammon stake bookkeeping
//!
//! Both players put up the same stake when a game starts. Either player may
//! offer to double; the stakes only double, and only count for points, once
//! the opponent calls. Dropping a game ends it without further accrual.

use crate::errors::{GameError, Result};
use loyalty_ledger::{AccrualRequest, PointsSink};
use loyalty_types::{AccountId, Amount, CurrencyId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub [u8; 32]);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({}…)", &hex::encode(&self.0[..4]))
    }
}

/// Game id for a pairing: `BLAKE3("BACKGAMMON" || player_one || player_two)`.
/// Seat order matters.
pub fn game_id(player_one: &AccountId, player_two: &AccountId) -> GameId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"BACKGAMMON");
    hasher.update(player_one.as_bytes());
    hasher.update(player_two.as_bytes());
    GameId(*hasher.finalize().as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgammonGame {
    pub id: GameId,
    pub players: [AccountId; 2],
    pub wearables: [u32; 2],
    pub currency: CurrencyId,
    /// Current stake of each player.
    pub stake: Amount,
    pub pending_raise: Option<AccountId>,
}

impl BackgammonGame {
    pub fn total_staked(&self) -> Amount {
        self.stake.saturating_mul(2)
    }

    fn seat_of(&self, player: &AccountId) -> Result<usize> {
        self.players
            .iter()
            .position(|p| p == player)
            .ok_or(GameError::NotAParticipant {
                game: self.id,
                player: *player,
            })
    }
}

pub struct Backgammon {
    module: AccountId,
    sink: Arc<dyn PointsSink>,
    games: RwLock<BTreeMap<GameId, BackgammonGame>>,
}

impl Backgammon {
    pub fn new(module: AccountId, sink: Arc<dyn PointsSink>) -> Self {
        Self {
            module,
            sink,
            games: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seat two players and report the opening stake for both.
    pub fn initialize_game(
        &self,
        stake: Amount,
        player_one: AccountId,
        player_two: AccountId,
        currency: CurrencyId,
        wearables_one: u32,
        wearables_two: u32,
    ) -> Result<GameId> {
        if stake == 0 {
            return Err(GameError::ZeroStake);
        }
        if player_one == player_two {
            return Err(GameError::IdenticalPlayers);
        }

        let id = game_id(&player_one, &player_two);
        let mut games = self.games.write();
        if games.contains_key(&id) {
            return Err(GameError::GameAlreadyActive(id));
        }

        let game = BackgammonGame {
            id,
            players: [player_one, player_two],
            wearables: [wearables_one, wearables_two],
            currency,
            stake,
            pending_raise: None,
        };
        self.report_both(&game, stake)?;

        info!(target: "games", "Backgammon {} started at {} per player", id, stake);
        games.insert(id, game);
        Ok(id)
    }

    /// Offer to double. Nothing is reported until the opponent calls.
    /// Returns the per-player stake that a call would lock in.
    pub fn raise_double(&self, id: &GameId, player: &AccountId) -> Result<Amount> {
        let mut games = self.games.write();
        let game = games.get_mut(id).ok_or(GameError::UnknownGame(*id))?;
        game.seat_of(player)?;
        if game.pending_raise.is_some() {
            return Err(GameError::RaisePending(*id));
        }
        let proposed = game.stake.checked_mul(2).ok_or(GameError::StakeOverflow)?;

        game.pending_raise = Some(*player);
        info!(target: "games", "Backgammon {}: {} raised to {}", id, player, proposed);
        Ok(proposed)
    }

    /// Accept the opponent's raise: stakes double and the increase is
    /// reported for both players. Returns the new total staked.
    pub fn call_double(&self, id: &GameId, player: &AccountId) -> Result<Amount> {
        let mut games = self.games.write();
        let game = games.get_mut(id).ok_or(GameError::UnknownGame(*id))?;
        game.seat_of(player)?;
        let raiser = game.pending_raise.ok_or(GameError::NoPendingRaise(*id))?;
        if raiser == *player {
            return Err(GameError::RaiserCannotCall(*player));
        }

        let increase = game.stake;
        let doubled = game.stake.checked_mul(2).ok_or(GameError::StakeOverflow)?;
        self.report_both(game, increase)?;

        game.stake = doubled;
        game.pending_raise = None;
        info!(
            target: "games",
            "Backgammon {}: {} called, {} staked in total",
            id,
            player,
            game.total_staked()
        );
        Ok(game.total_staked())
    }

    /// End the game without reporting anything further.
    pub fn drop_game(&self, id: &GameId, player: &AccountId) -> Result<BackgammonGame> {
        let mut games = self.games.write();
        let game = games.get(id).ok_or(GameError::UnknownGame(*id))?;
        game.seat_of(player)?;

        info!(target: "games", "Backgammon {}: {} dropped", id, player);
        games.remove(id).ok_or(GameError::UnknownGame(*id))
    }

    pub fn game(&self, id: &GameId) -> Option<BackgammonGame> {
        self.games.read().get(id).cloned()
    }

    pub fn active_games(&self) -> usize {
        self.games.read().len()
    }

    /// Both players are credited together or not at all.
    fn report_both(&self, game: &BackgammonGame, amount: Amount) -> Result<()> {
        let requests: Vec<_> = game
            .players
            .iter()
            .zip(game.wearables)
            .map(|(player, wearables)| {
                AccrualRequest::new(*player, game.currency.clone(), amount).with_wearables(wearables)
            })
            .collect();
        self.sink.accrue_all(&self.module, &requests)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_ledger::{MockCurrencyLedger, PointsEngine};

    fn players() -> (AccountId, AccountId) {
        (AccountId::from_label("one"), AccountId::from_label("two"))
    }

    fn table() -> Backgammon {
        let owner = AccountId::from_label("owner");
        let engine = PointsEngine::new(
            owner,
            CurrencyId::new("MANA").unwrap(),
            Box::new(MockCurrencyLedger::new()),
        );
        Backgammon::new(AccountId::from_label("backgammon"), Arc::new(engine))
    }

    fn started(table: &Backgammon) -> GameId {
        let (one, two) = players();
        table
            .initialize_game(100, one, two, CurrencyId::new("MANA").unwrap(), 0, 0)
            .unwrap()
    }

    #[test]
    fn game_id_depends_on_seat_order() {
        let (one, two) = players();
        assert_eq!(game_id(&one, &two), game_id(&one, &two));
        assert_ne!(game_id(&one, &two), game_id(&two, &one));
    }

    #[test]
    fn setup_validation() {
        let table = table();
        let (one, two) = players();
        let mana = CurrencyId::new("MANA").unwrap();

        assert!(matches!(
            table.initialize_game(0, one, two, mana.clone(), 0, 0),
            Err(GameError::ZeroStake)
        ));
        assert!(matches!(
            table.initialize_game(100, one, one, mana.clone(), 0, 0),
            Err(GameError::IdenticalPlayers)
        ));

        let id = started(&table);
        assert!(matches!(
            table.initialize_game(100, one, two, mana, 0, 0),
            Err(GameError::GameAlreadyActive(existing)) if existing == id
        ));
    }

    #[test]
    fn double_protocol() {
        let table = table();
        let (one, two) = players();
        let outsider = AccountId::from_label("outsider");
        let id = started(&table);

        assert!(matches!(
            table.call_double(&id, &two),
            Err(GameError::NoPendingRaise(_))
        ));
        assert!(matches!(
            table.raise_double(&id, &outsider),
            Err(GameError::NotAParticipant { .. })
        ));

        assert_eq!(table.raise_double(&id, &one).unwrap(), 200);
        assert!(matches!(
            table.raise_double(&id, &two),
            Err(GameError::RaisePending(_))
        ));
        assert!(matches!(
            table.call_double(&id, &one),
            Err(GameError::RaiserCannotCall(_))
        ));

        assert_eq!(table.call_double(&id, &two).unwrap(), 400);
        let game = table.game(&id).unwrap();
        assert_eq!(game.stake, 200);
        assert_eq!(game.pending_raise, None);
    }

    #[test]
    fn dropped_game_frees_the_pairing() {
        let table = table();
        let (one, two) = players();
        let id = started(&table);

        let dropped = table.drop_game(&id, &two).unwrap();
        assert_eq!(dropped.stake, 100);
        assert_eq!(table.active_games(), 0);
        assert!(matches!(
            table.drop_game(&id, &two),
            Err(GameError::UnknownGame(_))
        ));

        table
            .initialize_game(50, one, two, CurrencyId::new("MANA").unwrap(), 0, 0)
            .unwrap();
        assert_eq!(table.active_games(), 1);
    }
}
