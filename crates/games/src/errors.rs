use crate::backgammon::GameId;
use loyalty_ledger::LedgerError;
use loyalty_types::AccountId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("unknown game {0}")]
    UnknownGame(GameId),

    #[error("game {0} is already active")]
    GameAlreadyActive(GameId),

    #[error("{player} is not playing game {game}")]
    NotAParticipant { game: GameId, player: AccountId },

    #[error("a raise is already pending in game {0}")]
    RaisePending(GameId),

    #[error("no raise pending in game {0}")]
    NoPendingRaise(GameId),

    #[error("{0} cannot call their own raise")]
    RaiserCannotCall(AccountId),

    #[error("a game needs two distinct players")]
    IdenticalPlayers,

    #[error("stake must be greater than zero")]
    ZeroStake,

    #[error("doubled stake overflows")]
    StakeOverflow,

    #[error("ledger rejected stake report: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, GameError>;
