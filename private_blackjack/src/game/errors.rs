//! Errors raised by game operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    entities::Usd,
    special_bets::SpecialBet,
    states::Phase,
};
use crate::{db::RepositoryError, wallet::WalletError};

/// Invalid user actions. The game is left exactly as it was.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum UserError {
    #[error("not your turn")]
    OutOfTurnAction,
    #[error("that hand is already finished")]
    HandNotActive,
    #[error("can't do that during {actual}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("can't go from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("can't {0} this hand")]
    NotEligible(SpecialBet),
    #[error("already in the game")]
    ParticipantAlreadyJoined,
    #[error("not in the game")]
    UnknownParticipant,
    #[error("table is full")]
    CapacityReached,
    #[error("bet must be between ${min} and ${max}")]
    InvalidBet { min: Usd, max: Usd },
    #[error("need 1+ players")]
    NotEnoughPlayers,
    #[error("a game is already running here")]
    GameAlreadyActive,
    #[error("no game is running here")]
    NoActiveGame,
}

/// Everything a game operation can fail with.
#[derive(Debug, Error)]
pub enum GameError {
    /// Rejected user action
    #[error(transparent)]
    User(#[from] UserError),

    /// The shoe can't supply a card the action requires
    #[error("deck exhausted: needed {needed} card(s), {remaining} left")]
    DeckExhausted { needed: usize, remaining: usize },

    /// Wallet failure, including insufficient funds after the loan
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Persistence failure
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The game reached a state that should be impossible
    #[error("invalid game state: {0}")]
    InternalState(String),
}

impl GameError {
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Message safe to show to the participant who triggered the error
    pub fn client_message(&self) -> String {
        match self {
            Self::User(err) => err.to_string(),
            Self::DeckExhausted { .. } => "the shoe ran out of cards".to_string(),
            Self::Wallet(err) => err.client_message(),
            Self::Repository(_) | Self::InternalState(_) => "Internal server error".to_string(),
        }
    }
}

/// Builds an `InternalState` error, logging it first.
pub(crate) fn internal(msg: impl Into<String>) -> GameError {
    let msg = msg.into();
    log::error!("invalid game state: {msg}");
    GameError::InternalState(msg)
}
