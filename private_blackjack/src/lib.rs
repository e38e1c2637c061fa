//! # Private Blackjack
//!
//! A multiplayer blackjack engine built around a game state machine with
//! integrated betting, loans and payouts.
//!
//! ## Architecture
//!
//! A game moves through seven phases:
//!
//! - **Waiting**: Created, nobody seated
//! - **Betting**: Participants join with an opening bet
//! - **Dealing**: Two cards to each hand and the dealer
//! - **SpecialBets**: Double down, split and insurance, in turn order
//! - **Playing**: Hit or stand, in turn order
//! - **Dealer**: Dealer draws to 17
//! - **Complete**: Payouts settle exactly once
//!
//! ## Core Modules
//!
//! - [`game`]: Cards, scoring, the state machine, special bets and payouts
//! - [`wallet`]: Wallet ledger interface, backends and the loan fallback
//! - [`db`]: Game persistence
//! - [`table`]: The session registry and the service facade
//!
//! ## Example
//!
//! ```
//! use private_blackjack::{Game, GameRules, Phase, entities::SessionId};
//!
//! let game = Game::new(SessionId::from("room-1"), GameRules::default());
//! assert_eq!(game.phase(), Phase::Waiting);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    Game, GameError, GameEvent, GameRules, GameView, Phase, SpecialBet, UserError,
    constants::{self, LOAN_INCREMENT, MAX_PLAYERS},
    entities::{self, Card, Deck, Hand, HandId, ParticipantId, SessionId, Usd},
    functional,
};

/// Persistence for games and results.
pub mod db;

/// Session registry and service facade.
pub mod table;
pub use table::{TableConfig, TableService, TableUpdate};

/// Wallet ledger, locking and the loan fallback.
pub mod wallet;
