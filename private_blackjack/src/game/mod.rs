//! Blackjack game engine.
//!
//! This module provides:
//! - Cards, shoes and hands
//! - Hand scoring
//! - The game state machine and its phases
//! - Double down, split and insurance
//! - Payout resolution and settlement

pub mod constants;
pub mod entities;
pub mod errors;
pub mod functional;
pub mod payouts;
pub mod rules;
pub mod special_bets;
pub mod state_machine;
pub mod states;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{GameError, UserError};
pub use payouts::{GameRecord, HandOutcome, HandResult, Settlement};
pub use rules::{BlackjackRules, GameRules, HouseRules};
pub use special_bets::SpecialBet;
pub use state_machine::{Game, GameEvent, GameId, GameView, HandView};
pub use states::Phase;
