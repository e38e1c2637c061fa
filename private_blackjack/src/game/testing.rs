//! Helpers for stacking the shoe in unit tests.

use super::{
    entities::{Card, Deck, HandId, ParticipantId, SessionId, Usd},
    rules::GameRules,
    state_machine::Game,
};

pub(crate) fn pid(name: &str) -> ParticipantId {
    ParticipantId::new(name)
}

pub(crate) fn hid(name: &str, split_index: u8) -> HandId {
    HandId {
        participant: pid(name),
        split_index,
    }
}

/// `"AS 10H K♦"` in deal order.
pub(crate) fn cards(notation: &str) -> Vec<Card> {
    notation
        .split_whitespace()
        .map(|card| card.parse().unwrap())
        .collect()
}

/// A game in betting with `players` joined and a shoe that deals `deck`
/// front to back. The initial deal goes one card per player in join
/// order, then the dealer, twice.
pub(crate) fn stacked(players: &[(&str, Usd)], deck: &str) -> Game {
    let mut game = Game::with_deck(
        SessionId::from("test"),
        GameRules::default(),
        Deck::from_cards(cards(deck)),
    );
    for (name, bet) in players {
        game.add_participant(pid(name), *bet).unwrap();
    }
    game
}
