//! House rules the state machine delegates to.
//!
//! Rules are a closed set of variants dispatched through `enum_dispatch`,
//! so a new game type is a new variant rather than a new engine.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use super::{
    constants::{DEALER_STAND_SCORE, DEFAULT_NUM_DECKS},
    entities::{Hand, Rank, Usd},
    functional,
};

#[enum_dispatch]
pub trait HouseRules {
    /// Number of 52-card decks in a fresh shoe.
    fn num_decks(&self) -> usize;

    /// Whether the dealer takes another card.
    fn dealer_should_hit(&self, dealer: &Hand) -> bool;

    fn can_double_down(&self, hand: &Hand) -> bool;

    fn can_split(&self, hand: &Hand) -> bool;

    /// Insurance is only offered against a dealer ace.
    fn insurance_offered(&self, dealer: &Hand) -> bool;

    /// Total returned for a winning natural, stake included.
    fn blackjack_credit(&self, stake: Usd) -> Usd;

    /// Total returned for a winning insurance side bet, stake included.
    fn insurance_credit(&self, insurance_bet: Usd) -> Usd;
}

/// Standard multiplayer blackjack: dealer hits below 17 regardless of
/// softness, naturals pay 3:2, insurance pays 2:1.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BlackjackRules {
    pub num_decks: usize,
}

impl Default for BlackjackRules {
    fn default() -> Self {
        Self {
            num_decks: DEFAULT_NUM_DECKS,
        }
    }
}

impl HouseRules for BlackjackRules {
    fn num_decks(&self) -> usize {
        self.num_decks
    }

    fn dealer_should_hit(&self, dealer: &Hand) -> bool {
        functional::calculate_score(&dealer.cards) < DEALER_STAND_SCORE
    }

    fn can_double_down(&self, hand: &Hand) -> bool {
        functional::can_double_down(hand)
    }

    fn can_split(&self, hand: &Hand) -> bool {
        functional::can_split(hand)
    }

    fn insurance_offered(&self, dealer: &Hand) -> bool {
        dealer.up_card().is_some_and(|card| card.rank == Rank::Ace)
    }

    fn blackjack_credit(&self, stake: Usd) -> Usd {
        let credit = u64::from(stake) + u64::from(stake) * 3 / 2;
        Usd::try_from(credit).unwrap_or(Usd::MAX)
    }

    fn insurance_credit(&self, insurance_bet: Usd) -> Usd {
        insurance_bet.saturating_mul(3)
    }
}

#[enum_dispatch(HouseRules)]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameRules {
    Blackjack(BlackjackRules),
}

impl Default for GameRules {
    fn default() -> Self {
        BlackjackRules::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, Suit};

    fn dealer(ranks: &[Rank]) -> Hand {
        let mut hand = Hand::new(0);
        for rank in ranks {
            hand.add_card(Card::new(*rank, Suit::Heart));
        }
        hand
    }

    #[test]
    fn test_dealer_hits_below_17_only() {
        let rules = GameRules::default();
        assert!(rules.dealer_should_hit(&dealer(&[Rank::Ten, Rank::Six])));
        assert!(!rules.dealer_should_hit(&dealer(&[Rank::Ten, Rank::Seven])));
        // Soft 17 stands too.
        assert!(!rules.dealer_should_hit(&dealer(&[Rank::Ace, Rank::Six])));
    }

    #[test]
    fn test_blackjack_credit_rounds_down() {
        let rules = GameRules::default();
        assert_eq!(rules.blackjack_credit(100), 250);
        assert_eq!(rules.blackjack_credit(15), 37);
    }

    #[test]
    fn test_credits_saturate_instead_of_overflowing() {
        let rules = GameRules::default();
        assert_eq!(rules.blackjack_credit(1_000_000_000), 2_500_000_000);
        assert_eq!(rules.blackjack_credit(2_000_000_000), Usd::MAX);
        assert_eq!(rules.insurance_credit(Usd::MAX / 2), Usd::MAX);
    }

    #[test]
    fn test_insurance_offered_on_ace_up_card() {
        let rules = GameRules::default();
        assert!(rules.insurance_offered(&dealer(&[Rank::Ace, Rank::Nine])));
        assert!(!rules.insurance_offered(&dealer(&[Rank::Nine, Rank::Ace])));
        assert!(!rules.insurance_offered(&dealer(&[])));
        assert_eq!(rules.insurance_credit(25), 75);
    }

    #[test]
    fn test_rules_serialize_as_tagged_variant() {
        let json = serde_json::to_string(&GameRules::default()).unwrap();
        assert_eq!(json, r#"{"Blackjack":{"num_decks":2}}"#);
    }
}
