//! Pure hand-scoring functions.

use super::{
    constants::BLACKJACK_SCORE,
    entities::{Card, Hand},
};

/// Best score for a set of cards. Every ace starts at 11 and is knocked
/// down to 1, one at a time, while the total is over 21. Card order
/// doesn't matter.
#[must_use]
pub fn calculate_score(cards: &[Card]) -> u8 {
    let mut total: u32 = cards.iter().map(|c| u32::from(c.value())).sum();
    let mut aces = cards.iter().filter(|c| c.is_ace()).count();
    while total > u32::from(BLACKJACK_SCORE) && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    u8::try_from(total).unwrap_or(u8::MAX)
}

/// Whether at least one ace is still being counted as 11.
#[must_use]
pub fn is_soft(cards: &[Card]) -> bool {
    let hard: u32 = cards
        .iter()
        .map(|c| if c.is_ace() { 1 } else { u32::from(c.value()) })
        .sum();
    cards.iter().any(Card::is_ace) && u32::from(calculate_score(cards)) == hard + 10
}

#[must_use]
pub fn is_blackjack(hand: &Hand) -> bool {
    hand.cards.len() == 2 && calculate_score(&hand.cards) == BLACKJACK_SCORE
}

#[must_use]
pub fn is_bust(hand: &Hand) -> bool {
    calculate_score(&hand.cards) > BLACKJACK_SCORE
}

/// Exactly two cards of the same rank. A ten and a king don't pair.
#[must_use]
pub fn can_split(hand: &Hand) -> bool {
    matches!(hand.cards.as_slice(), [a, b] if a.rank == b.rank)
}

#[must_use]
pub fn can_double_down(hand: &Hand) -> bool {
    hand.cards.len() == 2 && !hand.is_doubled_down
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Rank, Suit};

    fn cards(ranks: &[Rank]) -> Vec<Card> {
        ranks
            .iter()
            .zip(Suit::ALL.iter().cycle())
            .map(|(rank, suit)| Card::new(*rank, *suit))
            .collect()
    }

    fn hand(ranks: &[Rank]) -> Hand {
        let mut hand = Hand::new(10);
        for card in cards(ranks) {
            hand.add_card(card);
        }
        hand
    }

    #[test]
    fn test_score_ace_king_is_21() {
        assert_eq!(calculate_score(&cards(&[Rank::Ace, Rank::King])), 21);
    }

    #[test]
    fn test_score_two_aces_and_nine_is_21() {
        assert_eq!(calculate_score(&cards(&[Rank::Ace, Rank::Ace, Rank::Nine])), 21);
    }

    #[test]
    fn test_score_three_aces_and_eight() {
        // 41 -> 31 -> 21, two aces downgraded and one still high.
        assert_eq!(
            calculate_score(&cards(&[Rank::Ace, Rank::Ace, Rank::Ace, Rank::Eight])),
            21
        );
    }

    #[test]
    fn test_score_all_aces_downgraded() {
        let ranks = [Rank::Ace, Rank::Ace, Rank::Ace, Rank::Nine, Rank::Nine];
        assert_eq!(calculate_score(&cards(&ranks)), 21);
        let ranks = [Rank::Ace, Rank::Ace, Rank::King, Rank::Queen];
        assert_eq!(calculate_score(&cards(&ranks)), 22);
    }

    #[test]
    fn test_score_empty_is_zero() {
        assert_eq!(calculate_score(&[]), 0);
    }

    #[test]
    fn test_score_is_order_independent() {
        let a = cards(&[Rank::Ace, Rank::Six, Rank::Nine]);
        let mut b = a.clone();
        b.reverse();
        assert_eq!(calculate_score(&a), calculate_score(&b));
        assert_eq!(calculate_score(&a), 16);
    }

    #[test]
    fn test_is_soft() {
        assert!(is_soft(&cards(&[Rank::Ace, Rank::Six])));
        assert!(!is_soft(&cards(&[Rank::Ace, Rank::Six, Rank::Nine])));
        assert!(!is_soft(&cards(&[Rank::Ten, Rank::Seven])));
    }

    #[test]
    fn test_blackjack_needs_two_cards() {
        assert!(is_blackjack(&hand(&[Rank::Ace, Rank::Queen])));
        assert!(!is_blackjack(&hand(&[Rank::Seven, Rank::Seven, Rank::Seven])));
    }

    #[test]
    fn test_bust() {
        assert!(is_bust(&hand(&[Rank::King, Rank::Queen, Rank::Five])));
        assert!(!is_bust(&hand(&[Rank::King, Rank::Ace])));
    }

    #[test]
    fn test_can_split_pairs_only() {
        let eights = [
            Card::new(Rank::Eight, Suit::Spade),
            Card::new(Rank::Eight, Suit::Heart),
        ];
        let mut pair = Hand::new(10);
        pair.cards = eights.to_vec();
        assert!(can_split(&pair));

        let mut mixed = Hand::new(10);
        mixed.cards = vec![
            Card::new(Rank::Eight, Suit::Spade),
            Card::new(Rank::Nine, Suit::Heart),
        ];
        assert!(!can_split(&mixed));

        pair.add_card(Card::new(Rank::Eight, Suit::Club));
        assert!(!can_split(&pair));

        assert!(!can_split(&hand(&[Rank::Ten, Rank::King])));
    }

    #[test]
    fn test_can_double_down() {
        let mut h = hand(&[Rank::Five, Rank::Six]);
        assert!(can_double_down(&h));
        h.is_doubled_down = true;
        assert!(!can_double_down(&h));
        assert!(!can_double_down(&hand(&[Rank::Two, Rank::Three, Rank::Four])));
    }
}
