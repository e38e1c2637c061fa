use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

use super::{constants, functional};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Self; 4] = [Self::Club, Self::Spade, Self::Diamond, Self::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Self; 13] = [
        Self::Ace,
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
    ];

    /// Blackjack value with aces counted high. Scoring downgrades aces
    /// to 1 as needed.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Ace => 11,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Ace => "A",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    #[must_use]
    pub const fn value(&self) -> u8 {
        self.rank.value()
    }

    #[must_use]
    pub fn is_ace(&self) -> bool {
        self.rank == Rank::Ace
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = format!("{}{}", self.rank, self.suit);
        write!(f, "{repr:>3}")
    }
}

/// Parses short notation like `AS`, `10h` or `K♦`: rank then suit.
impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let suit_char = s.chars().last().ok_or_else(|| "empty card".to_string())?;
        let rank_str = &s[..s.len() - suit_char.len_utf8()];
        let suit = match suit_char.to_ascii_uppercase() {
            'C' | '♣' => Suit::Club,
            'S' | '♠' => Suit::Spade,
            'D' | '♦' => Suit::Diamond,
            'H' | '♥' => Suit::Heart,
            _ => return Err(format!("unknown suit in {s:?}")),
        };
        let rank = match rank_str.to_ascii_uppercase().as_str() {
            "A" => Rank::Ace,
            "2" => Rank::Two,
            "3" => Rank::Three,
            "4" => Rank::Four,
            "5" => Rank::Five,
            "6" => Rank::Six,
            "7" => Rank::Seven,
            "8" => Rank::Eight,
            "9" => Rank::Nine,
            "10" | "T" => Rank::Ten,
            "J" => Rank::Jack,
            "Q" => Rank::Queen,
            "K" => Rank::King,
            _ => return Err(format!("unknown rank in {s:?}")),
        };
        Ok(Self::new(rank, suit))
    }
}

/// A shoe of one or more standard decks. Cards are drawn from the front
/// and the pile only shrinks; a new shoe is built per game.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Builds `52 * num_decks` cards in suit/rank order, unshuffled.
    #[must_use]
    pub fn new(num_decks: usize) -> Self {
        let mut cards = Vec::with_capacity(52 * num_decks);
        for _ in 0..num_decks {
            for suit in Suit::ALL {
                for rank in Rank::ALL {
                    cards.push(Card::new(rank, suit));
                }
            }
        }
        Self { cards }
    }

    /// Builds a deck that deals `cards` in the given order. Used to stack
    /// the shoe for deterministic play.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    /// Fisher-Yates over the whole pile.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    /// Removes and returns up to `n` cards from the front. Asking for more
    /// than remain returns exactly what's left.
    pub fn draw(&mut self, n: usize) -> Vec<Card> {
        let n = n.min(self.cards.len());
        self.cards.drain(..n).collect()
    }

    /// Returns `None` once the deck is empty.
    pub fn draw_one(&mut self) -> Option<Card> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Type alias for whole currency units. Bets, stakes and payouts are all
/// whole units; 3:2 payouts round down.
pub type Usd = u32;

/// Identity of a participant as handed to us by the presentation layer.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(s: &str) -> Self {
        let id: String = s
            .trim()
            .chars()
            .map(|c| if c.is_ascii_whitespace() || c == '#' { '_' } else { c })
            .take(constants::MAX_USER_INPUT_LENGTH)
            .collect();
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity of the session (chat channel) a game is bound to.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A slot in the turn order. Index 0 is the participant's own hand;
/// split sub-hands get increasing indices.
///
/// Serialized as `name` or `name#N` so it can key JSON maps.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct HandId {
    pub participant: ParticipantId,
    pub split_index: u8,
}

impl HandId {
    #[must_use]
    pub fn primary(participant: ParticipantId) -> Self {
        Self {
            participant,
            split_index: 0,
        }
    }

    #[must_use]
    pub fn is_split_hand(&self) -> bool {
        self.split_index > 0
    }
}

impl fmt::Display for HandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.split_index == 0 {
            write!(f, "{}", self.participant)
        } else {
            write!(f, "{}#{}", self.participant, self.split_index)
        }
    }
}

impl FromStr for HandId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('#') {
            Some((name, idx)) => {
                let split_index = idx
                    .parse()
                    .map_err(|_| format!("invalid split index in hand id {s:?}"))?;
                Ok(Self {
                    participant: ParticipantId::new(name),
                    split_index,
                })
            }
            None => Ok(Self::primary(ParticipantId::new(s))),
        }
    }
}

impl From<HandId> for String {
    fn from(value: HandId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for HandId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HandStatus {
    Active,
    Stood,
    Bust,
}

impl HandStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for HandStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Active => "active",
            Self::Stood => "stood",
            Self::Bust => "bust",
        };
        write!(f, "{repr:6}")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Hand {
    pub cards: Vec<Card>,
    pub status: HandStatus,
    /// Always equal to `calculate_score(&cards)`; refreshed by `add_card`
    /// and `rescore`.
    pub score: u8,
    pub bet: Usd,
    pub is_doubled_down: bool,
    pub double_down_bet: Option<Usd>,
    pub is_split: bool,
    pub split_sibling_id: Option<HandId>,
    pub parent_hand_id: Option<HandId>,
    pub has_insurance: bool,
    pub insurance_bet: Option<Usd>,
}

impl Hand {
    #[must_use]
    pub fn new(bet: Usd) -> Self {
        Self {
            cards: Vec::with_capacity(4),
            status: HandStatus::Active,
            score: 0,
            bet,
            is_doubled_down: false,
            double_down_bet: None,
            is_split: false,
            split_sibling_id: None,
            parent_hand_id: None,
            has_insurance: false,
            insurance_bet: None,
        }
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
        self.rescore();
    }

    pub fn rescore(&mut self) {
        self.score = functional::calculate_score(&self.cards);
    }

    /// Main-bet stake including any double down. Insurance is a separate
    /// side bet.
    #[must_use]
    pub fn stake(&self) -> Usd {
        self.bet.saturating_add(self.double_down_bet.unwrap_or(0))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn is_blackjack(&self) -> bool {
        functional::is_blackjack(self)
    }

    #[must_use]
    pub fn is_bust(&self) -> bool {
        functional::is_bust(self)
    }

    /// The dealer's face-up card is the first one dealt.
    #[must_use]
    pub fn up_card(&self) -> Option<Card> {
        self.cards.first().copied()
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for card in &self.cards {
            write!(f, "{card} ")?;
        }
        write!(f, "({})", self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    #[test]
    fn test_new_deck_has_52_per_deck() {
        for n in 1..=6 {
            assert_eq!(Deck::new(n).remaining(), 52 * n);
        }
    }

    #[test]
    fn test_new_deck_has_one_of_each_card_per_sub_deck() {
        let deck = Deck::new(3);
        let mut counts: HashMap<Card, usize> = HashMap::new();
        for card in deck.cards() {
            *counts.entry(*card).or_default() += 1;
        }
        assert_eq!(counts.len(), 52);
        assert!(counts.values().all(|&count| count == 3));
    }

    #[test]
    fn test_new_deck_is_deterministic() {
        assert_eq!(Deck::new(1).cards(), Deck::new(1).cards());
        assert_eq!(Deck::new(1).cards()[0], card(Rank::Ace, Suit::Club));
    }

    #[test]
    fn test_draw_returns_front_cards_in_order() {
        let mut deck = Deck::new(1);
        let drawn = deck.draw(3);
        assert_eq!(
            drawn,
            vec![
                card(Rank::Ace, Suit::Club),
                card(Rank::Two, Suit::Club),
                card(Rank::Three, Suit::Club)
            ]
        );
        assert_eq!(deck.remaining(), 49);
    }

    #[test]
    fn test_draw_more_than_remaining_returns_rest() {
        let mut deck = Deck::from_cards(vec![
            card(Rank::Five, Suit::Heart),
            card(Rank::Six, Suit::Heart),
        ]);
        let drawn = deck.draw(5);
        assert_eq!(drawn.len(), 2);
        assert!(deck.is_empty());
        assert!(deck.draw(1).is_empty());
    }

    #[test]
    fn test_draw_one_on_empty_deck_is_none() {
        let mut deck = Deck::from_cards(vec![card(Rank::King, Suit::Spade)]);
        assert_eq!(deck.draw_one(), Some(card(Rank::King, Suit::Spade)));
        assert_eq!(deck.draw_one(), None);
    }

    #[test]
    fn test_hand_id_display_and_parse() {
        let primary = HandId::primary(ParticipantId::new("alice"));
        assert_eq!(primary.to_string(), "alice");
        let split = HandId {
            participant: ParticipantId::new("alice"),
            split_index: 2,
        };
        assert_eq!(split.to_string(), "alice#2");
        assert_eq!("alice#2".parse::<HandId>().unwrap(), split);
        assert_eq!("alice".parse::<HandId>().unwrap(), primary);
        assert!("alice#x".parse::<HandId>().is_err());
    }

    #[test]
    fn test_hand_id_keys_json_maps() {
        let mut bets = HashMap::new();
        bets.insert(
            HandId {
                participant: ParticipantId::new("bob"),
                split_index: 1,
            },
            50u32,
        );
        let json = serde_json::to_string(&bets).unwrap();
        assert_eq!(json, r#"{"bob#1":50}"#);
        let back: HashMap<HandId, Usd> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bets);
    }

    #[test]
    fn test_participant_id_sanitizes_separator() {
        assert_eq!(ParticipantId::new(" a b#c ").as_str(), "a_b_c");
        let long = "x".repeat(100);
        assert_eq!(
            ParticipantId::new(&long).as_str().len(),
            constants::MAX_USER_INPUT_LENGTH
        );
    }

    #[test]
    fn test_participant_id_truncates_on_char_boundary() {
        let name = format!("{}é", "a".repeat(31));
        assert_eq!(ParticipantId::new(&name).as_str(), name);

        let accented = "é".repeat(40);
        let id = ParticipantId::new(&accented);
        assert_eq!(id.as_str().chars().count(), constants::MAX_USER_INPUT_LENGTH);
        assert!(id.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_hand_add_card_rescores() {
        let mut hand = Hand::new(25);
        hand.add_card(card(Rank::Ace, Suit::Spade));
        assert_eq!(hand.score, 11);
        hand.add_card(card(Rank::King, Suit::Heart));
        assert_eq!(hand.score, 21);
        assert!(hand.is_blackjack());
        assert_eq!(hand.stake(), 25);
    }

    #[test]
    fn test_card_parse() {
        assert_eq!("AS".parse::<Card>(), Ok(card(Rank::Ace, Suit::Spade)));
        assert_eq!("10h".parse::<Card>(), Ok(card(Rank::Ten, Suit::Heart)));
        assert_eq!("K♦".parse::<Card>(), Ok(card(Rank::King, Suit::Diamond)));
        assert!("1S".parse::<Card>().is_err());
        assert!("QX".parse::<Card>().is_err());
        assert!("".parse::<Card>().is_err());
    }

    #[test]
    fn test_card_display() {
        assert_eq!(card(Rank::Ten, Suit::Diamond).to_string(), "10♦");
        assert_eq!(card(Rank::Queen, Suit::Club).to_string(), " Q♣");
    }
}
