//! Blackjack game state machine.
//!
//! A [`Game`] owns the shoe, every player hand, the dealer hand and the turn
//! order. All public mutations are transactional: they run against a draft
//! copy of the game and only replace the real one when they succeed, so a
//! rejected action never leaves a half-applied change behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    fmt, iter,
};
use uuid::Uuid;

use super::{
    constants::MAX_PLAYERS,
    entities::{Card, Deck, Hand, HandId, HandStatus, ParticipantId, SessionId, Usd},
    errors::{GameError, UserError, internal},
    rules::{GameRules, HouseRules},
    special_bets::SpecialBet,
    states::Phase,
};

pub type GameId = Uuid;

/// Things that happened during an action, drained by the caller for
/// presentation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameEvent {
    Joined(ParticipantId, Usd),
    Left(ParticipantId),
    PhaseChanged(Phase),
    Dealt(HandId, Vec<Card>),
    Hit(HandId, Card),
    Stood(HandId),
    Busted(HandId),
    DoubledDown(HandId, Card),
    Split(HandId, HandId),
    Insured(HandId, Usd),
    Declined(HandId),
    DealerDrew(Card),
    Paid(ParticipantId, Usd),
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Joined(participant, bet) => format!("{participant} joined with ${bet}"),
            Self::Left(participant) => format!("{participant} left the game"),
            Self::PhaseChanged(phase) => format!("now {phase}"),
            Self::Dealt(id, cards) => {
                let cards: Vec<String> = cards.iter().map(ToString::to_string).collect();
                format!("{id} was dealt {}", cards.join(" "))
            }
            Self::Hit(id, card) => format!("{id} drew {card}"),
            Self::Stood(id) => format!("{id} stands"),
            Self::Busted(id) => format!("{id} busted"),
            Self::DoubledDown(id, card) => format!("{id} doubled down and drew {card}"),
            Self::Split(parent, child) => format!("{parent} split into {parent} and {child}"),
            Self::Insured(id, amount) => format!("{id} took ${amount} insurance"),
            Self::Declined(id) => format!("{id} passed on special bets"),
            Self::DealerDrew(card) => format!("dealer drew {card}"),
            Self::Paid(participant, amount) => format!("{participant} won ${amount}"),
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Game {
    pub(super) id: GameId,
    pub(super) session_id: SessionId,
    pub(super) phase: Phase,
    /// Turn order. Replaced with a freshly built list on every structural
    /// change, never edited in place.
    pub(super) player_order: Vec<HandId>,
    pub(super) hands: HashMap<HandId, Hand>,
    pub(super) dealer: Hand,
    pub(super) current_turn: usize,
    pub(super) bets: HashMap<HandId, Usd>,
    pub(super) deck: Deck,
    pub(super) payouts_processed: bool,
    pub(super) rules: GameRules,
    pub(super) max_players: usize,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(super) events: VecDeque<GameEvent>,
}

impl Game {
    /// New game in `Waiting` with a freshly shuffled shoe.
    #[must_use]
    pub fn new(session_id: SessionId, rules: GameRules) -> Self {
        let mut deck = Deck::new(rules.num_decks());
        deck.shuffle();
        Self::with_deck(session_id, rules, deck)
    }

    /// New game that deals from `deck` as given.
    #[must_use]
    pub fn with_deck(session_id: SessionId, rules: GameRules, deck: Deck) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        log::info!("Game {id} created for session {session_id}");
        Self {
            id,
            session_id,
            phase: Phase::Waiting,
            player_order: Vec::new(),
            hands: HashMap::new(),
            dealer: Hand::new(0),
            current_turn: 0,
            bets: HashMap::new(),
            deck,
            payouts_processed: false,
            rules,
            max_players: MAX_PLAYERS,
            created_at: now,
            updated_at: now,
            events: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players;
        self
    }

    #[must_use]
    pub fn id(&self) -> GameId {
        self.id
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn player_order(&self) -> &[HandId] {
        &self.player_order
    }

    #[must_use]
    pub fn hand(&self, id: &HandId) -> Option<&Hand> {
        self.hands.get(id)
    }

    /// Hands in turn order.
    pub fn hands(&self) -> impl Iterator<Item = (&HandId, &Hand)> {
        self.player_order
            .iter()
            .filter_map(|id| self.hands.get(id).map(|hand| (id, hand)))
    }

    #[must_use]
    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    #[must_use]
    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    /// The hand whose turn it is, if the phase is turn based.
    #[must_use]
    pub fn current_hand_id(&self) -> Option<&HandId> {
        if self.phase.is_turn_based() {
            self.player_order.get(self.current_turn)
        } else {
            None
        }
    }

    #[must_use]
    pub fn bet(&self, id: &HandId) -> Option<Usd> {
        self.bets.get(id).copied()
    }

    #[must_use]
    pub fn bets(&self) -> &HashMap<HandId, Usd> {
        &self.bets
    }

    #[must_use]
    pub fn payouts_processed(&self) -> bool {
        self.payouts_processed
    }

    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    #[must_use]
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Participants in join order, one entry each regardless of splits.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.player_order
            .iter()
            .filter(|id| !id.is_split_hand())
            .map(|id| id.participant.clone())
            .collect()
    }

    #[must_use]
    pub fn is_participant(&self, participant: &ParticipantId) -> bool {
        self.hands
            .contains_key(&HandId::primary(participant.clone()))
    }

    #[must_use]
    pub fn cards_remaining(&self) -> usize {
        self.deck.remaining()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Runs `action` on a draft and commits it only on success.
    pub(super) fn transact<T>(
        &mut self,
        action: impl FnOnce(&mut Self) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let mut draft = self.clone();
        let output = action(&mut draft)?;
        draft.updated_at = Utc::now();
        *self = draft;
        Ok(output)
    }

    /// Moves to `next` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// `UserError::IllegalTransition`, with the phase left as it was.
    pub fn transition(&mut self, next: Phase) -> Result<(), UserError> {
        if !self.phase.can_transition_to(next) {
            return Err(UserError::IllegalTransition {
                from: self.phase,
                to: next,
            });
        }
        log::debug!("Game {}: {} -> {}", self.id, self.phase, next);
        self.phase = next;
        self.events.push_back(GameEvent::PhaseChanged(next));
        Ok(())
    }

    pub(super) fn require_phase(&self, expected: Phase) -> Result<(), UserError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(UserError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    pub(super) fn hand_mut(&mut self, id: &HandId) -> Result<&mut Hand, GameError> {
        self.hands
            .get_mut(id)
            .ok_or_else(|| internal(format!("no hand for turn entry {id}")))
    }

    pub(super) fn draw_card(&mut self) -> Result<Card, GameError> {
        self.deck
            .draw_one()
            .ok_or(GameError::DeckExhausted {
                needed: 1,
                remaining: 0,
            })
    }

    pub(super) fn draw_exact(&mut self, needed: usize) -> Result<Vec<Card>, GameError> {
        let remaining = self.deck.remaining();
        if remaining < needed {
            return Err(GameError::DeckExhausted { needed, remaining });
        }
        Ok(self.deck.draw(needed))
    }

    /// Registers a participant with their opening bet. The first join
    /// opens betting.
    ///
    /// # Errors
    ///
    /// Wrong phase, duplicate participant, full table or a zero bet.
    pub fn add_participant(
        &mut self,
        participant: ParticipantId,
        bet: Usd,
    ) -> Result<HandId, UserError> {
        if !self.phase.is_pre_deal() {
            return Err(UserError::WrongPhase {
                expected: Phase::Betting,
                actual: self.phase,
            });
        }
        let id = HandId::primary(participant.clone());
        if self.hands.contains_key(&id) {
            return Err(UserError::ParticipantAlreadyJoined);
        }
        if self.participants().len() >= self.max_players {
            return Err(UserError::CapacityReached);
        }
        if bet == 0 {
            return Err(UserError::InvalidBet {
                min: 1,
                max: Usd::MAX,
            });
        }
        if self.phase == Phase::Waiting {
            self.transition(Phase::Betting)?;
        }

        self.player_order = self
            .player_order
            .iter()
            .cloned()
            .chain(iter::once(id.clone()))
            .collect();
        self.hands.insert(id.clone(), Hand::new(bet));
        self.bets.insert(id.clone(), bet);
        self.events.push_back(GameEvent::Joined(participant, bet));
        self.updated_at = Utc::now();
        log::debug!("Game {}: {id} joined with {bet}", self.id);
        Ok(id)
    }

    /// Takes a participant back out before the deal, returning their
    /// opening bet so the caller can refund it.
    ///
    /// # Errors
    ///
    /// Anything after betting, or an unknown participant.
    pub fn remove_participant(&mut self, participant: &ParticipantId) -> Result<Usd, UserError> {
        self.require_phase(Phase::Betting)?;
        let id = HandId::primary(participant.clone());
        let bet = self
            .bets
            .remove(&id)
            .ok_or(UserError::UnknownParticipant)?;
        self.hands.remove(&id);
        self.player_order = self
            .player_order
            .iter()
            .filter(|entry| **entry != id)
            .cloned()
            .collect();
        self.events.push_back(GameEvent::Left(participant.clone()));
        self.updated_at = Utc::now();
        Ok(bet)
    }

    /// Deals two cards to every hand and the dealer, round robin, then
    /// opens special bets if anyone is eligible for one.
    ///
    /// # Errors
    ///
    /// Wrong phase, nobody at the table, or a shoe too short to deal.
    pub fn start_dealing(&mut self) -> Result<(), GameError> {
        self.transact(|game| {
            game.require_phase(Phase::Betting)?;
            if game.player_order.is_empty() {
                return Err(UserError::NotEnoughPlayers.into());
            }
            game.transition(Phase::Dealing)?;
            game.deal_initial_cards()?;

            let offer_special_bets = game
                .player_order
                .iter()
                .filter_map(|id| game.hands.get(id))
                .any(|hand| game.has_special_bet(hand));
            if offer_special_bets {
                game.transition(Phase::SpecialBets)?;
            } else {
                game.transition(Phase::Playing)?;
            }
            game.current_turn = 0;
            log::info!(
                "Game {}: dealt {} hand(s), dealer shows {}",
                game.id,
                game.player_order.len(),
                game.dealer.up_card().map_or_else(String::new, |c| c.to_string())
            );
            game.skip_idle_turns()
        })
    }

    fn deal_initial_cards(&mut self) -> Result<(), GameError> {
        let order = self.player_order.clone();
        let mut cards = self.draw_exact(2 * (order.len() + 1))?.into_iter();
        let mut next_card = || {
            cards
                .next()
                .ok_or_else(|| internal("deal ran out of pre-drawn cards"))
        };

        for _ in 0..2 {
            for id in &order {
                let card = next_card()?;
                self.hand_mut(id)?.add_card(card);
            }
            let card = next_card()?;
            self.dealer.add_card(card);
        }

        for id in &order {
            let hand = self.hand_mut(id)?;
            let cards = hand.cards.clone();
            let natural = hand.is_blackjack();
            if natural {
                hand.status = HandStatus::Stood;
            }
            self.events.push_back(GameEvent::Dealt(id.clone(), cards));
            if natural {
                self.events.push_back(GameEvent::Stood(id.clone()));
            }
        }
        Ok(())
    }

    /// Whether any special bet is open to `hand` right now.
    pub(super) fn has_special_bet(&self, hand: &Hand) -> bool {
        SpecialBet::ALL
            .into_iter()
            .any(|bet| self.offers(bet, hand))
    }

    /// Rule-level eligibility of `hand` for `bet`, ignoring phase and turn.
    pub(super) fn offers(&self, bet: SpecialBet, hand: &Hand) -> bool {
        if hand.is_terminal() {
            return false;
        }
        match bet {
            SpecialBet::DoubleDown => self.rules.can_double_down(hand),
            SpecialBet::Split => self.rules.can_split(hand),
            SpecialBet::Insurance => {
                !hand.has_insurance && self.rules.insurance_offered(&self.dealer)
            }
        }
    }

    /// Checks that `participant` may act during `phase` and returns the
    /// hand they're acting on.
    pub(super) fn acting_hand(
        &self,
        participant: &ParticipantId,
        phase: Phase,
    ) -> Result<HandId, GameError> {
        self.require_phase(phase)?;
        if !self.is_participant(participant) {
            return Err(UserError::UnknownParticipant.into());
        }
        let current = self.player_order.get(self.current_turn).ok_or_else(|| {
            internal(format!(
                "turn {} outside an order of {}",
                self.current_turn,
                self.player_order.len()
            ))
        })?;
        if &current.participant != participant {
            return Err(UserError::OutOfTurnAction.into());
        }
        let hand = self
            .hands
            .get(current)
            .ok_or_else(|| internal(format!("no hand for turn entry {current}")))?;
        if hand.is_terminal() {
            return Err(UserError::HandNotActive.into());
        }
        Ok(current.clone())
    }

    /// Draws a card for the participant's current hand.
    ///
    /// # Errors
    ///
    /// Not the participant's turn, wrong phase, or an empty shoe.
    pub fn hit(&mut self, participant: &ParticipantId) -> Result<Card, GameError> {
        self.transact(|game| {
            let id = game.acting_hand(participant, Phase::Playing)?;
            let card = game.draw_card()?;
            let hand = game.hand_mut(&id)?;
            hand.add_card(card);
            let bust = hand.is_bust();
            game.events.push_back(GameEvent::Hit(id.clone(), card));
            log::debug!("Game {}: {id} hit {card}", game.id);

            if bust {
                game.hand_mut(&id)?.status = HandStatus::Bust;
                game.events.push_back(GameEvent::Busted(id));
                game.next_turn()?;
                game.skip_idle_turns()?;
            }
            Ok(card)
        })
    }

    /// Ends the participant's current hand.
    ///
    /// # Errors
    ///
    /// Not the participant's turn or wrong phase.
    pub fn stand(&mut self, participant: &ParticipantId) -> Result<(), GameError> {
        self.transact(|game| {
            let id = game.acting_hand(participant, Phase::Playing)?;
            game.hand_mut(&id)?.status = HandStatus::Stood;
            game.events.push_back(GameEvent::Stood(id));
            game.next_turn()?;
            game.skip_idle_turns()
        })
    }

    /// Closes special bets and starts the hit/stand round from the first
    /// hand.
    ///
    /// # Errors
    ///
    /// `UserError::IllegalTransition` outside special bets.
    pub fn finish_special_bets(&mut self) -> Result<(), UserError> {
        self.transition(Phase::Playing)?;
        self.current_turn = 0;
        Ok(())
    }

    /// Moves the turn forward by exactly one entry. Running off the end
    /// of the order moves the phase on: special bets give way to play,
    /// play gives way to the dealer.
    ///
    /// Doesn't look at the hand it lands on; see [`Self::skip_idle_turns`].
    pub(super) fn next_turn(&mut self) -> Result<(), GameError> {
        if !self.phase.is_turn_based() {
            return Err(internal(format!("advancing turn during {}", self.phase)));
        }
        self.current_turn += 1;
        if self.current_turn < self.player_order.len() {
            return Ok(());
        }
        match self.phase {
            Phase::SpecialBets => Ok(self.finish_special_bets()?),
            _ => {
                self.transition(Phase::Dealer)?;
                self.play_dealer()
            }
        }
    }

    /// Walks past turn entries with nothing to do: finished hands, and
    /// during special bets, hands no offer applies to.
    pub(super) fn skip_idle_turns(&mut self) -> Result<(), GameError> {
        while self.phase.is_turn_based() {
            let id = self.player_order.get(self.current_turn).ok_or_else(|| {
                internal(format!(
                    "turn {} outside an order of {}",
                    self.current_turn,
                    self.player_order.len()
                ))
            })?;
            let hand = self
                .hands
                .get(id)
                .ok_or_else(|| internal(format!("no hand for turn entry {id}")))?;
            let idle = match self.phase {
                Phase::SpecialBets => !self.has_special_bet(hand),
                _ => hand.is_terminal(),
            };
            if !idle {
                break;
            }
            self.next_turn()?;
        }
        Ok(())
    }

    /// Dealer draws until the house rules say stop, then the game
    /// completes.
    fn play_dealer(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Dealer {
            return Err(internal(format!("dealer playing during {}", self.phase)));
        }
        if let Some((id, _)) = self.hands.iter().find(|(_, hand)| !hand.is_terminal()) {
            return Err(internal(format!("dealer playing while {id} is active")));
        }
        while self.rules.dealer_should_hit(&self.dealer) {
            let card = self.draw_card()?;
            self.dealer.add_card(card);
            self.events.push_back(GameEvent::DealerDrew(card));
        }
        log::info!("Game {}: dealer finished with {}", self.id, self.dealer);
        self.transition(Phase::Complete)?;
        Ok(())
    }

    /// Stands every open hand and plays the dealer out. A no-op on a
    /// completed game.
    ///
    /// # Errors
    ///
    /// Before the deal, or if the dealer runs the shoe dry.
    pub fn force_complete(&mut self) -> Result<(), GameError> {
        if self.phase == Phase::Complete {
            return Ok(());
        }
        self.transact(|game| {
            if game.phase.is_pre_deal() || game.phase == Phase::Dealing {
                return Err(UserError::WrongPhase {
                    expected: Phase::Playing,
                    actual: game.phase,
                }
                .into());
            }
            if game.phase == Phase::SpecialBets {
                game.finish_special_bets()?;
            }
            if game.phase == Phase::Playing {
                let order = game.player_order.clone();
                for id in &order {
                    let hand = game.hand_mut(id)?;
                    if !hand.is_terminal() {
                        hand.status = HandStatus::Stood;
                        game.events.push_back(GameEvent::Stood(id.clone()));
                    }
                }
                game.transition(Phase::Dealer)?;
            }
            game.play_dealer()
        })
    }

    /// Public snapshot. The dealer's hole card stays hidden until the
    /// dealer plays.
    #[must_use]
    pub fn view(&self) -> GameView {
        let dealer_revealed = matches!(self.phase, Phase::Dealer | Phase::Complete);
        let (dealer_cards, dealer_score) = if dealer_revealed {
            (self.dealer.cards.clone(), Some(self.dealer.score))
        } else {
            (self.dealer.up_card().into_iter().collect(), None)
        };
        GameView {
            id: self.id,
            session_id: self.session_id.clone(),
            phase: self.phase,
            hands: self
                .hands()
                .map(|(id, hand)| HandView {
                    id: id.clone(),
                    hand: hand.clone(),
                })
                .collect(),
            dealer_cards,
            dealer_score,
            current_hand: self.current_hand_id().cloned(),
            cards_remaining: self.deck.remaining(),
            payouts_processed: self.payouts_processed,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandView {
    pub id: HandId,
    pub hand: Hand,
}

/// What a participant at the table gets to see.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameView {
    pub id: GameId,
    pub session_id: SessionId,
    pub phase: Phase,
    pub hands: Vec<HandView>,
    pub dealer_cards: Vec<Card>,
    pub dealer_score: Option<u8>,
    pub current_hand: Option<HandId>,
    pub cards_remaining: usize,
    pub payouts_processed: bool,
}

impl fmt::Display for GameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "game {} ({})", self.id, self.phase)?;
        write!(f, "  dealer:")?;
        for card in &self.dealer_cards {
            write!(f, " {card}")?;
        }
        match self.dealer_score {
            Some(score) => writeln!(f, " ({score})")?,
            None => writeln!(f, "  ??")?,
        }
        for view in &self.hands {
            let marker = if self.current_hand.as_ref() == Some(&view.id) {
                '>'
            } else {
                ' '
            };
            writeln!(
                f,
                "{marker} {:<12} {} {} ${}",
                view.id.to_string(),
                view.hand.status,
                view.hand,
                view.hand.stake()
            )?;
        }
        Ok(())
    }
}
