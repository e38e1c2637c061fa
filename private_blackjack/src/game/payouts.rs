//! Settling a completed game against the wallet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    entities::{Card, Hand, HandId, HandStatus, ParticipantId, SessionId, Usd},
    errors::GameError,
    rules::{GameRules, HouseRules},
    state_machine::{Game, GameEvent, GameId},
    states::Phase,
};
use crate::wallet::{Cashier, EntryType};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum HandOutcome {
    /// Natural against a dealer without one
    Blackjack,
    Win,
    Push,
    Loss,
    Bust,
}

impl fmt::Display for HandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Blackjack => "blackjack",
            Self::Win => "win",
            Self::Push => "push",
            Self::Loss => "loss",
            Self::Bust => "bust",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandResult {
    pub hand_id: HandId,
    pub outcome: HandOutcome,
    pub score: u8,
    /// Main bet plus any double down
    pub stake: Usd,
    /// Amount returned for the main bet, stake included
    pub credit: Usd,
    pub insurance_bet: Option<Usd>,
    pub insurance_credit: Usd,
}

impl HandResult {
    #[must_use]
    pub fn total_credit(&self) -> Usd {
        self.credit.saturating_add(self.insurance_credit)
    }
}

/// Result of settling one game.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Settlement {
    pub game_id: GameId,
    /// Per hand, in turn order
    pub results: Vec<HandResult>,
    /// Per participant, in join order. Each nonzero total is one `Win`
    /// credit.
    pub credits: Vec<(ParticipantId, Usd)>,
}

impl Settlement {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn credit_for(&self, participant: &ParticipantId) -> Usd {
        self.credits
            .iter()
            .find(|(p, _)| p == participant)
            .map_or(0, |(_, amount)| *amount)
    }
}

/// Settles one hand against the dealer. First match wins: bust, natural
/// against a dealer without one, dealer bust, then a straight score
/// comparison. Insurance is settled independently of the main bet.
#[must_use]
pub fn resolve_hand(rules: &GameRules, hand_id: &HandId, hand: &Hand, dealer: &Hand) -> HandResult {
    let stake = hand.stake();
    let dealer_blackjack = dealer.is_blackjack();

    let outcome = if hand.status == HandStatus::Bust || hand.is_bust() {
        HandOutcome::Bust
    } else if hand.is_blackjack() && !dealer_blackjack {
        HandOutcome::Blackjack
    } else if dealer.is_bust() || hand.score > dealer.score {
        HandOutcome::Win
    } else if hand.score == dealer.score {
        HandOutcome::Push
    } else {
        HandOutcome::Loss
    };
    let credit = match outcome {
        HandOutcome::Blackjack => rules.blackjack_credit(stake),
        HandOutcome::Win => stake.saturating_mul(2),
        HandOutcome::Push => stake,
        HandOutcome::Loss | HandOutcome::Bust => 0,
    };
    let insurance_credit = match hand.insurance_bet {
        Some(bet) if hand.has_insurance && dealer_blackjack => rules.insurance_credit(bet),
        _ => 0,
    };

    HandResult {
        hand_id: hand_id.clone(),
        outcome,
        score: hand.score,
        stake,
        credit,
        insurance_bet: hand.insurance_bet,
        insurance_credit,
    }
}

impl Game {
    /// Works out every hand's result without touching the wallet or the
    /// processed flag.
    ///
    /// # Errors
    ///
    /// The game isn't complete.
    pub fn resolve_payouts(&self) -> Result<Settlement, GameError> {
        self.require_phase(Phase::Complete)?;
        let results: Vec<HandResult> = self
            .hands()
            .map(|(id, hand)| resolve_hand(&self.rules, id, hand, &self.dealer))
            .collect();
        let credits = self
            .participants()
            .into_iter()
            .map(|participant| {
                let total = results
                    .iter()
                    .filter(|result| result.hand_id.participant == participant)
                    .fold(0, |sum: Usd, result| sum.saturating_add(result.total_credit()));
                (participant, total)
            })
            .collect();
        Ok(Settlement {
            game_id: self.id,
            results,
            credits,
        })
    }

    /// Pays out a completed game, once.
    ///
    /// The processed flag is raised before any credit goes out, so a
    /// settlement interrupted by a wallet error is never retried; a later
    /// call returns an empty settlement.
    ///
    /// # Errors
    ///
    /// The game isn't complete, or a credit fails.
    pub async fn settle(&mut self, cashier: &Cashier) -> Result<Settlement, GameError> {
        self.require_phase(Phase::Complete)?;
        if self.payouts_processed {
            log::debug!("Game {} already settled", self.id);
            return Ok(Settlement {
                game_id: self.id,
                results: Vec::new(),
                credits: Vec::new(),
            });
        }

        let settlement = self.resolve_payouts()?;
        self.payouts_processed = true;
        self.updated_at = Utc::now();

        let description = format!("payout for game {}", self.id);
        for (participant, amount) in &settlement.credits {
            if *amount == 0 {
                continue;
            }
            cashier
                .add_funds(participant, *amount, EntryType::Win, &description)
                .await?;
            self.events
                .push_back(GameEvent::Paid(participant.clone(), *amount));
        }
        log::info!(
            "Game {} settled: {} hand(s), {} paid out",
            self.id,
            settlement.results.len(),
            settlement.credits.iter().map(|(_, amount)| *amount).sum::<Usd>()
        );
        Ok(settlement)
    }
}

/// Archived result of a completed game.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub session_id: SessionId,
    pub dealer_cards: Vec<Card>,
    pub dealer_score: u8,
    pub results: Vec<HandResult>,
    pub completed_at: DateTime<Utc>,
}

impl GameRecord {
    #[must_use]
    pub fn new(game: &Game, settlement: &Settlement) -> Self {
        Self {
            game_id: game.id(),
            session_id: game.session_id().clone(),
            dealer_cards: game.dealer().cards.clone(),
            dealer_score: game.dealer().score,
            results: settlement.results.clone(),
            completed_at: Utc::now(),
        }
    }

    /// Distinct participants, in turn order.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut participants: Vec<ParticipantId> = Vec::new();
        for result in &self.results {
            if !participants.contains(&result.hand_id.participant) {
                participants.push(result.hand_id.participant.clone());
            }
        }
        participants
    }
}
