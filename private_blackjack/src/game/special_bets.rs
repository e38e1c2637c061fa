//! Double down, split and insurance.
//!
//! Each special bet is worked out on a draft of the game first, which
//! proves eligibility and card availability. Only then is the wallet
//! debited (with the loan fallback), and only a successful debit commits
//! the draft. A failed debit leaves the game exactly as it was.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fmt, iter};

use super::{
    entities::{Card, Hand, HandId, HandStatus, ParticipantId, Usd},
    errors::{GameError, UserError, internal},
    state_machine::{Game, GameEvent},
    states::Phase,
};
use crate::wallet::{Cashier, EntryType};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SpecialBet {
    DoubleDown,
    Split,
    Insurance,
}

impl SpecialBet {
    pub const ALL: [Self; 3] = [Self::DoubleDown, Self::Split, Self::Insurance];
}

impl fmt::Display for SpecialBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::DoubleDown => "double down",
            Self::Split => "split",
            Self::Insurance => "insure",
        };
        write!(f, "{repr}")
    }
}

/// Insurance costs half the main bet, rounded down, and never less than 1.
#[must_use]
pub fn insurance_cost(bet: Usd) -> Usd {
    (bet / 2).max(1)
}

/// New order with `id` placed right after `position`.
fn insert_after(order: &[HandId], position: usize, id: HandId) -> Vec<HandId> {
    let (head, tail) = order.split_at((position + 1).min(order.len()));
    head.iter()
        .cloned()
        .chain(iter::once(id))
        .chain(tail.iter().cloned())
        .collect()
}

impl Game {
    /// Special bets `participant` could place on their current hand right
    /// now. Empty when it isn't their special-bets turn.
    #[must_use]
    pub fn available_special_bets(&self, participant: &ParticipantId) -> Vec<SpecialBet> {
        SpecialBet::ALL
            .into_iter()
            .filter(|bet| self.special_bet_hand(participant, *bet).is_ok())
            .collect()
    }

    fn special_bet_hand(
        &self,
        participant: &ParticipantId,
        bet: SpecialBet,
    ) -> Result<HandId, GameError> {
        let id = self.acting_hand(participant, Phase::SpecialBets)?;
        let hand = self
            .hands
            .get(&id)
            .ok_or_else(|| internal(format!("no hand for turn entry {id}")))?;
        if !self.offers(bet, hand) {
            return Err(UserError::NotEligible(bet).into());
        }
        Ok(id)
    }

    fn next_split_index(&self, participant: &ParticipantId) -> Result<u8, GameError> {
        self.player_order
            .iter()
            .filter(|id| &id.participant == participant)
            .map(|id| id.split_index)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| internal(format!("{participant} ran out of split indices")))
    }

    /// Doubles the bet and deals exactly one card, which ends the hand.
    /// Returns the card and the amount to debit.
    pub(super) fn apply_double_down(
        &mut self,
        participant: &ParticipantId,
    ) -> Result<(Card, Usd), GameError> {
        let id = self.special_bet_hand(participant, SpecialBet::DoubleDown)?;
        let card = self.draw_card()?;
        let hand = self.hand_mut(&id)?;
        let amount = hand.bet;
        hand.is_doubled_down = true;
        hand.double_down_bet = Some(amount);
        hand.add_card(card);
        let bust = hand.is_bust();
        hand.status = if bust {
            HandStatus::Bust
        } else {
            HandStatus::Stood
        };

        self.events.push_back(GameEvent::DoubledDown(id.clone(), card));
        if bust {
            self.events.push_back(GameEvent::Busted(id.clone()));
        }
        log::debug!("Game {}: {id} doubled down {amount} and drew {card}", self.id);
        self.next_turn()?;
        self.skip_idle_turns()?;
        Ok((card, amount))
    }

    /// Moves the second card of a pair into a new hand placed right after
    /// the current one, and deals each hand a fresh card. Returns the new
    /// hand's id and the amount to debit.
    pub(super) fn apply_split(
        &mut self,
        participant: &ParticipantId,
    ) -> Result<(HandId, Usd), GameError> {
        let id = self.special_bet_hand(participant, SpecialBet::Split)?;
        let new_id = HandId {
            participant: participant.clone(),
            split_index: self.next_split_index(participant)?,
        };
        let position = self.current_turn;
        let fresh = self.draw_exact(2)?;
        let (Some(&for_parent), Some(&for_child)) = (fresh.first(), fresh.get(1)) else {
            return Err(internal("split drew fewer than two cards"));
        };

        let parent = self.hand_mut(&id)?;
        let amount = parent.bet;
        let moved = parent
            .cards
            .pop()
            .ok_or_else(|| internal(format!("splitting empty hand {id}")))?;
        parent.is_split = true;
        parent.split_sibling_id = Some(new_id.clone());
        parent.add_card(for_parent);

        let mut child = Hand::new(amount);
        child.is_split = true;
        child.split_sibling_id = Some(id.clone());
        child.parent_hand_id = Some(id.clone());
        child.add_card(moved);
        child.add_card(for_child);

        self.hands.insert(new_id.clone(), child);
        self.bets.insert(new_id.clone(), amount);
        self.player_order = insert_after(&self.player_order, position, new_id.clone());
        self.events
            .push_back(GameEvent::Split(id.clone(), new_id.clone()));
        log::info!("Game {}: {id} split into {new_id}", self.id);

        self.next_turn()?;
        self.skip_idle_turns()?;
        Ok((new_id, amount))
    }

    /// Takes insurance on the current hand. No card is dealt. Returns the
    /// amount to debit.
    pub(super) fn apply_insurance(&mut self, participant: &ParticipantId) -> Result<Usd, GameError> {
        let id = self.special_bet_hand(participant, SpecialBet::Insurance)?;
        let hand = self.hand_mut(&id)?;
        let amount = insurance_cost(hand.bet);
        hand.has_insurance = true;
        hand.insurance_bet = Some(amount);

        self.events.push_back(GameEvent::Insured(id.clone(), amount));
        log::debug!("Game {}: {id} insured for {amount}", self.id);
        self.next_turn()?;
        self.skip_idle_turns()?;
        Ok(amount)
    }

    /// Passes on special bets for the current hand. No wallet effect.
    ///
    /// # Errors
    ///
    /// Not the participant's special-bets turn.
    pub fn decline_special_bets(&mut self, participant: &ParticipantId) -> Result<(), GameError> {
        self.transact(|game| {
            let id = game.acting_hand(participant, Phase::SpecialBets)?;
            game.events.push_back(GameEvent::Declined(id));
            game.next_turn()?;
            game.skip_idle_turns()
        })
    }

    /// Runs `apply` on a draft, debits what it asks for, then commits.
    async fn place_special_bet<T>(
        &mut self,
        participant: &ParticipantId,
        cashier: &Cashier,
        bet: SpecialBet,
        apply: impl FnOnce(&mut Self) -> Result<(T, Usd), GameError>,
    ) -> Result<T, GameError> {
        let mut draft = self.clone();
        let (output, amount) = apply(&mut draft)?;
        let description = format!("{bet} in game {}", self.id);
        cashier
            .remove_funds_with_loan(participant, amount, EntryType::Bet, &description)
            .await?;
        draft.updated_at = Utc::now();
        *self = draft;
        Ok(output)
    }

    /// Doubles down on the participant's current hand and returns the one
    /// card it gets.
    ///
    /// # Errors
    ///
    /// Not eligible, empty shoe, or the wallet can't cover the bet even
    /// after the loan.
    pub async fn double_down(
        &mut self,
        participant: &ParticipantId,
        cashier: &Cashier,
    ) -> Result<Card, GameError> {
        self.place_special_bet(participant, cashier, SpecialBet::DoubleDown, |game| {
            game.apply_double_down(participant)
        })
        .await
    }

    /// Splits the participant's current pair and returns the id of the new
    /// hand.
    ///
    /// # Errors
    ///
    /// Not a pair, not their turn, fewer than two cards left, or the
    /// wallet can't cover the second bet.
    pub async fn split(
        &mut self,
        participant: &ParticipantId,
        cashier: &Cashier,
    ) -> Result<HandId, GameError> {
        self.place_special_bet(participant, cashier, SpecialBet::Split, |game| {
            game.apply_split(participant)
        })
        .await
    }

    /// Insures the participant's current hand against a dealer natural and
    /// returns the insurance bet.
    ///
    /// # Errors
    ///
    /// No dealer ace, already insured, or the wallet can't cover it.
    pub async fn place_insurance(
        &mut self,
        participant: &ParticipantId,
        cashier: &Cashier,
    ) -> Result<Usd, GameError> {
        self.place_special_bet(participant, cashier, SpecialBet::Insurance, |game| {
            game.apply_insurance(participant).map(|amount| (amount, amount))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::LOAN_INCREMENT;
    use crate::game::testing::{hid, pid, stacked};
    use crate::wallet::{
        InMemoryWalletLedger, WalletError, WalletLedger, funds::tests::RecordingLedger,
    };
    use std::sync::Arc;

    async fn cashier_with(balance: i64, names: &[&str]) -> (Cashier, Arc<InMemoryWalletLedger>) {
        let ledger = Arc::new(InMemoryWalletLedger::new(balance));
        for name in names {
            ledger.get_or_create_wallet(&pid(name)).await.unwrap();
        }
        (Cashier::new(ledger.clone(), LOAN_INCREMENT), ledger)
    }

    #[test]
    fn test_insurance_cost_rounds_down_with_floor_of_one() {
        assert_eq!(insurance_cost(50), 25);
        assert_eq!(insurance_cost(25), 12);
        assert_eq!(insurance_cost(1), 1);
    }

    #[test]
    fn test_insert_after_builds_new_order() {
        let order = vec![hid("a", 0), hid("b", 0)];
        assert_eq!(
            insert_after(&order, 0, hid("a", 1)),
            vec![hid("a", 0), hid("a", 1), hid("b", 0)]
        );
        assert_eq!(
            insert_after(&order, 1, hid("b", 1)),
            vec![hid("a", 0), hid("b", 0), hid("b", 1)]
        );
    }

    #[tokio::test]
    async fn test_double_down_debits_once_and_ends_hand() {
        let ledger = Arc::new(RecordingLedger::new(500));
        ledger.get_or_create_wallet(&pid("alice")).await.unwrap();
        let cashier = Cashier::new(ledger.clone(), LOAN_INCREMENT);
        // alice 6+5=11, dealer 9+7; double gets 3 -> 14, still stood.
        let mut game = stacked(&[("alice", 50)], "6S 9H 5D 7C 3H 10D");

        game.start_dealing().unwrap();
        let card = game.double_down(&pid("alice"), &cashier).await.unwrap();

        assert_eq!(card, "3H".parse().unwrap());
        let hand = game.hand(&hid("alice", 0)).unwrap();
        assert!(hand.is_doubled_down);
        assert_eq!(hand.double_down_bet, Some(50));
        assert_eq!(hand.stake(), 100);
        assert_eq!(hand.cards.len(), 3);
        assert_eq!(hand.status, HandStatus::Stood);
        assert_eq!(*ledger.calls.lock().await, vec!["remove_funds 50 ok"]);
        // Only hand finished during special bets, so play ran straight
        // through to the dealer.
        assert_eq!(game.phase(), Phase::Complete);
        assert_eq!(game.dealer().score, 26);
    }

    #[tokio::test]
    async fn test_double_down_can_bust() {
        let (cashier, _) = cashier_with(500, &["alice"]).await;
        // 10+2 doubles into K: 22.
        let mut game = stacked(&[("alice", 20)], "10S 9H 2D 8C KH");
        game.start_dealing().unwrap();
        game.double_down(&pid("alice"), &cashier).await.unwrap();
        assert_eq!(
            game.hand(&hid("alice", 0)).unwrap().status,
            HandStatus::Bust
        );
    }

    #[tokio::test]
    async fn test_split_inserts_new_hand_after_parent() {
        let (cashier, ledger) = cashier_with(500, &["alice", "bob"]).await;
        // alice 8S 8D, bob 10S 7C, dealer 9H 10H; split deals 3C to alice,
        // 2C to alice#1.
        let mut game = stacked(
            &[("alice", 40), ("bob", 10)],
            "8S 10S 9H 8D 7C 10H 3C 2C",
        );
        game.start_dealing().unwrap();

        let new_id = game.split(&pid("alice"), &cashier).await.unwrap();

        assert_eq!(new_id, hid("alice", 1));
        assert_eq!(
            game.player_order(),
            &[hid("alice", 0), hid("alice", 1), hid("bob", 0)]
        );
        let parent = game.hand(&hid("alice", 0)).unwrap();
        let child = game.hand(&new_id).unwrap();
        assert_eq!(parent.cards, vec!["8S".parse().unwrap(), "3C".parse().unwrap()]);
        assert_eq!(child.cards, vec!["8D".parse().unwrap(), "2C".parse().unwrap()]);
        assert_eq!(parent.score, 11);
        assert_eq!(child.score, 10);
        assert!(parent.is_split && child.is_split);
        assert_eq!(parent.split_sibling_id, Some(new_id.clone()));
        assert_eq!(child.split_sibling_id, Some(hid("alice", 0)));
        assert_eq!(child.parent_hand_id, Some(hid("alice", 0)));
        assert_eq!(game.bet(&new_id), Some(40));
        assert_eq!(ledger.balance(&pid("alice")).await.unwrap(), 460);
        // The new hand gets its own special-bets turn.
        assert_eq!(game.phase(), Phase::SpecialBets);
        assert_eq!(game.current_hand_id(), Some(&new_id));
    }

    #[tokio::test]
    async fn test_split_hand_can_split_again() {
        let (cashier, _) = cashier_with(500, &["alice"]).await;
        // alice 8S 8D, dealer 9H 10H; alice#1 gets 8C back: another pair.
        let mut game = stacked(&[("alice", 10)], "8S 9H 8D 10H 2C 8C 4D 5D");
        game.start_dealing().unwrap();
        game.split(&pid("alice"), &cashier).await.unwrap();
        let second = game.split(&pid("alice"), &cashier).await.unwrap();
        assert_eq!(second, hid("alice", 2));
        assert_eq!(
            game.player_order(),
            &[hid("alice", 0), hid("alice", 1), hid("alice", 2)]
        );
    }

    #[tokio::test]
    async fn test_split_requires_a_pair() {
        let (cashier, ledger) = cashier_with(500, &["alice"]).await;
        let mut game = stacked(&[("alice", 10)], "8S 9H 7D 10H 2C 3C");
        game.start_dealing().unwrap();
        let err = game.split(&pid("alice"), &cashier).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::User(UserError::NotEligible(SpecialBet::Split))
        ));
        assert_eq!(game.player_order(), &[hid("alice", 0)]);
        assert_eq!(ledger.balance(&pid("alice")).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_insurance_needs_dealer_ace() {
        let (cashier, ledger) = cashier_with(500, &["alice"]).await;
        let mut game = stacked(&[("alice", 50)], "10S AH 7D 10C");
        game.start_dealing().unwrap();
        assert_eq!(
            game.available_special_bets(&pid("alice")),
            vec![SpecialBet::DoubleDown, SpecialBet::Insurance]
        );
        let amount = game.place_insurance(&pid("alice"), &cashier).await.unwrap();
        assert_eq!(amount, 25);
        let hand = game.hand(&hid("alice", 0)).unwrap();
        assert!(hand.has_insurance);
        assert_eq!(hand.insurance_bet, Some(25));
        assert_eq!(hand.cards.len(), 2);
        assert_eq!(ledger.balance(&pid("alice")).await.unwrap(), 475);
        assert_eq!(game.phase(), Phase::Playing);

        let mut no_ace = stacked(&[("alice", 50)], "10S 9H 7D 10C");
        no_ace.start_dealing().unwrap();
        assert!(matches!(
            no_ace.place_insurance(&pid("alice"), &cashier).await,
            Err(GameError::User(UserError::NotEligible(SpecialBet::Insurance)))
        ));
    }

    #[tokio::test]
    async fn test_special_bet_takes_loan_when_short() {
        let (cashier, ledger) = cashier_with(0, &["alice"]).await;
        let mut game = stacked(&[("alice", 60)], "6S 9H 5D 7C 3H 10D");
        game.start_dealing().unwrap();
        game.double_down(&pid("alice"), &cashier).await.unwrap();
        let wallet = ledger.get_or_create_wallet(&pid("alice")).await.unwrap();
        assert_eq!(wallet.loan, 100);
        assert_eq!(wallet.balance, 40);
    }

    #[tokio::test]
    async fn test_failed_debit_leaves_game_untouched() {
        let (cashier, ledger) = cashier_with(0, &["alice"]).await;
        let mut game = stacked(&[("alice", 150)], "6S 9H 5D 7C 3H 10D");
        game.start_dealing().unwrap();
        let before = serde_json::to_value(&game).unwrap();

        let err = game.double_down(&pid("alice"), &cashier).await.unwrap_err();

        assert!(matches!(
            err,
            GameError::Wallet(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(serde_json::to_value(&game).unwrap(), before);
        // The loan itself stays on the books.
        let wallet = ledger.get_or_create_wallet(&pid("alice")).await.unwrap();
        assert_eq!(wallet.loan, 100);
    }

    #[tokio::test]
    async fn test_out_of_turn_special_bet() {
        let (cashier, _) = cashier_with(500, &["alice", "bob"]).await;
        let mut game = stacked(&[("alice", 10), ("bob", 10)], "6S 8S 9H 5D 8D 7C");
        game.start_dealing().unwrap();
        assert!(matches!(
            game.split(&pid("bob"), &cashier).await,
            Err(GameError::User(UserError::OutOfTurnAction))
        ));
        assert!(game.available_special_bets(&pid("bob")).is_empty());
    }

    #[tokio::test]
    async fn test_decline_moves_to_next_eligible_hand() {
        let mut game = stacked(&[("alice", 10), ("bob", 10)], "6S 8S 9H 5D 8D 7C");
        game.start_dealing().unwrap();
        game.decline_special_bets(&pid("alice")).unwrap();
        assert_eq!(game.current_hand_id(), Some(&hid("bob", 0)));
        game.decline_special_bets(&pid("bob")).unwrap();
        assert_eq!(game.phase(), Phase::Playing);
        assert_eq!(game.current_hand_id(), Some(&hid("alice", 0)));
    }
}
