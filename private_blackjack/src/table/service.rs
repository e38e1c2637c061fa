//! The facade a presentation layer drives.
//!
//! Every call locks the session's game for its whole duration, persists the
//! result, and once a game completes settles it, archives a record and
//! frees the session for the next game.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    config::TableConfig,
    registry::{GameHandle, GameRegistry},
};
use crate::db::{GameRepository, InMemoryGameRepository};
use crate::game::{
    GameError, UserError,
    entities::{Card, Deck, HandId, ParticipantId, SessionId, Usd},
    payouts::{GameRecord, Settlement},
    state_machine::{Game, GameEvent, GameView},
    states::Phase,
};
use crate::wallet::{Cashier, EntryType, InMemoryWalletLedger, WalletLedger};

/// What an action produced.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableUpdate {
    pub view: GameView,
    pub events: Vec<GameEvent>,
    /// Present on the action that completed the game
    pub settlement: Option<Settlement>,
}

pub struct TableService {
    config: TableConfig,
    registry: GameRegistry,
    cashier: Cashier,
    repository: Arc<dyn GameRepository>,
}

impl TableService {
    pub fn new(
        config: TableConfig,
        ledger: Arc<dyn WalletLedger>,
        repository: Arc<dyn GameRepository>,
    ) -> Self {
        let cashier = Cashier::new(ledger, config.loan_increment);
        Self {
            config,
            registry: GameRegistry::new(),
            cashier,
            repository,
        }
    }

    /// Service with in-memory wallets and games.
    pub fn in_memory(config: TableConfig) -> Self {
        let ledger = Arc::new(InMemoryWalletLedger::new(config.starting_balance));
        Self::new(config, ledger, Arc::new(InMemoryGameRepository::new()))
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<dyn WalletLedger> {
        self.cashier.ledger()
    }

    pub fn repository(&self) -> &Arc<dyn GameRepository> {
        &self.repository
    }

    /// Opens a game for `session_id` with a freshly shuffled shoe.
    ///
    /// # Errors
    ///
    /// `UserError::GameAlreadyActive`, or a persistence failure.
    pub async fn create_game(&self, session_id: &SessionId) -> Result<GameView, GameError> {
        let game = Game::new(session_id.clone(), self.config.rules())
            .with_max_players(self.config.max_players);
        self.register(game).await
    }

    /// Opens a game that deals from `deck` as given.
    ///
    /// # Errors
    ///
    /// `UserError::GameAlreadyActive`, or a persistence failure.
    pub async fn create_game_with_deck(
        &self,
        session_id: &SessionId,
        deck: Deck,
    ) -> Result<GameView, GameError> {
        let game = Game::with_deck(session_id.clone(), self.config.rules(), deck)
            .with_max_players(self.config.max_players);
        self.register(game).await
    }

    async fn register(&self, game: Game) -> Result<GameView, GameError> {
        let (game_id, session_id) = (game.id(), game.session_id().clone());
        let handle = self.registry.create_if_absent(game).await?;
        let game = handle.lock().await;
        if let Err(err) = self.repository.create_game(&game).await {
            self.registry.remove(&session_id, game_id).await;
            return Err(err.into());
        }
        Ok(game.view())
    }

    async fn handle(&self, session_id: &SessionId) -> Result<GameHandle, GameError> {
        self.registry
            .get(session_id)
            .await
            .ok_or_else(|| UserError::NoActiveGame.into())
    }

    /// Persists the game and, if it just completed, settles and archives
    /// it and frees the session.
    async fn after_action(&self, game: &mut Game) -> Result<TableUpdate, GameError> {
        self.repository.update_game(game).await?;

        let mut settlement = None;
        if game.phase() == Phase::Complete {
            if !game.payouts_processed() {
                let settled = game.settle(&self.cashier).await?;
                self.repository.update_game(game).await?;
                self.repository
                    .record_result(&GameRecord::new(game, &settled))
                    .await?;
                settlement = Some(settled);
            }
            self.registry.remove(game.session_id(), game.id()).await;
        }

        Ok(TableUpdate {
            view: game.view(),
            events: game.drain_events().into(),
            settlement,
        })
    }

    /// Seats `participant` and takes their opening bet, lending if needed.
    ///
    /// # Errors
    ///
    /// Bet outside table limits, no game, wrong phase, already seated, full
    /// table, or a wallet that can't cover the bet.
    pub async fn join(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
        bet: Usd,
    ) -> Result<TableUpdate, GameError> {
        self.config.check_bet(bet)?;
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;

        let mut draft = game.clone();
        draft.add_participant(participant.clone(), bet)?;
        self.cashier.ledger().get_or_create_wallet(participant).await?;
        let description = format!("opening bet in game {}", game.id());
        self.cashier
            .remove_funds_with_loan(participant, bet, EntryType::Bet, &description)
            .await?;
        *game = draft;
        log::info!("{participant} joined game {} with {bet}", game.id());

        self.after_action(&mut game).await
    }

    /// Takes `participant` back out before the deal and refunds their bet.
    ///
    /// # Errors
    ///
    /// No game, not betting, or not seated.
    pub async fn leave(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;

        let mut draft = game.clone();
        let bet = draft.remove_participant(participant)?;
        let description = format!("refund from game {}", game.id());
        self.cashier
            .add_funds(participant, bet, EntryType::Refund, &description)
            .await?;
        *game = draft;

        self.after_action(&mut game).await
    }

    /// # Errors
    ///
    /// No game, wrong phase, nobody seated, or a short shoe.
    pub async fn start_dealing(&self, session_id: &SessionId) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        game.start_dealing()?;
        self.after_action(&mut game).await
    }

    /// # Errors
    ///
    /// No game, or the hit is rejected by the game.
    pub async fn hit(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<(Card, TableUpdate), GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        let card = game.hit(participant)?;
        Ok((card, self.after_action(&mut game).await?))
    }

    /// # Errors
    ///
    /// No game, or the stand is rejected by the game.
    pub async fn stand(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        game.stand(participant)?;
        self.after_action(&mut game).await
    }

    /// # Errors
    ///
    /// No game, not eligible, or the wallet can't cover it.
    pub async fn double_down(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<(Card, TableUpdate), GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        let card = game.double_down(participant, &self.cashier).await?;
        Ok((card, self.after_action(&mut game).await?))
    }

    /// # Errors
    ///
    /// No game, not eligible, or the wallet can't cover it.
    pub async fn split(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<(HandId, TableUpdate), GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        let new_hand = game.split(participant, &self.cashier).await?;
        Ok((new_hand, self.after_action(&mut game).await?))
    }

    /// # Errors
    ///
    /// No game, not eligible, or the wallet can't cover it.
    pub async fn place_insurance(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        game.place_insurance(participant, &self.cashier).await?;
        self.after_action(&mut game).await
    }

    /// # Errors
    ///
    /// No game, or not the participant's special-bets turn.
    pub async fn decline_special_bets(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        game.decline_special_bets(participant)?;
        self.after_action(&mut game).await
    }

    /// Stands every open hand, plays the dealer out and settles.
    ///
    /// # Errors
    ///
    /// No game, not dealt yet, or settlement fails.
    pub async fn force_complete(&self, session_id: &SessionId) -> Result<TableUpdate, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        game.force_complete()?;
        self.after_action(&mut game).await
    }

    /// Calls off a game that hasn't been dealt, refunding every opening
    /// bet. Returns the refunds.
    ///
    /// Participants are unseated one at a time, each only after their
    /// refund went through. If a refund fails the game stays registered
    /// with everyone not yet refunded, so the cancel can be retried.
    ///
    /// # Errors
    ///
    /// No game, already dealt, or a refund fails.
    pub async fn cancel(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<(ParticipantId, Usd)>, GameError> {
        let handle = self.handle(session_id).await?;
        let mut game = handle.lock().await;
        if !game.phase().is_pre_deal() {
            return Err(UserError::WrongPhase {
                expected: Phase::Betting,
                actual: game.phase(),
            }
            .into());
        }

        let description = format!("refund from cancelled game {}", game.id());
        let mut refunds = Vec::new();
        for participant in game.participants() {
            let mut draft = game.clone();
            let bet = draft.remove_participant(&participant)?;
            if let Err(err) = self
                .cashier
                .add_funds(&participant, bet, EntryType::Refund, &description)
                .await
            {
                log::warn!(
                    "Refund to {participant} failed cancelling game {}: {err}",
                    game.id()
                );
                game.drain_events();
                self.repository.update_game(&game).await?;
                return Err(err.into());
            }
            *game = draft;
            refunds.push((participant, bet));
        }

        self.registry.remove(session_id, game.id()).await;
        self.repository.delete_game(game.id()).await?;
        log::info!("Game {} cancelled, {} bet(s) refunded", game.id(), refunds.len());
        Ok(refunds)
    }

    /// # Errors
    ///
    /// `UserError::NoActiveGame`
    pub async fn view(&self, session_id: &SessionId) -> Result<GameView, GameError> {
        let handle = self.handle(session_id).await?;
        let game = handle.lock().await;
        Ok(game.view())
    }

    /// # Errors
    ///
    /// Wallet failure.
    pub async fn balance(&self, participant: &ParticipantId) -> Result<i64, GameError> {
        let wallet = self.cashier.ledger().get_or_create_wallet(participant).await?;
        Ok(wallet.balance)
    }

    /// Most recent archived games the participant played in.
    ///
    /// # Errors
    ///
    /// Persistence failure.
    pub async fn history(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> Result<Vec<GameRecord>, GameError> {
        Ok(self
            .repository
            .records_for_participant(participant, limit)
            .await?)
    }
}
