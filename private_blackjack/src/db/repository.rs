//! Game persistence.
//!
//! The table service writes the game after every mutation and appends a
//! [`GameRecord`] once a game is settled. Two backends: in process memory,
//! and PostgreSQL with the game stored as a JSON snapshot.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::game::{
    entities::{ParticipantId, SessionId},
    payouts::GameRecord,
    state_machine::{Game, GameId},
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("game {0} already exists")]
    GameAlreadyExists(GameId),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Trait for game repository operations
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Store a new game
    async fn create_game(&self, game: &Game) -> RepositoryResult<()>;

    /// Load a game by id
    async fn get_game(&self, id: GameId) -> RepositoryResult<Option<Game>>;

    /// Overwrite a stored game
    async fn update_game(&self, game: &Game) -> RepositoryResult<()>;

    /// Delete a game, returning whether it existed
    async fn delete_game(&self, id: GameId) -> RepositoryResult<bool>;

    /// Archive the result of a settled game
    async fn record_result(&self, record: &GameRecord) -> RepositoryResult<()>;

    /// Most recent records the participant played in first
    async fn records_for_participant(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>>;

    /// Most recent records of the session first
    async fn records_for_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>>;
}

/// Game repository kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryGameRepository {
    games: RwLock<HashMap<GameId, Game>>,
    records: RwLock<Vec<GameRecord>>,
}

impl InMemoryGameRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn create_game(&self, game: &Game) -> RepositoryResult<()> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.id()) {
            return Err(RepositoryError::GameAlreadyExists(game.id()));
        }
        games.insert(game.id(), game.clone());
        Ok(())
    }

    async fn get_game(&self, id: GameId) -> RepositoryResult<Option<Game>> {
        Ok(self.games.read().await.get(&id).cloned())
    }

    async fn update_game(&self, game: &Game) -> RepositoryResult<()> {
        let mut games = self.games.write().await;
        let stored = games
            .get_mut(&game.id())
            .ok_or(RepositoryError::GameNotFound(game.id()))?;
        *stored = game.clone();
        Ok(())
    }

    async fn delete_game(&self, id: GameId) -> RepositoryResult<bool> {
        Ok(self.games.write().await.remove(&id).is_some())
    }

    async fn record_result(&self, record: &GameRecord) -> RepositoryResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn records_for_participant(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| {
                record
                    .results
                    .iter()
                    .any(|result| &result.hand_id.participant == participant)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn records_for_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| &record.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// PostgreSQL implementation of [`GameRepository`].
///
/// Expects two tables:
///
/// ```sql
/// CREATE TABLE games (
///     id          UUID PRIMARY KEY,
///     session_id  TEXT NOT NULL,
///     phase       TEXT NOT NULL,
///     state       JSONB NOT NULL,
///     created_at  TIMESTAMP NOT NULL,
///     updated_at  TIMESTAMP NOT NULL
/// );
/// CREATE TABLE game_results (
///     id           BIGSERIAL PRIMARY KEY,
///     game_id      UUID NOT NULL UNIQUE,
///     session_id   TEXT NOT NULL,
///     participants TEXT[] NOT NULL,
///     record       JSONB NOT NULL,
///     completed_at TIMESTAMP NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct PgGameRepository {
    pool: Arc<PgPool>,
}

impl PgGameRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn parse_records(rows: Vec<sqlx::postgres::PgRow>) -> RepositoryResult<Vec<GameRecord>> {
    rows.iter()
        .map(|row| -> RepositoryResult<GameRecord> {
            Ok(serde_json::from_str(row.get::<&str, _>("record"))?)
        })
        .collect()
}

#[async_trait]
impl GameRepository for PgGameRepository {
    async fn create_game(&self, game: &Game) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO games (id, session_id, phase, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4::jsonb, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(game.id())
        .bind(&game.session_id().0)
        .bind(game.phase().to_string())
        .bind(serde_json::to_string(game)?)
        .bind(game.created_at().naive_utc())
        .bind(game.updated_at().naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::GameAlreadyExists(game.id()));
        }
        Ok(())
    }

    async fn get_game(&self, id: GameId) -> RepositoryResult<Option<Game>> {
        let row = sqlx::query("SELECT state::text AS state FROM games WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(row.get::<&str, _>("state"))?)),
            None => Ok(None),
        }
    }

    async fn update_game(&self, game: &Game) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE games SET phase = $1, state = $2::jsonb, updated_at = $3 WHERE id = $4",
        )
        .bind(game.phase().to_string())
        .bind(serde_json::to_string(game)?)
        .bind(game.updated_at().naive_utc())
        .bind(game.id())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::GameNotFound(game.id()));
        }
        Ok(())
    }

    async fn delete_game(&self, id: GameId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM games WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_result(&self, record: &GameRecord) -> RepositoryResult<()> {
        let participants: Vec<String> = record
            .participants()
            .iter()
            .map(|participant| participant.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO game_results (game_id, session_id, participants, record, completed_at)
            VALUES ($1, $2, $3, $4::jsonb, $5)
            "#,
        )
        .bind(record.game_id)
        .bind(&record.session_id.0)
        .bind(participants)
        .bind(serde_json::to_string(record)?)
        .bind(record.completed_at.naive_utc())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn records_for_participant(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT record::text AS record FROM game_results
            WHERE $1 = ANY(participants)
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(participant.as_str())
        .bind(sql_limit(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        parse_records(rows)
    }

    async fn records_for_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> RepositoryResult<Vec<GameRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT record::text AS record FROM game_results
            WHERE session_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(&session_id.0)
        .bind(sql_limit(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        parse_records(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        payouts::Settlement,
        rules::GameRules,
        testing::{pid, stacked},
    };

    fn completed_game(session: &str, players: &[(&str, u32)]) -> (Game, GameRecord) {
        let mut game = Game::with_deck(
            SessionId::from(session),
            GameRules::default(),
            crate::game::entities::Deck::new(1),
        );
        for (name, bet) in players {
            game.add_participant(pid(name), *bet).unwrap();
        }
        game.start_dealing().unwrap();
        game.force_complete().unwrap();
        let settlement: Settlement = game.resolve_payouts().unwrap();
        let record = GameRecord::new(&game, &settlement);
        (game, record)
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let repo = InMemoryGameRepository::new();
        let mut game = stacked(&[("alice", 10)], "10S 9H 7D 10C");

        repo.create_game(&game).await.unwrap();
        assert!(matches!(
            repo.create_game(&game).await,
            Err(RepositoryError::GameAlreadyExists(_))
        ));

        game.start_dealing().unwrap();
        repo.update_game(&game).await.unwrap();
        let loaded = repo.get_game(game.id()).await.unwrap().unwrap();
        assert_eq!(loaded.phase(), game.phase());

        assert!(repo.delete_game(game.id()).await.unwrap());
        assert!(!repo.delete_game(game.id()).await.unwrap());
        assert!(repo.get_game(game.id()).await.unwrap().is_none());
        assert!(matches!(
            repo.update_game(&game).await,
            Err(RepositoryError::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_records_by_participant_and_session() {
        let repo = InMemoryGameRepository::new();
        let (_, first) = completed_game("room-1", &[("alice", 10)]);
        let (_, second) = completed_game("room-1", &[("alice", 10), ("bob", 10)]);
        let (_, third) = completed_game("room-2", &[("bob", 10)]);
        for record in [&first, &second, &third] {
            repo.record_result(record).await.unwrap();
        }

        let alice = repo.records_for_participant(&pid("alice"), 10).await.unwrap();
        assert_eq!(
            alice.iter().map(|r| r.game_id).collect::<Vec<_>>(),
            vec![second.game_id, first.game_id]
        );
        let bob = repo.records_for_participant(&pid("bob"), 1).await.unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].game_id, third.game_id);

        let room = repo
            .records_for_session(&SessionId::from("room-1"), 10)
            .await
            .unwrap();
        assert_eq!(room.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
    async fn test_pg_game_round_trip() {
        use crate::db::{Database, DatabaseConfig};

        let db = Database::new(&DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        let repo = PgGameRepository::new(Arc::new(db.pool().clone()));
        let (game, record) = completed_game("pg-room", &[("pg_alice", 10)]);

        repo.create_game(&game).await.unwrap();
        let loaded = repo.get_game(game.id()).await.unwrap().unwrap();
        assert_eq!(loaded.dealer(), game.dealer());
        repo.record_result(&record).await.unwrap();
        let records = repo
            .records_for_participant(&pid("pg_alice"), 1)
            .await
            .unwrap();
        assert_eq!(records[0].game_id, game.id());
        assert!(repo.delete_game(game.id()).await.unwrap());
    }
}
