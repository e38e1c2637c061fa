//! Session-keyed registry of active games.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

use crate::game::{
    UserError,
    entities::SessionId,
    state_machine::{Game, GameId},
};

/// A registered game. Every action locks it for its whole duration.
pub type GameHandle = Arc<Mutex<Game>>;

#[derive(Clone)]
struct Entry {
    game_id: GameId,
    handle: GameHandle,
}

/// At most one active game per session.
///
/// The map lock is only ever held for the lookup or insert itself, never
/// across a game lock.
#[derive(Default)]
pub struct GameRegistry {
    games: RwLock<HashMap<SessionId, Entry>>,
}

impl GameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `game` under its session unless that session already has
    /// one.
    ///
    /// # Errors
    ///
    /// `UserError::GameAlreadyActive`
    pub async fn create_if_absent(&self, game: Game) -> Result<GameHandle, UserError> {
        let mut games = self.games.write().await;
        if games.contains_key(game.session_id()) {
            return Err(UserError::GameAlreadyActive);
        }
        let session_id = game.session_id().clone();
        let entry = Entry {
            game_id: game.id(),
            handle: Arc::new(Mutex::new(game)),
        };
        let handle = entry.handle.clone();
        games.insert(session_id, entry);
        Ok(handle)
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<GameHandle> {
        self.games
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.handle.clone())
    }

    /// Unregisters the session's game if it is still `game_id`. Returns
    /// whether anything was removed.
    pub async fn remove(&self, session_id: &SessionId, game_id: GameId) -> bool {
        let mut games = self.games.write().await;
        match games.get(session_id) {
            Some(entry) if entry.game_id == game_id => {
                games.remove(session_id);
                log::info!("Game {game_id} removed from session {session_id}");
                true
            }
            _ => false,
        }
    }

    pub async fn sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self.games.read().await.keys().cloned().collect();
        sessions.sort();
        sessions
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}
