//! Per-participant serialization of multi-step wallet sequences.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::game::entities::ParticipantId;

/// One async mutex per participant, created on first use. Holding the
/// guard keeps every other sequence for the same participant out, across
/// all games.
///
/// Entries nobody holds or waits on are pruned on the next `lock` call, so
/// the map only grows with the number of participants active at once.
#[derive(Debug, Default)]
pub struct ParticipantLocks {
    locks: Mutex<HashMap<ParticipantId, Arc<Mutex<()>>>>,
}

impl ParticipantLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, participant: &ParticipantId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|id, lock| id == participant || Arc::strong_count(lock) > 1);
            locks.entry(participant.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_participant_is_serialized() {
        let locks = Arc::new(ParticipantLocks::new());
        let alice = ParticipantId::new("alice");
        let guard = locks.lock(&alice).await;

        let waiter = {
            let locks = locks.clone();
            let alice = alice.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&alice).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_participants_do_not_block() {
        let locks = ParticipantLocks::new();
        let _alice = locks.lock(&ParticipantId::new("alice")).await;
        let _bob = locks.lock(&ParticipantId::new("bob")).await;
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = ParticipantLocks::new();
        for i in 0..10 {
            let _guard = locks.lock(&ParticipantId::new(&format!("player{i}"))).await;
        }
        let alice = locks.lock(&ParticipantId::new("alice")).await;
        let _bob = locks.lock(&ParticipantId::new("bob")).await;
        // Alice is still held, the ten released players are gone.
        assert_eq!(locks.tracked().await, 2);
        drop(alice);
    }
}
