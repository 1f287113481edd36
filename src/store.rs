use std::future::Future;

use crate::error::StoreError;
use crate::types::{BracketStructure, SharedSnapshots, TournamentId, Versioned};

/// Persistence for bracket snapshots. Every write carries the revision the
/// caller read so concurrent writers cannot silently overwrite each other.
pub trait SnapshotStore: Send + Sync {
    fn load(
        &self,
        tournament: &TournamentId,
    ) -> impl Future<Output = Result<Versioned<BracketStructure>, StoreError>> + Send;

    fn insert(
        &self,
        tournament: &TournamentId,
        bracket: BracketStructure,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn compare_and_swap(
        &self,
        tournament: &TournamentId,
        expected: u64,
        bracket: BracketStructure,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: SharedSnapshots,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_now(&self, tournament: &TournamentId) -> Result<Versioned<BracketStructure>, StoreError> {
        let guard = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .get(tournament)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(tournament.clone()))
    }

    fn insert_now(&self, tournament: &TournamentId, bracket: BracketStructure) -> Result<u64, StoreError> {
        let mut guard = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(tournament) {
            return Err(StoreError::AlreadyExists(tournament.clone()));
        }
        guard.insert(tournament.clone(), Versioned { revision: 1, value: bracket });
        Ok(1)
    }

    fn swap_now(&self, tournament: &TournamentId, expected: u64, bracket: BracketStructure) -> Result<u64, StoreError> {
        let mut guard = self.snapshots.lock().unwrap_or_else(|e| e.into_inner());
        let entry = guard
            .get_mut(tournament)
            .ok_or_else(|| StoreError::NotFound(tournament.clone()))?;
        if entry.revision != expected {
            return Err(StoreError::Conflict {
                tournament: tournament.clone(),
                expected,
                actual: entry.revision,
            });
        }
        entry.revision += 1;
        entry.value = bracket;
        Ok(entry.revision)
    }
}

impl SnapshotStore for MemoryStore {
    fn load(
        &self,
        tournament: &TournamentId,
    ) -> impl Future<Output = Result<Versioned<BracketStructure>, StoreError>> + Send {
        async move { self.load_now(tournament) }
    }

    fn insert(
        &self,
        tournament: &TournamentId,
        bracket: BracketStructure,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        async move { self.insert_now(tournament, bracket) }
    }

    fn compare_and_swap(
        &self,
        tournament: &TournamentId,
        expected: u64,
        bracket: BracketStructure,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        async move { self.swap_now(tournament, expected, bracket) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_bracket;
    use crate::types::{EliminationType, Participant};
    use chrono::Utc;

    fn bracket() -> BracketStructure {
        let roster: Vec<Participant> = (1..=4)
            .map(|seed| Participant::new(format!("p{seed}"), format!("Player {seed}"), seed))
            .collect();
        build_bracket(&roster, EliminationType::Single, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = MemoryStore::new();
        let id = TournamentId::from("weekly-12");
        assert_eq!(store.insert(&id, bracket()).await.unwrap(), 1);
        assert_eq!(store.len(), 1);

        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.value.total_rounds, 2);

        let dup = store.insert(&id, bracket()).await.unwrap_err();
        assert_eq!(dup, StoreError::AlreadyExists(id.clone()));
        let missing = store.load(&TournamentId::from("nope")).await.unwrap_err();
        assert_eq!(missing, StoreError::NotFound(TournamentId::from("nope")));
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_revision() {
        let store = MemoryStore::new();
        let id = TournamentId::from("weekly-13");
        store.insert(&id, bracket()).await.unwrap();

        let mut next = bracket();
        next.current_round = 2;
        assert_eq!(store.compare_and_swap(&id, 1, next.clone()).await.unwrap(), 2);

        let err = store.compare_and_swap(&id, 1, bracket()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                tournament: id.clone(),
                expected: 1,
                actual: 2,
            }
        );
        // The losing write left nothing behind.
        assert_eq!(store.load(&id).await.unwrap().value.current_round, 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.insert(&TournamentId::from("t"), bracket()).await.unwrap();
        assert!(!other.is_empty());
    }
}
