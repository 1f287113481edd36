use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use tracing::{info, warn};

use crate::builder::{build_bracket, build_team_bracket};
use crate::config::EngineConfig;
use crate::eligibility::{self, OpenWagers};
use crate::error::{BracketError, ServiceError, StoreError};
use crate::mutator;
use crate::store::SnapshotStore;
use crate::types::{
    BracketStructure, EligibilityVerdict, EliminationType, Match, MatchId, MatchReport, Participant, ParticipantId,
    Team, TournamentId, Versioned,
};

type TournamentLocks = Mutex<HashMap<TournamentId, Arc<tokio::sync::Mutex<()>>>>;

/// Front door for callers that hold a tournament id rather than a snapshot.
/// Writes for one tournament are serialized in-process and guarded by a
/// revision check against the store.
pub struct TournamentService<S> {
    store: S,
    config: EngineConfig,
    locks: TournamentLocks,
}

impl<S: SnapshotStore> TournamentService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        TournamentService {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Bracket lifecycle ──────────────────────────────────────────────

    pub async fn create_tournament(
        &self,
        tournament: &TournamentId,
        participants: &[Participant],
        elimination_type: EliminationType,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        let bracket = build_bracket(participants, elimination_type, Utc::now())?;
        self.insert_new(tournament, bracket).await
    }

    pub async fn create_team_tournament(
        &self,
        tournament: &TournamentId,
        participants: &[Participant],
        teams: &[Team],
        elimination_type: EliminationType,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        let bracket = build_team_bracket(participants, teams, elimination_type, Utc::now())?;
        self.insert_new(tournament, bracket).await
    }

    pub async fn snapshot(&self, tournament: &TournamentId) -> Result<Versioned<BracketStructure>, ServiceError> {
        self.timed(tournament, self.store.load(tournament)).await
    }

    pub async fn report_result(
        &self,
        tournament: &TournamentId,
        report: &MatchReport,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        self.mutate(tournament, |bracket| mutator::apply_report(bracket, report, Utc::now()))
            .await
    }

    pub async fn start_match(
        &self,
        tournament: &TournamentId,
        match_id: MatchId,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        self.mutate(tournament, |bracket| mutator::start_match(bracket, match_id, Utc::now()))
            .await
    }

    pub async fn remove_participant(
        &self,
        tournament: &TournamentId,
        participant: &ParticipantId,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        self.mutate(tournament, |bracket| {
            mutator::handle_participant_removal(bracket, participant, Utc::now())
        })
        .await
    }

    pub async fn flag_for_admin(
        &self,
        tournament: &TournamentId,
        match_id: MatchId,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        self.mutate(tournament, |bracket| mutator::mark_match_as_requires_admin(bracket, match_id))
            .await
    }

    // ── Wagering reads ─────────────────────────────────────────────────

    pub async fn biddable_matches(&self, tournament: &TournamentId) -> Result<Vec<Match>, ServiceError> {
        let snapshot = self.snapshot(tournament).await?;
        Ok(snapshot.value.biddable_matches().into_iter().cloned().collect())
    }

    pub async fn check_eligibility(
        &self,
        tournament: &TournamentId,
        bettor: &ParticipantId,
        match_id: MatchId,
    ) -> Result<EligibilityVerdict, ServiceError> {
        let snapshot = self.snapshot(tournament).await?;
        Ok(eligibility::resolve_eligibility(
            &snapshot.value,
            bettor,
            match_id,
            self.config.reachability_depth,
        ))
    }

    pub async fn evaluate_wager(
        &self,
        tournament: &TournamentId,
        bettor: &ParticipantId,
        match_id: MatchId,
        open_wagers: &(impl OpenWagers + Sync),
    ) -> Result<EligibilityVerdict, ServiceError> {
        let snapshot = self.snapshot(tournament).await?;
        Ok(eligibility::evaluate_wager(
            &snapshot.value,
            bettor,
            match_id,
            open_wagers,
            self.config.reachability_depth,
        ))
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn lock_for(&self, tournament: &TournamentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        guard.entry(tournament.clone()).or_default().clone()
    }

    // Clones are only taken under the map lock, so a count of two (map + ours)
    // means nobody else is queued on this tournament.
    fn release_lock(&self, tournament: &TournamentId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut guard = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(&lock) <= 2 {
            guard.remove(tournament);
        }
    }

    async fn timed<T>(
        &self,
        tournament: &TournamentId,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.config.store_timeout(), op).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(tournament = %tournament, timeout_ms = self.config.store_timeout_ms, "store call timed out");
                Err(ServiceError::Timeout(tournament.clone()))
            }
        }
    }

    async fn insert_new(
        &self,
        tournament: &TournamentId,
        bracket: BracketStructure,
    ) -> Result<Versioned<BracketStructure>, ServiceError> {
        let revision = self.timed(tournament, self.store.insert(tournament, bracket.clone())).await?;
        info!(
            tournament = %tournament,
            participants = bracket.participants.len(),
            rounds = bracket.total_rounds,
            "tournament created"
        );
        Ok(Versioned { revision, value: bracket })
    }

    /// Read, apply one pure mutation, write back if nobody else wrote first.
    /// A bracket error is final; only revision conflicts are retried.
    async fn mutate<F>(&self, tournament: &TournamentId, apply: F) -> Result<Versioned<BracketStructure>, ServiceError>
    where
        F: Fn(&BracketStructure) -> Result<BracketStructure, BracketError>,
    {
        let lock = self.lock_for(tournament);
        let serial = lock.lock().await;
        let outcome = self.mutate_serialized(tournament, apply).await;
        drop(serial);
        self.release_lock(tournament, lock);
        outcome
    }

    async fn mutate_serialized<F>(
        &self,
        tournament: &TournamentId,
        apply: F,
    ) -> Result<Versioned<BracketStructure>, ServiceError>
    where
        F: Fn(&BracketStructure) -> Result<BracketStructure, BracketError>,
    {
        let attempts = self.config.max_cas_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let current = self.timed(tournament, self.store.load(tournament)).await?;
            let next = apply(&current.value)?;
            let write = self.store.compare_and_swap(tournament, current.revision, next.clone());
            match self.timed(tournament, write).await {
                Ok(revision) => return Ok(Versioned { revision, value: next }),
                Err(ServiceError::Store(StoreError::Conflict { expected, actual, .. })) => {
                    warn!(
                        tournament = %tournament,
                        attempt,
                        expected,
                        actual,
                        "snapshot changed during mutation, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(ServiceError::RetriesExhausted {
            tournament: tournament.clone(),
            attempts,
        })
    }
}
