use crate::types::{Contender, MatchId, MatchStatus, ParticipantId, TournamentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    InconsistentState,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BracketError {
    #[error("a bracket needs at least two participants, got {0}")]
    TooFewParticipants(usize),
    #[error("{0} appears more than once in the entry list")]
    DuplicateContender(String),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("participant {0} not found in this bracket")]
    ParticipantNotFound(ParticipantId),
    #[error("{contender} is not in match {match_id}")]
    ContenderNotInMatch { match_id: MatchId, contender: Contender },
    #[error("match {0} has no opponent to play against")]
    MissingOpponent(MatchId),
    #[error("match {0} is already completed")]
    MatchAlreadyCompleted(MatchId),
    #[error("slot {slot} of match {match_id} is already taken by {occupant}")]
    SlotCollision { match_id: MatchId, slot: usize, occupant: Contender },
    #[error("bracket already has a result; no further changes are accepted")]
    BracketFinished,
    #[error("match {match_id} cannot go from {from} to {to}")]
    InvalidTransition { match_id: MatchId, from: MatchStatus, to: MatchStatus },
    #[error("match {0} is waiting on an admin decision")]
    RequiresAdmin(MatchId),
}

impl BracketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BracketError::TooFewParticipants(_)
            | BracketError::DuplicateContender(_)
            | BracketError::MatchNotFound(_)
            | BracketError::ParticipantNotFound(_)
            | BracketError::ContenderNotInMatch { .. }
            | BracketError::MissingOpponent(_) => ErrorKind::Input,
            BracketError::MatchAlreadyCompleted(_)
            | BracketError::SlotCollision { .. }
            | BracketError::BracketFinished
            | BracketError::InvalidTransition { .. }
            | BracketError::RequiresAdmin(_) => ErrorKind::InconsistentState,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("tournament {0} has no bracket")]
    NotFound(TournamentId),
    #[error("tournament {0} already has a bracket")]
    AlreadyExists(TournamentId),
    #[error("revision conflict on {tournament}: expected {expected}, found {actual}")]
    Conflict { tournament: TournamentId, expected: u64, actual: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Bracket(#[from] BracketError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("store round-trip for {0} timed out")]
    Timeout(TournamentId),
    #[error("gave up on {tournament} after {attempts} conflicting writes")]
    RetriesExhausted { tournament: TournamentId, attempts: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("parse config {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}
