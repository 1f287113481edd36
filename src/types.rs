use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex},
};

// ── Constants ──────────────────────────────────────────────────────────

pub const MIN_PARTICIPANTS: usize = 2;
pub const LEGACY_REACHABILITY_DEPTH: u32 = 10;
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 5;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedSnapshots = Arc<Mutex<std::collections::HashMap<TournamentId, Versioned<BracketStructure>>>>;

// ── Identifiers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TournamentId(pub String);

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        ParticipantId(value.to_string())
    }
}

impl From<&str> for TournamentId {
    fn from(value: &str) -> Self {
        TournamentId(value.to_string())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for TournamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Participants & teams ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub seed: u32,
    #[serde(default)]
    pub eliminated: bool,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, seed: u32) -> Self {
        Participant {
            id: ParticipantId(id.into()),
            name: name.into(),
            seed,
            eliminated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub members: [ParticipantId; 2],
    pub seed: u32,
}

impl Team {
    pub fn new(first: &Participant, second: &Participant, seed: u32) -> Self {
        let mut members = [first.id.clone(), second.id.clone()];
        members.sort();
        Team {
            id: Team::derive_id(&members[0], &members[1]),
            name: format!("{} & {}", first.name, second.name),
            members,
            seed,
        }
    }

    pub fn derive_id(a: &ParticipantId, b: &ParticipantId) -> TeamId {
        if a <= b {
            TeamId(format!("{a}+{b}"))
        } else {
            TeamId(format!("{b}+{a}"))
        }
    }

    pub fn has_member(&self, participant: &ParticipantId) -> bool {
        self.members.iter().any(|m| m == participant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Contender {
    Participant(ParticipantId),
    Team(TeamId),
}

impl fmt::Display for Contender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contender::Participant(id) => write!(f, "participant {id}"),
            Contender::Team(id) => write!(f, "team {id}"),
        }
    }
}

impl From<ParticipantId> for Contender {
    fn from(value: ParticipantId) -> Self {
        Contender::Participant(value)
    }
}

impl From<TeamId> for Contender {
    fn from(value: TeamId) -> Self {
        Contender::Team(value)
    }
}

// ── Matches ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EliminationType {
    #[default]
    Single,
    // Built as single elimination with no losers bracket.
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VictoryType {
    Normal,
    Forfeit,
    Bye,
    AdminOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Ready,
    Active,
    Completed,
    RequiresAdmin,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Ready => "ready",
            MatchStatus::Active => "active",
            MatchStatus::Completed => "completed",
            MatchStatus::RequiresAdmin => "requires_admin",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub round_number: u32,
    pub match_number: u32,
    pub player1: Option<Contender>,
    pub player2: Option<Contender>,
    pub winner: Option<Contender>,
    pub loser: Option<Contender>,
    pub victory_type: Option<VictoryType>,
    pub status: MatchStatus,
    pub is_bye: bool,
    pub next_match_id: Option<MatchId>,
    pub admin_override: bool,
    pub admin_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn empty(id: MatchId, round_number: u32, match_number: u32) -> Self {
        Match {
            id,
            round_number,
            match_number,
            player1: None,
            player2: None,
            winner: None,
            loser: None,
            victory_type: None,
            status: MatchStatus::Pending,
            is_bye: false,
            next_match_id: None,
            admin_override: false,
            admin_id: None,
            started_at: None,
            completed_at: None,
        }
    }

    // Parity picks the slot in the next match.
    pub fn index_in_round(&self) -> u32 {
        self.match_number.saturating_sub(1)
    }

    pub fn slots(&self) -> [Option<&Contender>; 2] {
        [self.player1.as_ref(), self.player2.as_ref()]
    }

    pub fn slot_mut(&mut self, slot: usize) -> &mut Option<Contender> {
        if slot == 0 {
            &mut self.player1
        } else {
            &mut self.player2
        }
    }

    pub fn has_contender(&self, contender: &Contender) -> bool {
        self.slots().iter().any(|slot| *slot == Some(contender))
    }

    pub fn opponent_of(&self, contender: &Contender) -> Option<&Contender> {
        match (self.player1.as_ref(), self.player2.as_ref()) {
            (Some(a), b) if a == contender => b,
            (a, Some(b)) if b == contender => a,
            _ => None,
        }
    }

    pub fn both_slots_filled(&self) -> bool {
        self.player1.is_some() && self.player2.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn is_dead(&self) -> bool {
        self.is_completed() && self.winner.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_number: u32,
    pub name: String,
    pub match_ids: Vec<MatchId>,
    pub is_complete: bool,
}

// ── Bracket ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketStructure {
    pub elimination_type: EliminationType,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub teams: Vec<Team>,
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub losers_rounds: Vec<Round>,
    pub matches: BTreeMap<MatchId, Match>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub winner: Option<Contender>,
}

impl BracketStructure {
    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.matches.get(&id)
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }

    pub fn round_matches(&self, round_number: u32) -> Vec<&Match> {
        self.round(round_number)
            .map(|round| round.match_ids.iter().filter_map(|id| self.matches.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn final_match(&self) -> Option<&Match> {
        self.matches.values().find(|m| m.next_match_id.is_none())
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn is_team_mode(&self) -> bool {
        !self.teams.is_empty()
    }

    pub fn contender_for(&self, participant: &ParticipantId) -> Option<Contender> {
        if self.is_team_mode() {
            self.teams
                .iter()
                .find(|team| team.has_member(participant))
                .map(|team| Contender::Team(team.id.clone()))
        } else {
            self.participant(participant)
                .map(|p| Contender::Participant(p.id.clone()))
        }
    }

    pub fn current_match_for(&self, contender: &Contender) -> Option<&Match> {
        self.matches
            .values()
            .filter(|m| !m.is_completed() && m.has_contender(contender))
            .min_by_key(|m| (m.round_number, m.match_number))
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some() || self.matches.values().all(|m| m.is_completed())
    }

    pub fn biddable_matches(&self) -> Vec<&Match> {
        self.matches
            .values()
            .filter(|m| matches!(m.status, MatchStatus::Pending | MatchStatus::Ready) && !m.is_bye)
            .collect()
    }
}

// ── Reports & verdicts ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverride {
    pub admin_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub match_id: MatchId,
    pub winner_id: Contender,
    #[serde(default)]
    pub loser_id: Option<Contender>,
    pub victory_type: VictoryType,
    #[serde(default)]
    pub admin_override: Option<AdminOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DenialReason {
    MatchNotFound,
    NotBiddable,
    SelfParticipation,
    ImmediateNextOpponent,
    SharedSuccessor,
    ForwardReachable,
    ExistingWager,
}

impl DenialReason {
    pub fn describe(self) -> &'static str {
        match self {
            DenialReason::MatchNotFound => "Match does not exist in this bracket.",
            DenialReason::NotBiddable => "Match is not open for wagers.",
            DenialReason::SelfParticipation => "You cannot bet on a match you are playing in.",
            DenialReason::ImmediateNextOpponent => {
                "The winner of this match is your next opponent."
            }
            DenialReason::SharedSuccessor => {
                "The winner of this match meets the winner of your match next round."
            }
            DenialReason::ForwardReachable => "You could face the winner of this match later on.",
            DenialReason::ExistingWager => "You already have an open wager on this match.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityVerdict {
    pub allowed: bool,
    pub reason: String,
    pub denial: Option<DenialReason>,
}

impl EligibilityVerdict {
    pub fn allow() -> Self {
        EligibilityVerdict {
            allowed: true,
            reason: "Eligible to wager on this match.".to_string(),
            denial: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        EligibilityVerdict {
            allowed: false,
            reason: reason.describe().to_string(),
            denial: Some(reason),
        }
    }
}

// ── Store records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioned<T> {
    pub revision: u64,
    pub value: T,
}
