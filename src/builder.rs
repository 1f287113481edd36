use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::BracketError;
use crate::geometry::{round_name, seed_order, total_rounds_for};
use crate::match_state;
use crate::mutator::{propagate, refresh_progress};
use crate::types::{
  BracketStructure, Contender, EliminationType, Match, MatchId, MatchStatus, Participant, Round, Team,
  MIN_PARTICIPANTS,
};

struct SeededEntry {
  contender: Contender,
  seed: u32,
}

pub fn build_bracket(
  participants: &[Participant],
  elimination_type: EliminationType,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  let mut seen = HashSet::new();
  for participant in participants {
    if !seen.insert(&participant.id) {
      return Err(BracketError::DuplicateContender(participant.id.to_string()));
    }
  }
  let entries = participants
    .iter()
    .map(|p| SeededEntry {
      contender: Contender::Participant(p.id.clone()),
      seed: p.seed,
    })
    .collect();
  build_from_entries(entries, sorted_roster(participants), Vec::new(), elimination_type, now)
}

pub fn build_team_bracket(
  participants: &[Participant],
  teams: &[Team],
  elimination_type: EliminationType,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  let known: HashSet<_> = participants.iter().map(|p| &p.id).collect();
  let mut team_ids = HashSet::new();
  let mut placed = HashSet::new();
  for team in teams {
    if !team_ids.insert(&team.id) {
      return Err(BracketError::DuplicateContender(team.id.to_string()));
    }
    for member in &team.members {
      if !known.contains(member) {
        return Err(BracketError::ParticipantNotFound(member.clone()));
      }
      if !placed.insert(member) {
        return Err(BracketError::DuplicateContender(member.to_string()));
      }
    }
  }
  let entries = teams
    .iter()
    .map(|t| SeededEntry {
      contender: Contender::Team(t.id.clone()),
      seed: t.seed,
    })
    .collect();
  let mut sorted_teams = teams.to_vec();
  sorted_teams.sort_by_key(|t| t.seed);
  build_from_entries(entries, sorted_roster(participants), sorted_teams, elimination_type, now)
}

fn sorted_roster(participants: &[Participant]) -> Vec<Participant> {
  let mut roster = participants.to_vec();
  roster.sort_by_key(|p| p.seed);
  roster
}

fn build_from_entries(
  mut entries: Vec<SeededEntry>,
  participants: Vec<Participant>,
  teams: Vec<Team>,
  elimination_type: EliminationType,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  if entries.len() < MIN_PARTICIPANTS {
    return Err(BracketError::TooFewParticipants(entries.len()));
  }
  if elimination_type == EliminationType::Double {
    warn!("double elimination requested; building single elimination with an empty losers bracket");
  }

  entries.sort_by_key(|e| e.seed);
  let entrant_count = entries.len();
  let total_rounds = total_rounds_for(entrant_count);
  let bracket_size = 1usize << total_rounds;

  let mut ranked: Vec<Option<Contender>> = entries.into_iter().map(|e| Some(e.contender)).collect();
  let mut slots: Vec<Option<Contender>> = seed_order(bracket_size)
    .into_iter()
    .map(|seed| ranked.get_mut(seed as usize - 1).and_then(Option::take))
    .collect();

  let mut matches = BTreeMap::new();
  let mut rounds: Vec<Round> = Vec::with_capacity(total_rounds as usize);
  let mut next_id = 1u64;
  for round_number in 1..=total_rounds {
    let count = bracket_size >> round_number;
    let mut ids = Vec::with_capacity(count);
    for index in 0..count {
      let id = push_match(&mut matches, &mut next_id, round_number, index as u32 + 1);
      ids.push(id);
    }
    rounds.push(Round {
      round_number,
      name: round_name(round_number, total_rounds),
      match_ids: ids,
      is_complete: false,
    });
  }

  for pair in rounds.windows(2) {
    let (current, following) = (&pair[0], &pair[1]);
    for (index, id) in current.match_ids.iter().enumerate() {
      if let Some(m) = matches.get_mut(id) {
        m.next_match_id = following.match_ids.get(index / 2).copied();
      }
    }
  }

  let mut byes = Vec::new();
  for (index, id) in rounds[0].match_ids.iter().enumerate() {
    let Some(m) = matches.get_mut(id) else {
      continue;
    };
    m.player1 = slots[index * 2].take();
    m.player2 = slots[index * 2 + 1].take();
    debug_assert!(
      m.player1.is_some() || m.player2.is_some(),
      "a first-round match can never be empty on both sides"
    );
    if m.both_slots_filled() {
      match_state::refresh_readiness(m);
    } else {
      match_state::finalize_bye(m, now);
      byes.push(m.id);
    }
  }

  let mut bracket = BracketStructure {
    elimination_type,
    participants,
    teams,
    rounds,
    losers_rounds: Vec::new(),
    matches,
    current_round: 1,
    total_rounds,
    winner: None,
  };

  for id in &byes {
    propagate(&mut bracket, *id, now)?;
  }
  refresh_progress(&mut bracket);

  let ready = bracket
    .matches
    .values()
    .filter(|m| m.status == MatchStatus::Ready)
    .count();
  debug!(ready, "first matches ready");
  info!(
    entrants = entrant_count,
    bracket_size,
    rounds = total_rounds,
    byes = byes.len(),
    "bracket built"
  );
  Ok(bracket)
}

fn push_match(matches: &mut BTreeMap<MatchId, Match>, next_id: &mut u64, round_number: u32, match_number: u32) -> MatchId {
  let id = MatchId(*next_id);
  *next_id += 1;
  matches.insert(id, Match::empty(id, round_number, match_number));
  id
}
