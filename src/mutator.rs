//! Applies results to a bracket. Every public operation takes the current
//! snapshot by reference and returns a new one; on error the caller's
//! snapshot is untouched.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::BracketError;
use crate::match_state;
use crate::types::{
  AdminOverride, BracketStructure, Contender, Match, MatchId, MatchReport, MatchStatus, ParticipantId, VictoryType,
};

#[derive(Clone, Debug)]
enum SlotState {
  Filled(Contender),
  Awaiting,
  Phantom,
}

pub fn advance_winner(
  bracket: &BracketStructure,
  match_id: MatchId,
  winner: &Contender,
  loser: Option<&Contender>,
  victory_type: VictoryType,
  admin_override: Option<&AdminOverride>,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  let mut next = bracket.clone();
  record_result(&mut next, match_id, winner, loser, victory_type, admin_override, false, now)?;
  refresh_progress(&mut next);
  info!(
    match_id = %match_id,
    winner = %winner,
    victory = ?victory_type,
    admin = admin_override.map(|a| a.admin_id.as_str()),
    current_round = next.current_round,
    "match result recorded"
  );
  Ok(next)
}

pub fn apply_report(
  bracket: &BracketStructure,
  report: &MatchReport,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  advance_winner(
    bracket,
    report.match_id,
    &report.winner_id,
    report.loser_id.as_ref(),
    report.victory_type,
    report.admin_override.as_ref(),
    now,
  )
}

/// Disqualification or disconnect. The participant's open match is forfeited
/// to the opponent, or closed with no winner when no opponent has arrived yet.
pub fn handle_participant_removal(
  bracket: &BracketStructure,
  participant_id: &ParticipantId,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  let contender = bracket
    .contender_for(participant_id)
    .ok_or_else(|| BracketError::ParticipantNotFound(participant_id.clone()))?;
  if bracket.is_finished() {
    return Err(BracketError::BracketFinished);
  }

  let mut next = bracket.clone();
  let current = next
    .current_match_for(&contender)
    .map(|m| (m.id, m.opponent_of(&contender).cloned()));

  match current {
    Some((match_id, Some(opponent))) => {
      record_result(
        &mut next,
        match_id,
        &opponent,
        Some(&contender),
        VictoryType::Forfeit,
        None,
        true,
        now,
      )?;
      info!(match_id = %match_id, removed = %contender, winner = %opponent, "forfeit awarded");
    }
    Some((match_id, None)) => {
      let m = next
        .matches
        .get_mut(&match_id)
        .ok_or(BracketError::MatchNotFound(match_id))?;
      match_state::mark_dead(m, Some(contender.clone()), now)?;
      propagate(&mut next, match_id, now)?;
      info!(match_id = %match_id, removed = %contender, "match forfeited with no opponent assigned");
    }
    None => {
      debug!(removed = %contender, "no unresolved match for removed contender");
    }
  }

  mark_eliminated(&mut next, &contender);
  refresh_progress(&mut next);
  Ok(next)
}

pub fn mark_match_as_requires_admin(
  bracket: &BracketStructure,
  match_id: MatchId,
) -> Result<BracketStructure, BracketError> {
  let mut next = bracket.clone();
  let m = next
    .matches
    .get_mut(&match_id)
    .ok_or(BracketError::MatchNotFound(match_id))?;
  match_state::require_admin(m)?;
  warn!(match_id = %match_id, "match flagged for admin resolution");
  Ok(next)
}

pub fn start_match(
  bracket: &BracketStructure,
  match_id: MatchId,
  now: DateTime<Utc>,
) -> Result<BracketStructure, BracketError> {
  let mut next = bracket.clone();
  let m = next
    .matches
    .get_mut(&match_id)
    .ok_or(BracketError::MatchNotFound(match_id))?;
  match_state::start(m, now)?;
  debug!(match_id = %match_id, "match started");
  Ok(next)
}

#[allow(clippy::too_many_arguments)]
fn record_result(
  bracket: &mut BracketStructure,
  match_id: MatchId,
  winner: &Contender,
  loser: Option<&Contender>,
  victory_type: VictoryType,
  admin: Option<&AdminOverride>,
  release_hold: bool,
  now: DateTime<Utc>,
) -> Result<(), BracketError> {
  let opponent = {
    let m = bracket
      .matches
      .get(&match_id)
      .ok_or(BracketError::MatchNotFound(match_id))?;
    if m.is_completed() {
      return Err(BracketError::MatchAlreadyCompleted(match_id));
    }
    if bracket.is_finished() {
      return Err(BracketError::BracketFinished);
    }
    if !m.has_contender(winner) {
      return Err(BracketError::ContenderNotInMatch {
        match_id,
        contender: winner.clone(),
      });
    }
    let opponent = m.opponent_of(winner).cloned();
    if let Some(loser) = loser {
      if opponent.as_ref() != Some(loser) {
        return Err(BracketError::ContenderNotInMatch {
          match_id,
          contender: loser.clone(),
        });
      }
    }
    if opponent.is_none() {
      // Walkovers are only legal when the empty side can never be filled.
      let open_slot = if m.player1.is_none() { 0 } else { 1 };
      let phantom = matches!(slot_state(bracket, m, open_slot), SlotState::Phantom);
      if victory_type == VictoryType::Normal || !phantom {
        return Err(BracketError::MissingOpponent(match_id));
      }
    }
    opponent
  };

  let m = bracket
    .matches
    .get_mut(&match_id)
    .ok_or(BracketError::MatchNotFound(match_id))?;
  match_state::complete(
    m,
    Some(winner.clone()),
    opponent.clone(),
    victory_type,
    admin,
    release_hold,
    now,
  )?;
  if let Some(loser) = &opponent {
    mark_eliminated(bracket, loser);
  }
  propagate(bracket, match_id, now)
}

/// Pushes the outcome of a completed match forward, settling every match
/// downstream that can now be decided without play.
pub(crate) fn propagate(bracket: &mut BracketStructure, source: MatchId, now: DateTime<Utc>) -> Result<(), BracketError> {
  let mut cursor = Some(source);
  while let Some(id) = cursor.take() {
    let (next_id, slot, winner) = {
      let m = bracket.matches.get(&id).ok_or(BracketError::MatchNotFound(id))?;
      (m.next_match_id, successor_slot(m), m.winner.clone())
    };

    let Some(next_id) = next_id else {
      if let Some(champion) = winner {
        info!(champion = %champion, "bracket decided");
        bracket.winner = Some(champion);
      }
      break;
    };

    let target = bracket
      .matches
      .get_mut(&next_id)
      .ok_or(BracketError::MatchNotFound(next_id))?;

    match winner {
      Some(contender) if target.is_dead() => {
        match_state::late_walkover(target, slot, contender, now)?;
        debug!(match_id = %next_id, "walkover through forfeited match");
        cursor = Some(next_id);
        continue;
      }
      Some(_) if target.is_completed() => {
        return Err(BracketError::MatchAlreadyCompleted(next_id));
      }
      Some(contender) => {
        if let Some(occupant) = target.slot_mut(slot).clone() {
          return Err(BracketError::SlotCollision {
            match_id: next_id,
            slot,
            occupant,
          });
        }
        *target.slot_mut(slot) = Some(contender);
      }
      // A forfeited match that had been waiting on this one is now beyond rescue;
      // its successor needs another look.
      None if target.is_dead() => {
        cursor = Some(next_id);
        continue;
      }
      None => {}
    }

    if settle(bracket, next_id, now)? {
      cursor = Some(next_id);
    }
  }
  Ok(())
}

/// Re-evaluates a match after one of its slots changed. Returns true when the
/// match completed without being played.
fn settle(bracket: &mut BracketStructure, match_id: MatchId, now: DateTime<Utc>) -> Result<bool, BracketError> {
  let (a, b) = {
    let m = bracket
      .matches
      .get(&match_id)
      .ok_or(BracketError::MatchNotFound(match_id))?;
    if m.is_completed() || m.status == MatchStatus::RequiresAdmin {
      return Ok(false);
    }
    (slot_state(bracket, m, 0), slot_state(bracket, m, 1))
  };

  let m = bracket
    .matches
    .get_mut(&match_id)
    .ok_or(BracketError::MatchNotFound(match_id))?;
  match (a, b) {
    (SlotState::Filled(_), SlotState::Filled(_)) => {
      match_state::refresh_readiness(m);
      Ok(false)
    }
    (SlotState::Filled(c), SlotState::Phantom) | (SlotState::Phantom, SlotState::Filled(c)) => {
      match_state::complete(m, Some(c.clone()), None, VictoryType::Forfeit, None, false, now)?;
      debug!(match_id = %match_id, winner = %c, "walkover");
      Ok(true)
    }
    (SlotState::Phantom, SlotState::Phantom) => {
      match_state::mark_dead(m, None, now)?;
      debug!(match_id = %match_id, "no contender can reach this match");
      Ok(true)
    }
    _ => Ok(false),
  }
}

fn slot_state(bracket: &BracketStructure, m: &Match, slot: usize) -> SlotState {
  if let Some(contender) = m.slots()[slot] {
    return SlotState::Filled(contender.clone());
  }
  match feeder_of(bracket, m, slot) {
    Some(feeder) if yields_contender(bracket, feeder) => SlotState::Awaiting,
    _ => SlotState::Phantom,
  }
}

/// Whether a match has sent, or may still send, someone forward.
fn yields_contender(bracket: &BracketStructure, m: &Match) -> bool {
  if !m.is_completed() || m.winner.is_some() {
    return true;
  }
  (0..2).any(|slot| {
    m.slots()[slot].is_none()
      && feeder_of(bracket, m, slot)
        .map(|feeder| yields_contender(bracket, feeder))
        .unwrap_or(false)
  })
}

pub(crate) fn feeder_of<'a>(bracket: &'a BracketStructure, m: &Match, slot: usize) -> Option<&'a Match> {
  if m.round_number < 2 {
    return None;
  }
  let previous = bracket.round(m.round_number - 1)?;
  let index = m.index_in_round() as usize * 2 + slot;
  previous
    .match_ids
    .get(index)
    .and_then(|id| bracket.matches.get(id))
}

fn successor_slot(m: &Match) -> usize {
  (m.index_in_round() % 2) as usize
}

fn mark_eliminated(bracket: &mut BracketStructure, contender: &Contender) {
  let members: Vec<ParticipantId> = match contender {
    Contender::Participant(id) => vec![id.clone()],
    Contender::Team(team_id) => bracket
      .teams
      .iter()
      .find(|team| &team.id == team_id)
      .map(|team| team.members.to_vec())
      .unwrap_or_default(),
  };
  for participant in bracket.participants.iter_mut() {
    if members.contains(&participant.id) {
      participant.eliminated = true;
    }
  }
}

pub(crate) fn refresh_progress(bracket: &mut BracketStructure) {
  let completion: Vec<bool> = bracket
    .rounds
    .iter()
    .map(|round| {
      round
        .match_ids
        .iter()
        .all(|id| bracket.matches.get(id).map(|m| m.is_completed()).unwrap_or(false))
    })
    .collect();
  for (round, complete) in bracket.rounds.iter_mut().zip(completion) {
    round.is_complete = complete;
  }
  bracket.current_round = bracket
    .rounds
    .iter()
    .find(|round| !round.is_complete)
    .map(|round| round.round_number)
    .unwrap_or(bracket.total_rounds);
}
