//! Conflict-of-interest checks for wagers placed by people who are also
//! playing in the bracket.

use std::collections::HashSet;
use tracing::debug;

use crate::config::ReachabilityDepth;
use crate::mutator::feeder_of;
use crate::types::{
  BracketStructure, Contender, DenialReason, EligibilityVerdict, Match, MatchId, MatchStatus, ParticipantId,
};

pub trait OpenWagers {
  fn has_open_wager(&self, bettor: &ParticipantId, match_id: MatchId) -> bool;
}

impl OpenWagers for HashSet<(ParticipantId, MatchId)> {
  fn has_open_wager(&self, bettor: &ParticipantId, match_id: MatchId) -> bool {
    self.contains(&(bettor.clone(), match_id))
  }
}

pub fn is_biddable(m: &Match) -> bool {
  matches!(m.status, MatchStatus::Pending | MatchStatus::Ready) && !m.is_bye
}

/// Decides whether `bettor` may wager on `candidate`. Never fails: an unknown
/// match is reported as a denial.
pub fn resolve_eligibility(
  bracket: &BracketStructure,
  bettor: &ParticipantId,
  candidate: MatchId,
  depth: ReachabilityDepth,
) -> EligibilityVerdict {
  let Some(candidate) = bracket.get_match(candidate) else {
    return EligibilityVerdict::deny(DenialReason::MatchNotFound);
  };
  match bracket.contender_for(bettor) {
    Some(contender) => resolve_for_contender(bracket, &contender, candidate, depth),
    None => EligibilityVerdict::allow(),
  }
}

pub fn resolve_for_contender(
  bracket: &BracketStructure,
  contender: &Contender,
  candidate: &Match,
  depth: ReachabilityDepth,
) -> EligibilityVerdict {
  match first_conflict(bracket, contender, candidate, depth) {
    Some(reason) => {
      debug!(bettor = %contender, match_id = %candidate.id, ?reason, "wager denied");
      EligibilityVerdict::deny(reason)
    }
    None => EligibilityVerdict::allow(),
  }
}

fn first_conflict(
  bracket: &BracketStructure,
  contender: &Contender,
  candidate: &Match,
  depth: ReachabilityDepth,
) -> Option<DenialReason> {
  if candidate.has_contender(contender) {
    return Some(DenialReason::SelfParticipation);
  }

  // Eliminated players and those not yet placed have nothing left to protect.
  let current = bracket.current_match_for(contender)?;

  if current.next_match_id == Some(candidate.id) || pending_feeder(bracket, current) == Some(candidate.id) {
    return Some(DenialReason::ImmediateNextOpponent);
  }
  if current.next_match_id.is_some() && current.next_match_id == candidate.next_match_id {
    return Some(DenialReason::SharedSuccessor);
  }

  let hops = match depth {
    ReachabilityDepth::TotalRounds => bracket.total_rounds.saturating_sub(current.round_number),
    ReachabilityDepth::Fixed(hops) => hops,
  };
  let mut cursor = current.next_match_id;
  for _ in 0..hops {
    let Some(id) = cursor else {
      break;
    };
    if id == candidate.id {
      return Some(DenialReason::ForwardReachable);
    }
    cursor = bracket.get_match(id).and_then(|m| m.next_match_id);
  }
  None
}

/// Unplayed match whose winner will fill the empty side of `current`. Dead
/// feeders are looked through, since a winner walks straight over them.
fn pending_feeder(bracket: &BracketStructure, current: &Match) -> Option<MatchId> {
  let open_slot = current.slots().iter().position(|slot| slot.is_none())?;
  let mut feeder = feeder_of(bracket, current, open_slot)?;
  loop {
    if !feeder.is_completed() {
      return Some(feeder.id);
    }
    if !feeder.is_dead() {
      return None;
    }
    let slot = feeder.slots().iter().position(|slot| slot.is_none())?;
    feeder = feeder_of(bracket, feeder, slot)?;
  }
}

/// Full gate run before any money moves: the match must be open, the bettor
/// must have no conflict, and may hold only one open wager per match.
pub fn evaluate_wager(
  bracket: &BracketStructure,
  bettor: &ParticipantId,
  match_id: MatchId,
  open_wagers: &impl OpenWagers,
  depth: ReachabilityDepth,
) -> EligibilityVerdict {
  let Some(m) = bracket.get_match(match_id) else {
    return EligibilityVerdict::deny(DenialReason::MatchNotFound);
  };
  if !is_biddable(m) {
    return EligibilityVerdict::deny(DenialReason::NotBiddable);
  }
  let verdict = resolve_eligibility(bracket, bettor, match_id, depth);
  if !verdict.allowed {
    return verdict;
  }
  if open_wagers.has_open_wager(bettor, match_id) {
    return EligibilityVerdict::deny(DenialReason::ExistingWager);
  }
  verdict
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::build_bracket;
  use crate::mutator::{advance_winner, handle_participant_removal};
  use crate::types::{EliminationType, Participant, VictoryType};
  use chrono::Utc;

  fn roster(count: u32) -> Vec<Participant> {
    (1..=count)
      .map(|seed| Participant::new(format!("p{seed}"), format!("Player {seed}"), seed))
      .collect()
  }

  fn pid(id: &str) -> ParticipantId {
    ParticipantId::from(id)
  }

  fn c(id: &str) -> Contender {
    Contender::Participant(pid(id))
  }

  fn ids(bracket: &BracketStructure, round: u32) -> Vec<MatchId> {
    bracket.round_matches(round).iter().map(|m| m.id).collect()
  }

  fn check(bracket: &BracketStructure, bettor: &str, match_id: MatchId) -> EligibilityVerdict {
    resolve_eligibility(bracket, &pid(bettor), match_id, ReachabilityDepth::TotalRounds)
  }

  #[test]
  fn test_eight_player_conflicts() {
    // Draw: 1v8, 4v5, 2v7, 3v6.
    let bracket = build_bracket(&roster(8), EliminationType::Single, Utc::now()).unwrap();
    let r1 = ids(&bracket, 1);
    let r2 = ids(&bracket, 2);
    let final_id = ids(&bracket, 3)[0];

    let own = check(&bracket, "p1", r1[0]);
    assert!(!own.allowed);
    assert_eq!(own.denial, Some(DenialReason::SelfParticipation));

    assert_eq!(check(&bracket, "p1", r1[1]).denial, Some(DenialReason::SharedSuccessor));
    assert_eq!(check(&bracket, "p1", r2[0]).denial, Some(DenialReason::ImmediateNextOpponent));
    assert_eq!(check(&bracket, "p1", final_id).denial, Some(DenialReason::ForwardReachable));

    // The other half of the draw is out of reach.
    assert!(check(&bracket, "p1", r1[2]).allowed);
    assert!(check(&bracket, "p1", r1[3]).allowed);
    assert!(check(&bracket, "p1", r2[1]).allowed);
  }

  #[test]
  fn test_waiting_player_cannot_bet_on_their_opponents_match() {
    let now = Utc::now();
    let bracket = build_bracket(&roster(8), EliminationType::Single, now).unwrap();
    let r1 = ids(&bracket, 1);
    let r2 = ids(&bracket, 2);
    assert_eq!(check(&bracket, "p1", r1[1]).denial, Some(DenialReason::SharedSuccessor));

    // 1 beats 8 and now waits on the 4 vs 5 winner.
    let bracket = advance_winner(&bracket, r1[0], &c("p1"), Some(&c("p8")), VictoryType::Normal, None, now).unwrap();
    assert_eq!(check(&bracket, "p1", r1[1]).denial, Some(DenialReason::ImmediateNextOpponent));
    assert_eq!(check(&bracket, "p1", r2[1]).denial, Some(DenialReason::SharedSuccessor));
    assert!(check(&bracket, "p1", r1[2]).allowed);

    // Once the opponent is known the feeder is settled and the check moves on.
    let bracket = advance_winner(&bracket, r1[1], &c("p5"), Some(&c("p4")), VictoryType::Normal, None, now).unwrap();
    assert_eq!(check(&bracket, "p1", r2[0]).denial, Some(DenialReason::SelfParticipation));
    assert!(check(&bracket, "p1", r1[2]).allowed);
  }

  #[test]
  fn test_opponent_feeder_found_through_forfeited_match() {
    let now = Utc::now();
    let bracket = build_bracket(&roster(8), EliminationType::Single, now).unwrap();
    let r1 = ids(&bracket, 1);
    // 3 beats 6 and waits in the lower semi on the 2 vs 7 winner.
    let bracket = advance_winner(&bracket, r1[3], &c("p3"), Some(&c("p6")), VictoryType::Normal, None, now).unwrap();
    assert_eq!(check(&bracket, "p3", r1[2]).denial, Some(DenialReason::ImmediateNextOpponent));

    // 1 advances and is removed with the upper semi still open, so the 4 vs 5 winner
    // walks through it into the final.
    let bracket = advance_winner(&bracket, r1[0], &c("p1"), Some(&c("p8")), VictoryType::Normal, None, now).unwrap();
    let bracket = handle_participant_removal(&bracket, &pid("p1"), now).unwrap();
    let r2 = ids(&bracket, 2);
    assert!(bracket.get_match(r2[0]).unwrap().is_dead());
    let bracket = advance_winner(&bracket, r1[2], &c("p7"), Some(&c("p2")), VictoryType::Normal, None, now).unwrap();
    let bracket = advance_winner(&bracket, r2[1], &c("p3"), Some(&c("p7")), VictoryType::Normal, None, now).unwrap();
    // p3 now waits in the final for whoever wins 4 vs 5.
    assert_eq!(check(&bracket, "p3", r1[1]).denial, Some(DenialReason::ImmediateNextOpponent));
  }

  #[test]
  fn test_own_match_always_denied_even_when_finished() {
    let now = Utc::now();
    let bracket = build_bracket(&roster(4), EliminationType::Single, now).unwrap();
    let r1 = ids(&bracket, 1);
    let bracket = advance_winner(&bracket, r1[0], &c("p1"), None, VictoryType::Normal, None, now).unwrap();
    assert_eq!(check(&bracket, "p4", r1[0]).denial, Some(DenialReason::SelfParticipation));
    // p4 is out, so the rest of the bracket is fair game.
    assert!(check(&bracket, "p4", r1[1]).allowed);
    assert!(check(&bracket, "p4", ids(&bracket, 2)[0]).allowed);
  }

  #[test]
  fn test_spectators_and_unknown_matches() {
    let bracket = build_bracket(&roster(4), EliminationType::Single, Utc::now()).unwrap();
    assert!(check(&bracket, "viewer", ids(&bracket, 1)[0]).allowed);
    let missing = check(&bracket, "p1", MatchId(404));
    assert!(!missing.allowed);
    assert_eq!(missing.denial, Some(DenialReason::MatchNotFound));
  }

  #[test]
  fn test_legacy_depth_misses_deep_brackets() {
    // 4096 entrants: 12 rounds, the final is 11 hops past round one.
    let bracket = build_bracket(&roster(4096), EliminationType::Single, Utc::now()).unwrap();
    let final_id = bracket.final_match().unwrap().id;
    let sized = resolve_eligibility(&bracket, &pid("p1"), final_id, ReachabilityDepth::TotalRounds);
    assert_eq!(sized.denial, Some(DenialReason::ForwardReachable));
    let legacy = resolve_eligibility(&bracket, &pid("p1"), final_id, ReachabilityDepth::legacy());
    assert!(legacy.allowed);
  }

  #[test]
  fn test_team_members_resolve_through_their_team() {
    let players = roster(8);
    let teams: Vec<_> = (0..4)
      .map(|i| crate::types::Team::new(&players[i], &players[7 - i], i as u32 + 1))
      .collect();
    let bracket =
      crate::builder::build_team_bracket(&players, &teams, EliminationType::Single, Utc::now()).unwrap();
    let r1 = ids(&bracket, 1);
    // p8 plays alongside p1 in the top team.
    assert_eq!(check(&bracket, "p8", r1[0]).denial, Some(DenialReason::SelfParticipation));
    assert_eq!(check(&bracket, "p8", r1[1]).denial, Some(DenialReason::SharedSuccessor));
  }

  #[test]
  fn test_evaluate_wager_gate() {
    let now = Utc::now();
    let bracket = build_bracket(&roster(5), EliminationType::Single, now).unwrap();
    let r1 = ids(&bracket, 1);
    let r2 = ids(&bracket, 2);
    let mut open = HashSet::new();

    // Byes are never biddable.
    let bye = evaluate_wager(&bracket, &pid("viewer"), r1[0], &open, ReachabilityDepth::TotalRounds);
    assert_eq!(bye.denial, Some(DenialReason::NotBiddable));

    let viewer = pid("viewer");
    let fresh = evaluate_wager(&bracket, &viewer, r2[1], &open, ReachabilityDepth::TotalRounds);
    assert!(fresh.allowed);

    open.insert((viewer.clone(), r2[1]));
    let repeat = evaluate_wager(&bracket, &viewer, r2[1], &open, ReachabilityDepth::TotalRounds);
    assert_eq!(repeat.denial, Some(DenialReason::ExistingWager));

    // Seed 1 sits in round two after the bye and shares the final with the other semi.
    let sibling = evaluate_wager(&bracket, &pid("p1"), r2[1], &open, ReachabilityDepth::TotalRounds);
    assert_eq!(sibling.denial, Some(DenialReason::SharedSuccessor));

    let conflict = evaluate_wager(&bracket, &pid("p4"), r2[0], &open, ReachabilityDepth::TotalRounds);
    assert_eq!(conflict.denial, Some(DenialReason::ImmediateNextOpponent));

    let biddable: Vec<MatchId> = bracket.biddable_matches().iter().map(|m| m.id).collect();
    assert!(biddable.contains(&r1[1]));
    assert!(!biddable.contains(&r1[0]));
  }

  #[test]
  fn test_removed_participant_is_free_to_bet() {
    let now = Utc::now();
    let bracket = build_bracket(&roster(4), EliminationType::Single, now).unwrap();
    let r1 = ids(&bracket, 1);
    let bracket = handle_participant_removal(&bracket, &pid("p2"), now).unwrap();
    let final_id = ids(&bracket, 2)[0];
    assert!(check(&bracket, "p2", final_id).allowed);
    assert!(check(&bracket, "p2", r1[0]).allowed);
  }
}
