use chrono::{DateTime, Utc};

use crate::error::BracketError;
use crate::types::{AdminOverride, Contender, Match, MatchStatus, VictoryType};

impl MatchStatus {
  pub fn can_transition_to(self, next: MatchStatus) -> bool {
    use MatchStatus::*;
    matches!(
      (self, next),
      (Pending, Ready)
        | (Ready, Active)
        | (Pending | Ready | Active, Completed)
        | (Pending | Ready | Active, RequiresAdmin)
        | (RequiresAdmin, Completed)
    )
  }
}

fn transition(m: &mut Match, next: MatchStatus) -> Result<(), BracketError> {
  if !m.status.can_transition_to(next) {
    return Err(BracketError::InvalidTransition {
      match_id: m.id,
      from: m.status,
      to: next,
    });
  }
  m.status = next;
  Ok(())
}

pub fn refresh_readiness(m: &mut Match) -> bool {
  if m.status == MatchStatus::Pending && m.both_slots_filled() {
    m.status = MatchStatus::Ready;
    return true;
  }
  false
}

pub fn start(m: &mut Match, now: DateTime<Utc>) -> Result<(), BracketError> {
  if m.status == MatchStatus::Completed {
    return Err(BracketError::MatchAlreadyCompleted(m.id));
  }
  transition(m, MatchStatus::Active)?;
  m.started_at = Some(now);
  Ok(())
}

pub fn require_admin(m: &mut Match) -> Result<(), BracketError> {
  if m.status == MatchStatus::Completed {
    return Err(BracketError::MatchAlreadyCompleted(m.id));
  }
  if m.status == MatchStatus::RequiresAdmin {
    return Ok(());
  }
  transition(m, MatchStatus::RequiresAdmin)
}

/// Records a result. A match held for an admin only completes when an admin
/// signs off, unless `release_hold` is set by an authoritative event such as
/// a disqualification.
pub fn complete(
  m: &mut Match,
  winner: Option<Contender>,
  loser: Option<Contender>,
  victory_type: VictoryType,
  admin: Option<&AdminOverride>,
  release_hold: bool,
  now: DateTime<Utc>,
) -> Result<(), BracketError> {
  if m.status == MatchStatus::Completed {
    return Err(BracketError::MatchAlreadyCompleted(m.id));
  }
  if m.status == MatchStatus::RequiresAdmin && admin.is_none() && !release_hold {
    return Err(BracketError::RequiresAdmin(m.id));
  }
  transition(m, MatchStatus::Completed)?;
  m.winner = winner;
  m.loser = loser;
  m.victory_type = Some(victory_type);
  m.started_at = Some(m.started_at.unwrap_or(now));
  m.completed_at = Some(now);
  if let Some(admin) = admin {
    m.admin_override = true;
    m.admin_id = Some(admin.admin_id.clone());
  }
  Ok(())
}

pub fn finalize_bye(m: &mut Match, now: DateTime<Utc>) {
  let winner = m.player1.clone().or_else(|| m.player2.clone());
  m.is_bye = true;
  m.status = MatchStatus::Completed;
  m.winner = winner;
  m.loser = None;
  m.victory_type = Some(VictoryType::Bye);
  m.started_at = Some(now);
  m.completed_at = Some(now);
}

/// A completed forfeit that has nobody to advance (yet).
pub fn mark_dead(m: &mut Match, forfeiter: Option<Contender>, now: DateTime<Utc>) -> Result<(), BracketError> {
  complete(m, None, forfeiter, VictoryType::Forfeit, None, true, now)
}

/// Fills the open slot of a dead match and hands it the win.
pub fn late_walkover(m: &mut Match, slot: usize, contender: Contender, now: DateTime<Utc>) -> Result<(), BracketError> {
  if !m.is_dead() {
    return Err(BracketError::MatchAlreadyCompleted(m.id));
  }
  if let Some(occupant) = m.slot_mut(slot).clone() {
    return Err(BracketError::SlotCollision {
      match_id: m.id,
      slot,
      occupant,
    });
  }
  *m.slot_mut(slot) = Some(contender.clone());
  m.winner = Some(contender);
  m.completed_at = Some(now);
  Ok(())
}
