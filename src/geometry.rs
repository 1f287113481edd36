//! Seed placement math for a standard single-elimination draw.

/// Slot a zero-based seed index occupies in a bracket of `bracket_size` slots.
///
/// The draw pairs the best remaining seed against the worst, recursively, so
/// seeds 1 and 2 land in opposite halves, seeds 1-4 in opposite quarters, and
/// so on. `bracket_size` must be a power of two.
pub fn standard_slot_position(seed_index: usize, bracket_size: usize) -> usize {
  if bracket_size <= 2 {
    return seed_index;
  }
  let half = bracket_size / 2;
  if seed_index < half {
    2 * standard_slot_position(seed_index, half)
  } else {
    2 * standard_slot_position(bracket_size - 1 - seed_index, half) + 1
  }
}

/// Seed number (1-based) sitting in each slot, left to right.
pub fn seed_order(bracket_size: usize) -> Vec<u32> {
  let mut order = vec![0u32; bracket_size];
  for seed_index in 0..bracket_size {
    order[standard_slot_position(seed_index, bracket_size)] = seed_index as u32 + 1;
  }
  order
}

pub fn bracket_size_for(entrant_count: usize) -> usize {
  entrant_count.max(2).next_power_of_two()
}

pub fn total_rounds_for(entrant_count: usize) -> u32 {
  bracket_size_for(entrant_count).trailing_zeros()
}

pub fn round_name(round_number: u32, total_rounds: u32) -> String {
  let remaining = total_rounds.saturating_sub(round_number);
  match remaining {
    0 => "Final".to_string(),
    1 => "Semifinals".to_string(),
    2 => "Quarterfinals".to_string(),
    _ => format!("Round of {}", 1u64 << (remaining + 1)),
  }
}
