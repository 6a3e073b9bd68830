//! Proportion redistribution.
//!
//! Given entries whose limitant (and optionally one pinned entry) carries the
//! user's requested value, recompute every other entry so the mix shares sum
//! to one again. The whole new set is computed from the input before anything
//! is returned; callers swap it in as a unit.

use crate::{Entries, MixEntry, EPSILON};

/// Rebalances non-limitant entries around the limitant.
///
/// - One entry (or none): forced to mix share 1, unlocked, limitant.
/// - Two entries: the other entry takes exactly `1 - limitant`.
/// - Three or more: non-limitant entries are scaled by their current weight
///   into `1 - limitant`; a zero total weight splits evenly.
///
/// Every non-limitant entry comes out locked with
/// `volume = mix * volume_to_mix_ratio`.
pub fn redistribute(entries: &[MixEntry]) -> Entries {
    redistribute_with_pin(entries, None)
}

/// Same as [`redistribute`], but the entry at `pinned` keeps its current mix
/// share and only the remaining non-limitant entries absorb the difference.
pub(crate) fn redistribute_with_pin(entries: &[MixEntry], pinned: Option<usize>) -> Entries {
    let mut next: Entries = entries.iter().cloned().collect();

    if next.len() <= 1 {
        for entry in &mut next {
            make_sole(entry);
        }
        return next;
    }

    let limitant_index = match next.iter().position(|entry| entry.is_limitant) {
        Some(index) => index,
        None => {
            next[0].is_limitant = true;
            0
        }
    };
    // Exactly one limitant, whatever the caller handed in.
    for (index, entry) in next.iter_mut().enumerate() {
        entry.is_limitant = index == limitant_index;
    }

    let remaining = (1.0 - next[limitant_index].mix_proportion).clamp(0.0, 1.0);

    if next.len() == 2 {
        let other = 1 - limitant_index;
        set_derived(&mut next[other], remaining);
        return next;
    }

    let pinned = pinned.filter(|&index| index != limitant_index && index < next.len());
    let pool = match pinned {
        Some(index) => {
            let value = next[index].mix_proportion.clamp(0.0, remaining);
            set_derived(&mut next[index], value);
            remaining - value
        }
        None => remaining,
    };

    let free: Vec<usize> = (0..next.len())
        .filter(|&index| index != limitant_index && Some(index) != pinned)
        .collect();
    let total_weight: f64 = free.iter().map(|&index| next[index].mix_proportion).sum();

    for &index in &free {
        let share = if total_weight <= EPSILON {
            pool / free.len() as f64
        } else {
            next[index].mix_proportion / total_weight * pool
        };
        set_derived(&mut next[index], share);
    }
    next
}

/// Resets an entry to the single-entry state.
pub(crate) fn make_sole(entry: &mut MixEntry) {
    entry.mix_proportion = 1.0;
    entry.volume_to_mix_ratio = entry.volume_proportion;
    entry.is_limitant = true;
    entry.is_locked = false;
}

fn set_derived(entry: &mut MixEntry, mix_proportion: f64) {
    entry.mix_proportion = mix_proportion.clamp(0.0, 1.0);
    entry.volume_proportion = (entry.mix_proportion * entry.volume_to_mix_ratio).clamp(0.0, 1.0);
    entry.is_locked = true;
}
