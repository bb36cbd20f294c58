//! Closed-interval arithmetic shared by the ID and RID checks.
//!
//! Callers pass already-derived end values. ID ranges end at
//! `first_id + size - 1` while RID intervals end at `base + size`; the
//! primitive does not care which.

/// Returns true if `[a_start, a_end]` and `[b_start, b_end]` share a point.
///
/// Touching endpoints count as an overlap, adjacency (`a_end + 1 == b_start`)
/// does not.
#[must_use]
pub fn overlaps(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start <= b_end && b_start <= a_end
}
