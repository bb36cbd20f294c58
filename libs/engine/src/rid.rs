//! RID base allocation.
//!
//! A new base is placed `offset` past the highest RID already in use,
//! leaving room for existing ranges to grow. The same-kind high-water mark
//! is tried first, then the other kind's. This is a greedy heuristic and
//! does not search the whole space for gaps.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::interval::overlaps;
use crate::registry::Registry;
use crate::types::{IdRange, ID_CEILING};

/// RID bases below this value are reserved.
pub const RID_FLOOR: u64 = 1000;

/// Which of the two parallel RID spaces a base belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RidKind {
    Primary,
    Secondary,
}

impl RidKind {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            RidKind::Primary => RidKind::Secondary,
            RidKind::Secondary => RidKind::Primary,
        }
    }
}

impl fmt::Display for RidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RidKind::Primary => f.write_str("primary"),
            RidKind::Secondary => f.write_str("secondary"),
        }
    }
}

/// Both candidates for a base were rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RidConflict {
    pub kind: RidKind,
    /// Candidate derived from the same-kind high-water mark.
    pub preferred: u64,
    /// Candidate derived from the other kind's high-water mark.
    pub fallback: u64,
}

impl fmt::Display for RidConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proposed {} base RIDs {} and {} both failed, please adjust manually",
            self.kind, self.preferred, self.fallback
        )
    }
}

/// Why a single candidate base was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RidRejection {
    /// `base + size` exceeds [`ID_CEILING`].
    AboveCeiling,
    /// `base` is below [`RID_FLOOR`].
    BelowFloor,
    /// The candidate interval intersects an occupied one.
    Overlaps { kind: RidKind, start: u64, end: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occupied {
    kind: RidKind,
    start: u64,
    end: u64,
}

/// Occupied primary and secondary RID intervals of a registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RidSpace {
    occupied: Vec<Occupied>,
    high_primary: u64,
    high_secondary: u64,
}

impl RidSpace {
    /// Collects the RID intervals of every local range.
    pub fn from_ranges<'a>(ranges: impl IntoIterator<Item = &'a IdRange>) -> Self {
        let mut space = Self::default();
        for range in ranges {
            if let (Some(base), Some(_)) = (range.base_rid, range.last_base_rid()) {
                space.claim(RidKind::Primary, base, range.size());
            }
            if let (Some(base), Some(_)) = (range.secondary_base_rid, range.last_secondary_rid()) {
                space.claim(RidKind::Secondary, base, range.size());
            }
        }
        space
    }

    /// Highest `last_base_rid` (or `last_secondary_rid`) in use, 0 if none.
    #[must_use]
    pub fn high_water(&self, kind: RidKind) -> u64 {
        match kind {
            RidKind::Primary => self.high_primary,
            RidKind::Secondary => self.high_secondary,
        }
    }

    /// Marks `[base, base + size]` as used.
    pub fn claim(&mut self, kind: RidKind, base: u64, size: u64) {
        let end = base.saturating_add(size);
        self.occupied.push(Occupied { kind, start: base, end });
        match kind {
            RidKind::Primary => self.high_primary = self.high_primary.max(end),
            RidKind::Secondary => self.high_secondary = self.high_secondary.max(end),
        }
    }

    /// Validates a candidate base for a range of `size` identifiers.
    ///
    /// The candidate interval is `[base, base + size + 1]`: one slot wider
    /// than a stored interval so a new base never lands on the slot right
    /// after an existing `last_base_rid`. Primary and secondary intervals
    /// are checked alike.
    pub fn check(&self, base: u64, size: u64) -> Result<(), RidRejection> {
        if base.saturating_add(size) > ID_CEILING {
            return Err(RidRejection::AboveCeiling);
        }
        if base < RID_FLOOR {
            return Err(RidRejection::BelowFloor);
        }

        let end = base + size + 1;
        match self
            .occupied
            .iter()
            .find(|occupied| overlaps(base, end, occupied.start, occupied.end))
        {
            Some(occupied) => Err(RidRejection::Overlaps {
                kind: occupied.kind,
                start: occupied.start,
                end: occupied.end,
            }),
            None => Ok(()),
        }
    }

    /// Proposes a base of `preferred` kind for a range of `size` identifiers.
    ///
    /// Nothing is claimed; call [`RidSpace::claim`] to keep the result.
    pub fn propose(&self, size: u64, offset: u64, preferred: RidKind) -> Result<u64, RidConflict> {
        let first = self.high_water(preferred).saturating_add(offset);
        match self.check(first, size) {
            Ok(()) => return Ok(first),
            Err(rejection) => debug!(
                kind = %preferred,
                base = first,
                size,
                ?rejection,
                "RID candidate rejected, retrying from the other high-water mark"
            ),
        }

        let second = self.high_water(preferred.other()).saturating_add(offset);
        match self.check(second, size) {
            Ok(()) => Ok(second),
            Err(rejection) => {
                debug!(kind = %preferred, base = second, size, ?rejection, "RID candidate rejected");
                Err(RidConflict {
                    kind: preferred,
                    preferred: first,
                    fallback: second,
                })
            }
        }
    }
}

/// Proposes a RID base for a range of `target_size` identifiers.
pub fn propose_rid_base<'a>(
    target_size: u64,
    existing_local_ranges: impl IntoIterator<Item = &'a IdRange>,
    offset: u64,
    preferred: RidKind,
) -> Result<u64, RidConflict> {
    RidSpace::from_ranges(existing_local_ranges).propose(target_size, offset, preferred)
}

/// A complete pair of RID bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RidBases {
    pub primary: u64,
    pub secondary: u64,
}

/// Fills whichever bases are missing, primary first.
///
/// The secondary proposal sees the primary chosen here. On success the
/// returned space holds both claims; on conflict `space` is untouched.
pub fn fill_missing(
    space: &RidSpace,
    primary: Option<u64>,
    secondary: Option<u64>,
    size: u64,
    offset: u64,
) -> Result<(RidSpace, RidBases), RidConflict> {
    let mut trial = space.clone();

    let primary = match primary {
        Some(base) => base,
        None => {
            let base = trial.propose(size, offset, RidKind::Primary)?;
            trial.claim(RidKind::Primary, base, size);
            base
        }
    };

    let secondary = match secondary {
        Some(base) => base,
        None => {
            let base = trial.propose(size, offset, RidKind::Secondary)?;
            trial.claim(RidKind::Secondary, base, size);
            base
        }
    };

    Ok((trial, RidBases { primary, secondary }))
}

/// A local range whose missing bases could not be allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RidConflictReport {
    pub range: String,
    pub conflict: RidConflict,
}

/// Outcome of filling missing RID bases across a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RidPass {
    /// Ranges that received bases, as updated.
    pub updated: Vec<IdRange>,
    pub conflicts: Vec<RidConflictReport>,
}

impl RidPass {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.conflicts.is_empty()
    }
}

/// Allocates missing RID bases for every local range that lacks them.
///
/// Ranges are processed in `first_id` order and each observes the bases
/// given to earlier ones. A range is only updated when all of its missing
/// bases could be allocated. With nothing missing this does no work.
pub fn assign_missing_rid_bases(registry: &mut Registry, offset: u64) -> RidPass {
    let pending: Vec<String> = registry
        .missing_rid_bases()
        .into_iter()
        .map(|range| range.name.clone())
        .collect();

    let mut pass = RidPass::default();
    if pending.is_empty() {
        info!("all ID ranges have base RIDs set, RID adjustments are not needed");
        return pass;
    }
    info!(count = pending.len(), "found ranges without base RIDs");

    let mut space = RidSpace::from_ranges(registry.ranges());
    for name in pending {
        let Some(range) = registry.get_mut(&name) else {
            continue;
        };
        debug!(
            range = %range.name,
            base_rid = ?range.base_rid,
            secondary_base_rid = ?range.secondary_base_rid,
            "allocating missing RID bases"
        );

        match fill_missing(
            &space,
            range.base_rid,
            range.secondary_base_rid,
            range.size(),
            offset,
        ) {
            Ok((next, bases)) => {
                space = next;
                range.base_rid = Some(bases.primary);
                range.secondary_base_rid = Some(bases.secondary);
                debug!(
                    range = %range.name,
                    primary = bases.primary,
                    secondary = bases.secondary,
                    "proposed RID bases"
                );
                pass.updated.push(range.clone());
            }
            Err(conflict) => {
                warn!(range = %range.name, %conflict, "RID base allocation failed");
                pass.conflicts.push(RidConflictReport {
                    range: range.name.clone(),
                    conflict,
                });
            }
        }
    }
    pass
}
