//! Synthesis of new local ranges for clusters of orphan identities.
//!
//! A proposal moves through
//! `Start → RoundedCandidate → {Accepted | Retrying} → ExactCandidate → {Accepted | Failed}`.
//! A failed proposal leaves the registry untouched.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::registry::Registry;
use crate::rid::{fill_missing, RidConflict, RidSpace};
use crate::types::{IdRange, RangeKind, ID_CEILING, SYSTEM_ID_FLOOR};

/// Name base used when no default local range can be identified.
pub const DEFAULT_NAME_BASE: &str = "Auto_added_range";

/// Knobs for a single proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProposalOptions {
    /// Gap left after the highest used RID.
    pub rid_offset: u64,
    /// Try decimal-aligned bounds before the exact ones.
    pub allow_rounding: bool,
    /// Lower the rounding floor from 1000 to 1.
    pub allow_below_1000: bool,
}

/// Why no range could be proposed for a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ProposalFailure {
    /// Even the exact bounds collide with an existing range.
    #[error("range {start}-{end} overlaps existing range '{conflicting}'")]
    Overlap {
        start: u64,
        end: u64,
        conflicting: String,
    },

    /// No RID base could be found for the new range.
    #[error("range {start}-{end}: {conflict}")]
    RidConflict {
        start: u64,
        end: u64,
        conflict: RidConflict,
    },
}

/// Rounds `start` down and `end` up to a multiple of the span's leading
/// decimal place.
///
/// The upper bound is `((end + m) / m) * m - 1`, which moves up a full
/// step when `end` itself is a multiple of `m`. Existing range sizes depend
/// on this, so it is kept as is.
///
/// The lower bound never drops below 1000 (1 with `allow_below_1000`)
/// unless `start` already does, so the result always contains
/// `start..=end`.
#[must_use]
pub fn round_bounds(start: u64, end: u64, allow_below_1000: bool) -> (u64, u64) {
    let span = end - start + 1;
    let multiplier = 10u64.pow(digit_count(span) - 1);

    let floor = if allow_below_1000 { 1 } else { SYSTEM_ID_FLOOR };
    let rounded_start = ((start / multiplier) * multiplier).max(floor).min(start);
    let rounded_end = (end.saturating_add(multiplier) / multiplier) * multiplier - 1;

    (rounded_start, rounded_end)
}

fn digit_count(value: u64) -> u32 {
    value.checked_ilog10().map_or(1, |log| log + 1)
}

/// Picks the name new ranges are derived from.
///
/// The installer's default local range is the one whose primary base RID
/// is exactly 1000; without one, [`DEFAULT_NAME_BASE`] is used.
#[must_use]
pub fn range_name_base(ranges: &[IdRange]) -> String {
    ranges
        .iter()
        .rev()
        .find(|range| range.base_rid == Some(1000))
        .map_or_else(|| DEFAULT_NAME_BASE.to_string(), |range| range.name.clone())
}

/// Returns `{base}_{NNN}` with the lowest counter not already taken.
#[must_use]
pub fn unique_range_name(ranges: &[IdRange], base: &str) -> String {
    (1u32..)
        .map(|counter| format!("{base}_{counter:03}"))
        .find(|name| !ranges.iter().any(|range| &range.name == name))
        .unwrap_or_else(|| format!("{base}_new"))
}

/// Proposes a local range covering `cluster`.
///
/// `registry` must already contain every range accepted earlier in the
/// same batch so RID bases never collide across proposals.
pub fn propose_range(
    cluster: &Cluster,
    registry: &Registry,
    name_base: &str,
    options: &ProposalOptions,
) -> Result<IdRange, ProposalFailure> {
    let start = cluster.first().identifier();
    let end = cluster.last().identifier();
    debug!(start, end, "proposing a range for out-of-range identities");

    let name = unique_range_name(registry.ranges(), name_base);
    let exact = IdRange::spanning(name.clone(), RangeKind::Local, start, end);

    let mut candidate = exact;
    if options.allow_rounding {
        let (first, last) = round_bounds(start, end, options.allow_below_1000);
        let rounded = IdRange::spanning(name, RangeKind::Local, first, last);
        match registry.overlapping(&rounded) {
            None if last > ID_CEILING => debug!(
                first,
                last,
                "rounded candidate ends past the identifier ceiling, retrying with exact bounds"
            ),
            None => candidate = rounded,
            Some(existing) => debug!(
                first,
                last,
                conflicting = %existing.name,
                "rounded candidate overlaps, retrying with exact bounds"
            ),
        }
    }

    if let Some(existing) = registry.overlapping(&candidate) {
        warn!(
            start,
            end,
            conflicting = %existing.name,
            "failed to create range for out-of-range identities, it overlaps an existing range"
        );
        return Err(ProposalFailure::Overlap {
            start,
            end,
            conflicting: existing.name.clone(),
        });
    }

    let space = RidSpace::from_ranges(registry.ranges());
    let (_, bases) = fill_missing(&space, None, None, candidate.size(), options.rid_offset)
        .map_err(|conflict| {
            warn!(
                first_id = candidate.first_id(),
                last_id = candidate.last_id(),
                %conflict,
                "RID base allocation failed for new range"
            );
            ProposalFailure::RidConflict {
                start: candidate.first_id(),
                end: candidate.last_id(),
                conflict,
            }
        })?;

    candidate.base_rid = Some(bases.primary);
    candidate.secondary_base_rid = Some(bases.secondary);
    debug!(range = %candidate, "proposed range");
    Ok(candidate)
}

/// A cluster that could not receive a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedProposal {
    pub cluster: Cluster,
    pub failure: ProposalFailure,
}

/// Result of proposing ranges for a sequence of clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalBatch {
    /// The input registry with every accepted range added.
    pub registry: Registry,
    pub accepted: Vec<IdRange>,
    pub failed: Vec<FailedProposal>,
}

/// Proposes ranges for `clusters` one at a time.
///
/// The registry is threaded through as an accumulator: each proposal sees
/// the ID and RID intervals of every range accepted before it.
pub fn propose_ranges(
    mut registry: Registry,
    clusters: Vec<Cluster>,
    name_base: &str,
    options: &ProposalOptions,
) -> ProposalBatch {
    let mut accepted = Vec::new();
    let mut failed = Vec::new();

    for cluster in clusters {
        let outcome = propose_range(&cluster, &registry, name_base, options).and_then(|range| {
            registry
                .insert(range.clone())
                .map(|()| range)
                .map_err(|err| ProposalFailure::Overlap {
                    start: cluster.first().identifier(),
                    end: cluster.last().identifier(),
                    conflicting: err.to_string(),
                })
        });

        match outcome {
            Ok(range) => accepted.push(range),
            Err(failure) => failed.push(FailedProposal { cluster, failure }),
        }
    }

    ProposalBatch {
        registry,
        accepted,
        failed,
    }
}
