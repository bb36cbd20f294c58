//! The full allocation pass over a range snapshot and its orphan identities.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::{cluster, separate_outliers, separate_under_1000};
use crate::error::EngineError;
use crate::proposal::{propose_ranges, range_name_base, FailedProposal, ProposalOptions};
use crate::registry::Registry;
use crate::rid::{assign_missing_rid_bases, RidConflictReport};
use crate::types::{IdRange, Identity};

/// Default gap left after the highest used RID.
pub const DEFAULT_RID_OFFSET: u64 = 100_000;

/// Default gap between orphan identifiers that starts a new cluster.
pub const DEFAULT_RANGE_GAP: u64 = 200_000;

/// Default minimal span a cluster needs to get its own range.
pub const DEFAULT_MIN_RANGE_SIZE: u64 = 10;

/// Invocation-level settings for an allocation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub rid_offset: u64,
    pub range_gap: u64,
    pub min_range_size: u64,
    pub allow_below_1000: bool,
    pub allow_rounding: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            rid_offset: DEFAULT_RID_OFFSET,
            range_gap: DEFAULT_RANGE_GAP,
            min_range_size: DEFAULT_MIN_RANGE_SIZE,
            allow_below_1000: false,
            allow_rounding: true,
        }
    }
}

impl PlanOptions {
    /// Checks the bounds that the types alone do not enforce.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_range_size < 1 {
            return Err(EngineError::InvalidOption {
                option: "minimal range size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn proposal_options(&self) -> ProposalOptions {
        ProposalOptions {
            rid_offset: self.rid_offset,
            allow_rounding: self.allow_rounding,
            allow_below_1000: self.allow_below_1000,
        }
    }
}

/// Everything an allocation pass decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Ranges after the pass: RID bases filled and new ranges added.
    pub registry: Registry,
    /// Existing ranges that received RID bases, as updated.
    pub rid_updates: Vec<IdRange>,
    /// Newly proposed ranges, in proposal order.
    pub new_ranges: Vec<IdRange>,
    /// Identities below 1000 excluded from clustering.
    pub under_1000: Vec<Identity>,
    /// Identities whose cluster was too narrow for a range.
    pub outliers: Vec<Identity>,
    pub rid_conflicts: Vec<RidConflictReport>,
    pub failed_proposals: Vec<FailedProposal>,
}

impl Plan {
    /// True when there is nothing to write back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rid_updates.is_empty() && self.new_ranges.is_empty()
    }

    /// True when some item needs manual attention.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        !self.rid_conflicts.is_empty()
            || !self.failed_proposals.is_empty()
            || !self.outliers.is_empty()
            || !self.under_1000.is_empty()
    }
}

/// Runs the full pass: validate, fill RID bases, cluster orphans, propose.
///
/// Overlapping base data aborts the pass before anything is allocated.
pub fn plan(
    ranges: Vec<IdRange>,
    mut orphans: Vec<Identity>,
    options: &PlanOptions,
) -> Result<Plan, EngineError> {
    options.validate()?;
    if ranges.is_empty() {
        return Err(EngineError::NoRanges);
    }

    let mut registry = Registry::new(ranges)?;
    let rid_pass = assign_missing_rid_bases(&mut registry, options.rid_offset);

    if orphans.is_empty() {
        info!("no out of range IDs found");
    } else {
        info!(count = orphans.len(), "found IDs out of already set up ID ranges");
    }
    orphans.sort_by_key(Identity::identifier);

    let (under_1000, candidates) = if options.allow_below_1000 {
        (Vec::new(), orphans)
    } else {
        separate_under_1000(orphans)
    };
    if !under_1000.is_empty() {
        info!(
            count = under_1000.len(),
            "found IDs under 1000, excluding them from range proposals"
        );
    }

    let clusters = cluster(&candidates, options.range_gap);
    let (outliers, viable) = separate_outliers(clusters, options.min_range_size);
    debug!(
        viable = viable.len(),
        outliers = outliers.len(),
        "grouped out of range IDs"
    );
    if viable.is_empty() && !candidates.is_empty() {
        info!("no IDs fit for an ID range proposal, try tuning the range gap or minimal range size");
    }

    let name_base = range_name_base(registry.ranges());
    let batch = propose_ranges(registry, viable, &name_base, &options.proposal_options());

    Ok(Plan {
        registry: batch.registry,
        rid_updates: rid_pass.updated,
        new_ranges: batch.accepted,
        under_1000,
        outliers,
        rid_conflicts: rid_pass.conflicts,
        failed_proposals: batch.failed,
    })
}
