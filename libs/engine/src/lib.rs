//! # idrange-engine
//!
//! Allocation and consistency engine for POSIX ID ranges and the RID bases
//! that map them into Windows-style security identifiers.
//!
//! Given a snapshot of ranges and the identities that fall outside every
//! range, the engine:
//!
//! - fills in missing RID bases for local ranges
//! - groups orphan identities into clusters
//! - proposes new, non-overlapping ranges for clusters wide enough
//!
//! All of it is pure computation. Reading the directory and writing the
//! result back is left to callers.
//!
//! # Invariants
//!
//! - Ranges in a [`Registry`] never share an identifier
//! - A RID base is only handed out if its whole block is clear of every
//!   local range's primary and secondary blocks
//! - Nothing below RID 1000 or above 2147483647 is ever proposed

mod cluster;
mod error;
mod interval;
mod plan;
mod proposal;
mod registry;
mod rid;
mod types;

pub use cluster::{cluster, separate_outliers, separate_under_1000, Cluster};
pub use error::EngineError;
pub use interval::overlaps;
pub use plan::{
    plan, Plan, PlanOptions, DEFAULT_MIN_RANGE_SIZE, DEFAULT_RANGE_GAP, DEFAULT_RID_OFFSET,
};
pub use proposal::{
    propose_range, propose_ranges, range_name_base, round_bounds, unique_range_name,
    FailedProposal, ProposalBatch, ProposalFailure, ProposalOptions, DEFAULT_NAME_BASE,
};
pub use registry::{
    all_non_overlapping, find_overlap, local_ranges, ranges_missing_rid_bases, Registry,
};
pub use rid::{
    assign_missing_rid_bases, fill_missing, propose_rid_base, RidBases, RidConflict,
    RidConflictReport, RidKind, RidPass, RidRejection, RidSpace, RID_FLOOR,
};
pub use types::{
    IdRange, Identity, IdentityKind, OriginHandle, RangeKind, ID_CEILING, SYSTEM_ID_FLOOR,
};
