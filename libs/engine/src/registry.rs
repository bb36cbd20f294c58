//! The set of ID ranges an allocation run works against.
//!
//! # Invariants
//!
//! - Ranges are kept sorted by `first_id`
//! - No two ranges share an identifier
//! - Range names are unique

use serde::Serialize;
use tracing::error;

use crate::error::EngineError;
use crate::types::IdRange;

/// Returns the first pair of ranges whose identifier intervals intersect.
///
/// Pairwise, so quadratic in the number of ranges; deployments carry tens
/// of ranges.
pub fn find_overlap(ranges: &[IdRange]) -> Option<(&IdRange, &IdRange)> {
    ranges.iter().enumerate().find_map(|(i, a)| {
        ranges[i + 1..]
            .iter()
            .find(|b| a.overlaps(b))
            .map(|b| (a, b))
    })
}

/// Returns true if no two ranges share an identifier.
pub fn all_non_overlapping(ranges: &[IdRange]) -> bool {
    find_overlap(ranges).is_none()
}

/// Filters to `ipa-local` ranges.
pub fn local_ranges(ranges: &[IdRange]) -> Vec<&IdRange> {
    ranges.iter().filter(|range| range.is_local()).collect()
}

/// Local ranges where either RID base is unset.
pub fn ranges_missing_rid_bases(ranges: &[IdRange]) -> Vec<&IdRange> {
    ranges
        .iter()
        .filter(|range| range.is_missing_rid_bases())
        .collect()
}

/// Validated, sorted snapshot of ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    ranges: Vec<IdRange>,
}

impl Registry {
    /// Builds a registry, refusing base data that violates non-overlap.
    pub fn new(mut ranges: Vec<IdRange>) -> Result<Self, EngineError> {
        ranges.sort_by_key(IdRange::first_id);

        if let Some((a, b)) = find_overlap(&ranges) {
            error!(
                first = %a.name,
                second = %b.name,
                "ranges overlap, cannot proceed"
            );
            return Err(EngineError::RangesOverlap {
                first: a.name.clone(),
                second: b.name.clone(),
            });
        }

        for (i, range) in ranges.iter().enumerate() {
            if ranges[..i].iter().any(|other| other.name == range.name) {
                return Err(EngineError::DuplicateName(range.name.clone()));
            }
        }

        Ok(Self { ranges })
    }

    #[must_use]
    pub fn ranges(&self) -> &[IdRange] {
        &self.ranges
    }

    #[must_use]
    pub fn into_ranges(self) -> Vec<IdRange> {
        self.ranges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn local_ranges(&self) -> impl Iterator<Item = &IdRange> {
        self.ranges.iter().filter(|range| range.is_local())
    }

    #[must_use]
    pub fn missing_rid_bases(&self) -> Vec<&IdRange> {
        ranges_missing_rid_bases(&self.ranges)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IdRange> {
        self.ranges.iter().find(|range| range.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut IdRange> {
        self.ranges.iter_mut().find(|range| range.name == name)
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns an existing range that `candidate` would overlap.
    #[must_use]
    pub fn overlapping(&self, candidate: &IdRange) -> Option<&IdRange> {
        self.ranges.iter().find(|range| range.overlaps(candidate))
    }

    /// Returns the range covering `id`, if any.
    #[must_use]
    pub fn range_for(&self, id: u64) -> Option<&IdRange> {
        self.ranges.iter().find(|range| range.contains(id))
    }

    /// Adds a range after checking it against the invariants.
    pub fn insert(&mut self, range: IdRange) -> Result<(), EngineError> {
        if self.contains_name(&range.name) {
            return Err(EngineError::DuplicateName(range.name));
        }
        if let Some(existing) = self.overlapping(&range) {
            return Err(EngineError::RangesOverlap {
                first: existing.name.clone(),
                second: range.name,
            });
        }
        self.ranges.push(range);
        self.ranges.sort_by_key(IdRange::first_id);
        Ok(())
    }
}
