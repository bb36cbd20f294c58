//! Grouping of out-of-range identities into candidate ranges.

use serde::Serialize;

use crate::types::{Identity, SYSTEM_ID_FLOOR};

/// A non-empty, ordered run of identities close enough to share a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cluster {
    members: Vec<Identity>,
}

impl Cluster {
    fn starting_with(identity: Identity) -> Self {
        Self {
            members: vec![identity],
        }
    }

    #[must_use]
    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    #[must_use]
    pub fn into_members(self) -> Vec<Identity> {
        self.members
    }

    #[must_use]
    pub fn first(&self) -> &Identity {
        &self.members[0]
    }

    #[must_use]
    pub fn last(&self) -> &Identity {
        &self.members[self.members.len() - 1]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Clusters are never empty; provided for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `last - first + 1`, the width a range needs to cover every member.
    #[must_use]
    pub fn span(&self) -> u64 {
        self.last().identifier() - self.first().identifier() + 1
    }
}

/// Splits identities sorted by identifier wherever consecutive numbers
/// differ by more than `gap_threshold`.
///
/// Every input lands in exactly one cluster and order is preserved.
pub fn cluster(identities: &[Identity], gap_threshold: u64) -> Vec<Cluster> {
    debug_assert!(
        identities
            .windows(2)
            .all(|pair| pair[0].identifier() <= pair[1].identifier()),
        "identities must be sorted by identifier"
    );

    let mut clusters: Vec<Cluster> = Vec::new();
    for identity in identities {
        let joins = clusters.last().is_some_and(|current| {
            identity
                .identifier()
                .saturating_sub(current.last().identifier())
                <= gap_threshold
        });

        match clusters.last_mut() {
            Some(current) if joins => current.members.push(identity.clone()),
            _ => clusters.push(Cluster::starting_with(identity.clone())),
        }
    }
    clusters
}

/// Separates clusters whose span is below `min_range_size`.
///
/// Returns `(outliers, viable)`. Rejection is per cluster: all members of a
/// too-narrow cluster become outliers, however many there are.
pub fn separate_outliers(
    clusters: Vec<Cluster>,
    min_range_size: u64,
) -> (Vec<Identity>, Vec<Cluster>) {
    let mut outliers = Vec::new();
    let mut viable = Vec::new();
    for cluster in clusters {
        if cluster.span() < min_range_size {
            outliers.extend(cluster.into_members());
        } else {
            viable.push(cluster);
        }
    }
    (outliers, viable)
}

/// Splits a sorted list at the first identifier of 1000 or more.
///
/// Returns `(under_1000, rest)`.
pub fn separate_under_1000(mut sorted: Vec<Identity>) -> (Vec<Identity>, Vec<Identity>) {
    let split = sorted.partition_point(|identity| identity.identifier() < SYSTEM_ID_FLOOR);
    let rest = sorted.split_off(split);
    (sorted, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn users(numbers: &[u64]) -> Vec<Identity> {
        numbers
            .iter()
            .map(|n| Identity::user(*n, format!("u{n}")))
            .collect()
    }

    fn numbers(cluster: &Cluster) -> Vec<u64> {
        cluster.members().iter().map(Identity::identifier).collect()
    }

    #[test]
    fn splits_on_gap_larger_than_threshold() {
        let clusters = cluster(&users(&[500_000, 500_010, 900_000]), 200_000);
        assert_eq!(clusters.len(), 2);
        assert_eq!(numbers(&clusters[0]), vec![500_000, 500_010]);
        assert_eq!(numbers(&clusters[1]), vec![900_000]);
    }

    #[test]
    fn gap_equal_to_threshold_stays_together() {
        let clusters = cluster(&users(&[1000, 1010, 1021]), 10);
        assert_eq!(clusters.len(), 2);
        assert_eq!(numbers(&clusters[0]), vec![1000, 1010]);

        let clusters = cluster(&users(&[1000, 1000, 1000]), 0);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn single_and_empty_inputs() {
        assert!(cluster(&[], 10).is_empty());
        let clusters = cluster(&users(&[4242]), 10);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].span(), 1);
        assert_eq!(clusters[0].first(), clusters[0].last());
    }

    #[test]
    fn outliers_by_span_not_member_count() {
        let clusters = cluster(&users(&[500_000, 500_010, 900_000]), 200_000);
        let (outliers, viable) = separate_outliers(clusters, 10);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].identifier(), 900_000);
        assert_eq!(viable.len(), 1);
        assert_eq!(viable[0].span(), 11);

        // Many members, narrow span.
        let clusters = cluster(&users(&[7000, 7001, 7002, 7003, 7004]), 100);
        let (outliers, viable) = separate_outliers(clusters, 10);
        assert_eq!(outliers.len(), 5);
        assert!(viable.is_empty());
    }

    #[test]
    fn under_1000_prefix_split() {
        let (low, rest) = separate_under_1000(users(&[0, 5, 999, 1000, 1500]));
        assert_eq!(low.len(), 3);
        assert_eq!(rest[0].identifier(), 1000);

        let (low, rest) = separate_under_1000(users(&[1000, 2000]));
        assert!(low.is_empty());
        assert_eq!(rest.len(), 2);

        let (low, rest) = separate_under_1000(users(&[1, 2]));
        assert_eq!(low.len(), 2);
        assert!(rest.is_empty());
    }

    fn sorted_numbers() -> impl Strategy<Value = Vec<u64>> {
        proptest::collection::vec(0u64..5_000_000, 0..64).prop_map(|mut v| {
            v.sort_unstable();
            v
        })
    }

    proptest! {
        #[test]
        fn clusters_respect_threshold(values in sorted_numbers(), gap in 0u64..500_000) {
            let input = users(&values);
            let clusters = cluster(&input, gap);

            let flattened: Vec<u64> = clusters.iter().flat_map(numbers).collect();
            prop_assert_eq!(&flattened, &values);

            for c in &clusters {
                let n = numbers(c);
                for pair in n.windows(2) {
                    prop_assert!(pair[1] - pair[0] <= gap);
                }
            }
            for pair in clusters.windows(2) {
                prop_assert!(pair[1].first().identifier() - pair[0].last().identifier() > gap);
            }
        }

        #[test]
        fn outlier_split_is_a_partition(values in sorted_numbers(), gap in 0u64..500_000, min in 1u64..1_000_000) {
            let (outliers, viable) = separate_outliers(cluster(&users(&values), gap), min);
            let mut all: Vec<u64> = outliers.iter().map(Identity::identifier).collect();
            all.extend(viable.iter().flat_map(numbers));
            all.sort_unstable();
            prop_assert_eq!(all, values);
            prop_assert!(viable.iter().all(|c| c.span() >= min));
        }
    }
}
