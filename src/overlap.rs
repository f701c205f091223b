/// Overlap resolver: greedy, score-ordered selection of non-overlapping hits
///
/// Hits are split into comparison groups (see `Grouper`), each group is
/// ranked best first, and a hit is accepted only if it does not overlap any
/// already accepted hit of its group by more than the policy's fraction.
/// Pairwise checks make this O(n²) per group; groups are the hits of one
/// protein, so n stays small.
use log::debug;

use crate::clan::Grouper;
use crate::hit::HitRecord;

/// Resolve overlaps across all groups. Accepted hits come back grouped, each
/// group best first; callers that need an order sort afterwards.
pub fn resolve_overlaps(
    records: Vec<HitRecord>,
    overlap_fraction: f64,
    grouper: &Grouper,
) -> Vec<HitRecord> {
    let input_len = records.len();
    let groups = grouper.partition(records);
    let num_groups = groups.len();

    let kept: Vec<HitRecord> = groups
        .into_iter()
        .flat_map(|group| select_non_overlapping(group, overlap_fraction))
        .collect();

    debug!(
        "Overlap resolver: {} -> {} records in {} groups (max overlap {})",
        input_len,
        kept.len(),
        num_groups,
        overlap_fraction
    );
    kept
}

/// Greedy selection within one comparison group
pub fn select_non_overlapping(mut group: Vec<HitRecord>, overlap_fraction: f64) -> Vec<HitRecord> {
    if group.len() <= 1 {
        return group;
    }

    // Best first, deterministic on ties
    group.sort_by(|a, b| a.rank_cmp(b));

    // Keep only non-overlapping or below threshold
    let mut accepted: Vec<HitRecord> = Vec::with_capacity(group.len());
    for candidate in group {
        let clashes = accepted
            .iter()
            .any(|kept| candidate.overlap_fraction(kept) > overlap_fraction);
        if !clashes {
            accepted.push(candidate);
        }
    }

    accepted
}
