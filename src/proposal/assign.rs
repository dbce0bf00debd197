//! Training-time assignment of proposals to ground-truth objects.

use crate::proposal::Proposal;
use crate::util::math::dist_sq;

/// Default matching radius in scene units: a proposal counts as positive
/// when its cluster center lies within this distance of a ground-truth
/// center. The value follows the deep-Hough-voting detection convention.
pub const NEAR_THRESHOLD: f32 = 0.3;

/// Matches each proposal to its nearest ground-truth center.
///
/// Returns, per proposal, `Some(index)` of the nearest ground-truth center
/// when it lies within `threshold` (nearest wins, lowest index on ties), or
/// `None` for background. Several proposals may match the same object; the
/// training loop decides how to weigh duplicates. Empty-cluster proposals
/// are always background.
pub fn assign_targets(
    proposals: &[Proposal],
    gt_centers: &[[f32; 3]],
    threshold: f32,
) -> Vec<Option<usize>> {
    let threshold_sq = threshold * threshold;
    proposals
        .iter()
        .map(|proposal| {
            if proposal.member_count == 0 || gt_centers.is_empty() {
                return None;
            }
            let mut best_idx = 0usize;
            let mut best_dist = f32::INFINITY;
            for (idx, center) in gt_centers.iter().enumerate() {
                let d = dist_sq(&proposal.cluster_center, center);
                if d < best_dist {
                    best_dist = d;
                    best_idx = idx;
                }
            }
            (best_dist <= threshold_sq).then_some(best_idx)
        })
        .collect()
}
