//! Decoding proposals into oriented 3D boxes.

use crate::proposal::heading::HeadingGrid;
use crate::proposal::Proposal;
use crate::util::math::{argmax, sigmoid, softmax_in_place};

/// Final decoded detection: an oriented 3D bounding box with a label.
#[derive(Clone, Debug, PartialEq)]
pub struct Box3d {
    /// Box center in world coordinates.
    pub center: [f32; 3],
    /// Box dimensions (width, length, height), non-negative.
    pub size: [f32; 3],
    /// Yaw heading in [0, 2π).
    pub heading: f32,
    /// Predicted class index.
    pub class: usize,
    /// Objectness × class confidence in [0, 1].
    pub score: f32,
}

/// Decodes one proposal against the heading grid and size templates.
///
/// Selection is argmax with lowest-index tie-breaks throughout: heading =
/// argmax bin's center plus that bin's residual, size = argmax template plus
/// its residual clamped non-negative, center = cluster center plus offset.
pub(crate) fn decode_proposal(
    proposal: &Proposal,
    grid: &HeadingGrid,
    mean_sizes: &[[f32; 3]],
) -> Box3d {
    let center = [
        proposal.cluster_center[0] + proposal.center_offset[0],
        proposal.cluster_center[1] + proposal.center_offset[1],
        proposal.cluster_center[2] + proposal.center_offset[2],
    ];

    let bin = argmax(&proposal.heading_bin_logits);
    let heading = grid.decode(bin, proposal.heading_residuals[bin]);

    let template = argmax(&proposal.size_cluster_logits);
    let residual = &proposal.size_residuals[3 * template..3 * template + 3];
    let mut size = [0.0f32; 3];
    for axis in 0..3 {
        size[axis] = (mean_sizes[template][axis] + residual[axis]).max(0.0);
    }

    let class = argmax(&proposal.class_logits);
    let mut class_probs = proposal.class_logits.clone();
    softmax_in_place(&mut class_probs);
    let score = proposal.objectness_score() * class_probs[class];

    Box3d {
        center,
        size,
        heading,
        class,
        score,
    }
}

/// Returns the objectness score for a raw logit and member count.
///
/// Empty clusters are hard background: their score is 0 regardless of the
/// logit, so degenerate inputs can never clear a positive threshold.
pub(crate) fn objectness_score(logit: f32, member_count: usize) -> f32 {
    if member_count == 0 {
        return 0.0;
    }
    sigmoid(logit)
}
