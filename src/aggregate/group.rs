//! Ball-query grouping of votes around cluster centers.

use crate::cloud::VoteSet;
use crate::util::math::dist_sq;

/// Collects into `members` the indices of votes within `radius` of `center`,
/// scanning in index order and stopping after `max_members` hits.
///
/// `members` is a buffer reused across clusters; it is cleared here and never
/// grows past `max_members`, so no reallocation happens in the hot loop.
/// Grouping is soft: the same vote may fall inside several clusters' balls.
pub(crate) fn ball_query(
    votes: &VoteSet,
    center: &[f32],
    radius: f32,
    max_members: usize,
    members: &mut Vec<usize>,
) {
    members.clear();
    let radius_sq = radius * radius;
    for i in 0..votes.len() {
        if members.len() == max_members {
            break;
        }
        if dist_sq(votes.position(i), center) <= radius_sq {
            members.push(i);
        }
    }
}
