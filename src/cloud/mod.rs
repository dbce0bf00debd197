//! Point-set containers used between pipeline stages.
//!
//! `SeedSet` is a borrowed view over caller-owned flat buffers: positions are
//! packed `[x, y, z]` triples and features are packed rows of `feature_dim`
//! floats, so element `i` lives at `positions[3*i..3*i+3]` and
//! `features[i*feature_dim..(i+1)*feature_dim]`. `VoteSet` and `ClusterSet`
//! own their buffers with the same layout; they are produced by one stage and
//! consumed by the next.

use crate::util::{VoteBoxError, VoteBoxResult};

/// Borrowed set of seed points with per-seed feature vectors.
///
/// Seeds are the output of an external point-set backbone; this view never
/// copies or mutates them. An empty set (`len == 0`) is valid.
#[derive(Copy, Clone)]
pub struct SeedSet<'a> {
    positions: &'a [f32],
    features: &'a [f32],
    len: usize,
    feature_dim: usize,
}

impl<'a> SeedSet<'a> {
    /// Creates a view over `len` seeds.
    ///
    /// `positions` must hold at least `3 * len` floats and `features` at
    /// least `len * feature_dim`.
    pub fn new(
        positions: &'a [f32],
        features: &'a [f32],
        len: usize,
        feature_dim: usize,
    ) -> VoteBoxResult<Self> {
        if feature_dim == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "feature_dim must be > 0",
            });
        }
        let needed_pos = len
            .checked_mul(3)
            .ok_or(VoteBoxError::InvalidConfig {
                reason: "seed count overflows position buffer size",
            })?;
        if positions.len() < needed_pos {
            return Err(VoteBoxError::BufferSizeMismatch {
                needed: needed_pos,
                got: positions.len(),
                context: "seed positions",
            });
        }
        let needed_feat = len
            .checked_mul(feature_dim)
            .ok_or(VoteBoxError::InvalidConfig {
                reason: "seed count overflows feature buffer size",
            })?;
        if features.len() < needed_feat {
            return Err(VoteBoxError::BufferSizeMismatch {
                needed: needed_feat,
                got: features.len(),
                context: "seed features",
            });
        }
        Ok(Self {
            positions,
            features,
            len,
            feature_dim,
        })
    }

    /// Returns the number of seeds.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the set holds no seeds.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the per-seed feature dimension.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Returns the position triple of seed `i`.
    pub fn position(&self, i: usize) -> &'a [f32] {
        &self.positions[3 * i..3 * i + 3]
    }

    /// Returns the feature row of seed `i`.
    pub fn feature(&self, i: usize) -> &'a [f32] {
        &self.features[i * self.feature_dim..(i + 1) * self.feature_dim]
    }
}

/// Owned set of votes: seed positions displaced toward predicted centers.
///
/// Holds `len == seeds * vote_factor` votes. Created by the vote generator,
/// consumed by the aggregator, discarded afterwards.
pub struct VoteSet {
    pub(crate) positions: Vec<f32>,
    pub(crate) features: Vec<f32>,
    len: usize,
    feature_dim: usize,
}

impl VoteSet {
    pub(crate) fn with_capacity(len: usize, feature_dim: usize) -> Self {
        Self {
            positions: Vec::with_capacity(3 * len),
            features: Vec::with_capacity(len * feature_dim),
            len,
            feature_dim,
        }
    }

    /// Returns the number of votes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the set holds no votes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the per-vote feature dimension.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Returns the position triple of vote `i`.
    pub fn position(&self, i: usize) -> &[f32] {
        &self.positions[3 * i..3 * i + 3]
    }

    /// Returns the feature row of vote `i`.
    pub fn feature(&self, i: usize) -> &[f32] {
        &self.features[i * self.feature_dim..(i + 1) * self.feature_dim]
    }
}

/// Owned set of exactly `num_proposal` aggregated vote clusters.
///
/// A cluster with `member_count == 0` carries a zero feature vector and
/// decodes into a background proposal downstream.
pub struct ClusterSet {
    pub(crate) centers: Vec<f32>,
    pub(crate) features: Vec<f32>,
    pub(crate) member_counts: Vec<usize>,
    len: usize,
    feature_dim: usize,
}

impl ClusterSet {
    pub(crate) fn zeros(len: usize, feature_dim: usize) -> Self {
        Self {
            centers: vec![0.0; 3 * len],
            features: vec![0.0; len * feature_dim],
            member_counts: vec![0; len],
            len,
            feature_dim,
        }
    }

    /// Returns the number of clusters (always the configured proposal count).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the set holds no clusters.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the aggregated feature dimension.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Returns the representative center of cluster `i`.
    pub fn center(&self, i: usize) -> &[f32] {
        &self.centers[3 * i..3 * i + 3]
    }

    /// Returns the aggregated feature row of cluster `i`.
    pub fn feature(&self, i: usize) -> &[f32] {
        &self.features[i * self.feature_dim..(i + 1) * self.feature_dim]
    }

    /// Returns the number of votes grouped into cluster `i`.
    pub fn member_count(&self, i: usize) -> usize {
        self.member_counts[i]
    }
}

#[cfg(test)]
mod tests {
    use super::SeedSet;
    use crate::util::VoteBoxError;

    #[test]
    fn seed_set_rejects_short_position_buffer() {
        let positions = [0.0f32; 5];
        let features = [0.0f32; 8];
        let err = SeedSet::new(&positions, &features, 2, 4).err().unwrap();
        assert_eq!(
            err,
            VoteBoxError::BufferSizeMismatch {
                needed: 6,
                got: 5,
                context: "seed positions",
            }
        );
    }

    #[test]
    fn seed_set_rejects_short_feature_buffer() {
        let positions = [0.0f32; 6];
        let features = [0.0f32; 7];
        let err = SeedSet::new(&positions, &features, 2, 4).err().unwrap();
        assert_eq!(
            err,
            VoteBoxError::BufferSizeMismatch {
                needed: 8,
                got: 7,
                context: "seed features",
            }
        );
    }

    #[test]
    fn seed_set_indexes_rows() {
        let positions = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let features = [0.1f32, 0.2, 0.3, 0.4];
        let seeds = SeedSet::new(&positions, &features, 2, 2).unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds.position(1), &[4.0, 5.0, 6.0]);
        assert_eq!(seeds.feature(1), &[0.3, 0.4]);
    }

    #[test]
    fn empty_seed_set_is_valid() {
        let seeds = SeedSet::new(&[], &[], 0, 16).unwrap();
        assert!(seeds.is_empty());
        assert_eq!(seeds.feature_dim(), 16);
    }
}
