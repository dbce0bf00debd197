//! Vote generation: per-seed regression of center offsets.
//!
//! Each seed's feature vector passes through a shared trunk and a linear
//! head that predicts, per emitted vote, a 3D offset toward an object center
//! plus a feature update. Seeds never interact; the same parameters are
//! applied to every seed, so the stage is a pure map over the seed set.

use crate::cloud::{SeedSet, VoteSet};
use crate::nn::{Linear, SharedMlp};
use crate::trace::{trace_event, trace_span};
use crate::util::{VoteBoxError, VoteBoxResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// How a vote's feature vector is derived from the head output.
///
/// Closed set of known variants; selected by configuration, dispatched with
/// an explicit `match`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeatureMode {
    /// Vote feature = seed feature + predicted residual (default).
    #[default]
    Residual,
    /// Vote feature = raw head output.
    Replace,
}

/// Per-seed vote regression module.
pub struct VoteGenerator {
    seed_feature_dim: usize,
    vote_factor: usize,
    mode: FeatureMode,
    trunk: SharedMlp,
    head: Linear,
}

impl VoteGenerator {
    /// Creates a generator, validating the parameter chain.
    ///
    /// `trunk` must consume `seed_feature_dim`; `head` must consume the trunk
    /// output and produce `(3 + seed_feature_dim) * vote_factor` values
    /// (offset then feature update, per vote).
    pub fn new(
        seed_feature_dim: usize,
        vote_factor: usize,
        mode: FeatureMode,
        trunk: SharedMlp,
        head: Linear,
    ) -> VoteBoxResult<Self> {
        if vote_factor == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "vote_factor must be >= 1",
            });
        }
        if seed_feature_dim == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "seed_feature_dim must be > 0",
            });
        }
        if trunk.in_dim() != seed_feature_dim {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: seed_feature_dim,
                got: trunk.in_dim(),
                context: "vote trunk input",
            });
        }
        if head.in_dim() != trunk.out_dim() {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: trunk.out_dim(),
                got: head.in_dim(),
                context: "vote head input",
            });
        }
        let per_vote = 3 + seed_feature_dim;
        let needed = per_vote * vote_factor;
        if head.out_dim() != needed {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: needed,
                got: head.out_dim(),
                context: "vote head output",
            });
        }
        Ok(Self {
            seed_feature_dim,
            vote_factor,
            mode,
            trunk,
            head,
        })
    }

    /// Returns the configured votes-per-seed factor.
    pub fn vote_factor(&self) -> usize {
        self.vote_factor
    }

    /// Returns the seed feature dimension this generator expects.
    pub fn seed_feature_dim(&self) -> usize {
        self.seed_feature_dim
    }

    /// Maps `n` seeds to `n * vote_factor` votes.
    ///
    /// Fails with [`VoteBoxError::FeatureDimMismatch`] if the seed set's
    /// feature dimension differs from the configured one. Zero seeds produce
    /// an empty vote set.
    pub fn generate(&self, seeds: &SeedSet<'_>) -> VoteBoxResult<VoteSet> {
        self.check_dims(seeds)?;
        let _span = trace_span!("vote_generation", seeds = seeds.len()).entered();

        let mut votes = VoteSet::with_capacity(seeds.len() * self.vote_factor, self.seed_feature_dim);
        let mut scratch = vec![0.0f32; self.trunk.scratch_len()];
        let mut trunk_out = vec![0.0f32; self.trunk.out_dim()];
        let mut head_out = vec![0.0f32; self.head.out_dim()];
        for i in 0..seeds.len() {
            self.emit_seed(seeds, i, &mut scratch, &mut trunk_out, &mut head_out);
            self.push_votes(seeds, i, &head_out, &mut votes.positions, &mut votes.features);
        }

        trace_event!("votes_emitted", count = votes.len());
        Ok(votes)
    }

    /// Parallel variant of [`generate`](Self::generate); output is identical
    /// to the sequential path (per-seed blocks are independent and collected
    /// in index order).
    #[cfg(feature = "rayon")]
    pub fn generate_par(&self, seeds: &SeedSet<'_>) -> VoteBoxResult<VoteSet> {
        self.check_dims(seeds)?;
        let _span = trace_span!("vote_generation", seeds = seeds.len()).entered();

        let per_seed: Vec<(Vec<f32>, Vec<f32>)> = (0..seeds.len())
            .into_par_iter()
            .map(|i| {
                let mut scratch = vec![0.0f32; self.trunk.scratch_len()];
                let mut trunk_out = vec![0.0f32; self.trunk.out_dim()];
                let mut head_out = vec![0.0f32; self.head.out_dim()];
                self.emit_seed(seeds, i, &mut scratch, &mut trunk_out, &mut head_out);
                let mut positions = Vec::with_capacity(3 * self.vote_factor);
                let mut features = Vec::with_capacity(self.seed_feature_dim * self.vote_factor);
                self.push_votes(seeds, i, &head_out, &mut positions, &mut features);
                (positions, features)
            })
            .collect();

        let mut votes = VoteSet::with_capacity(seeds.len() * self.vote_factor, self.seed_feature_dim);
        for (positions, features) in per_seed {
            votes.positions.extend_from_slice(&positions);
            votes.features.extend_from_slice(&features);
        }

        trace_event!("votes_emitted", count = votes.len());
        Ok(votes)
    }

    fn check_dims(&self, seeds: &SeedSet<'_>) -> VoteBoxResult<()> {
        if seeds.feature_dim() != self.seed_feature_dim {
            return Err(VoteBoxError::FeatureDimMismatch {
                expected: self.seed_feature_dim,
                got: seeds.feature_dim(),
            });
        }
        Ok(())
    }

    fn emit_seed(
        &self,
        seeds: &SeedSet<'_>,
        i: usize,
        scratch: &mut [f32],
        trunk_out: &mut [f32],
        head_out: &mut [f32],
    ) {
        self.trunk.forward_into(seeds.feature(i), scratch, trunk_out);
        self.head.forward_into(trunk_out, head_out);
    }

    fn push_votes(
        &self,
        seeds: &SeedSet<'_>,
        i: usize,
        head_out: &[f32],
        positions: &mut Vec<f32>,
        features: &mut Vec<f32>,
    ) {
        let seed_pos = seeds.position(i);
        let seed_feat = seeds.feature(i);
        let per_vote = 3 + self.seed_feature_dim;
        for v in 0..self.vote_factor {
            let block = &head_out[v * per_vote..(v + 1) * per_vote];
            positions.push(seed_pos[0] + block[0]);
            positions.push(seed_pos[1] + block[1]);
            positions.push(seed_pos[2] + block[2]);
            let update = &block[3..];
            match self.mode {
                FeatureMode::Residual => {
                    for (f, u) in seed_feat.iter().zip(update) {
                        features.push(f + u);
                    }
                }
                FeatureMode::Replace => features.extend_from_slice(update),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureMode, VoteGenerator};
    use crate::cloud::SeedSet;
    use crate::nn::{Linear, SharedMlp};
    use crate::util::VoteBoxError;

    fn zero_generator(dim: usize, vote_factor: usize, mode: FeatureMode) -> VoteGenerator {
        let trunk = SharedMlp::new(vec![Linear::new(
            dim,
            dim,
            vec![0.0; dim * dim],
            vec![0.0; dim],
        )
        .unwrap()])
        .unwrap();
        let out = (3 + dim) * vote_factor;
        let head = Linear::new(dim, out, vec![0.0; dim * out], vec![0.0; out]).unwrap();
        VoteGenerator::new(dim, vote_factor, mode, trunk, head).unwrap()
    }

    #[test]
    fn vote_count_scales_with_vote_factor() {
        let generator = zero_generator(4, 3, FeatureMode::Residual);
        let positions = [0.0f32; 6];
        let features = [1.0f32; 8];
        let seeds = SeedSet::new(&positions, &features, 2, 4).unwrap();
        let votes = generator.generate(&seeds).unwrap();
        assert_eq!(votes.len(), 6);
        assert_eq!(votes.feature_dim(), 4);
    }

    #[test]
    fn zero_offsets_keep_seed_positions_and_features() {
        let generator = zero_generator(2, 1, FeatureMode::Residual);
        let positions = [1.0f32, 2.0, 3.0];
        let features = [0.25f32, -0.75];
        let seeds = SeedSet::new(&positions, &features, 1, 2).unwrap();
        let votes = generator.generate(&seeds).unwrap();
        assert_eq!(votes.position(0), &[1.0, 2.0, 3.0]);
        assert_eq!(votes.feature(0), &[0.25, -0.75]);
    }

    #[test]
    fn replace_mode_ignores_seed_features() {
        let generator = zero_generator(2, 1, FeatureMode::Replace);
        let positions = [0.0f32; 3];
        let features = [9.0f32, 9.0];
        let seeds = SeedSet::new(&positions, &features, 1, 2).unwrap();
        let votes = generator.generate(&seeds).unwrap();
        assert_eq!(votes.feature(0), &[0.0, 0.0]);
    }

    #[test]
    fn mismatched_feature_dim_is_fatal() {
        let generator = zero_generator(4, 1, FeatureMode::Residual);
        let positions = [0.0f32; 3];
        let features = [0.0f32; 3];
        let seeds = SeedSet::new(&positions, &features, 1, 3).unwrap();
        let err = generator.generate(&seeds).err().unwrap();
        assert_eq!(err, VoteBoxError::FeatureDimMismatch { expected: 4, got: 3 });
    }

    #[test]
    fn empty_seed_set_yields_empty_votes() {
        let generator = zero_generator(4, 2, FeatureMode::Residual);
        let seeds = SeedSet::new(&[], &[], 0, 4).unwrap();
        let votes = generator.generate(&seeds).unwrap();
        assert!(votes.is_empty());
    }

    #[test]
    fn head_output_width_is_validated() {
        let trunk = SharedMlp::new(vec![Linear::new(2, 2, vec![0.0; 4], vec![0.0; 2]).unwrap()])
            .unwrap();
        let head = Linear::new(2, 4, vec![0.0; 8], vec![0.0; 4]).unwrap();
        let err = VoteGenerator::new(2, 1, FeatureMode::Residual, trunk, head)
            .err()
            .unwrap();
        assert_eq!(
            err,
            VoteBoxError::LayerShapeMismatch {
                expected: 5,
                got: 4,
                context: "vote head output",
            }
        );
    }
}
