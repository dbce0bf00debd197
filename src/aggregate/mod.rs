//! Vote aggregation: sampling, grouping, and permutation-invariant pooling.
//!
//! The aggregator turns an arbitrary number of votes into exactly
//! `num_proposal` clusters. Cluster centers come from deterministic
//! farthest-point sampling; members come from a radius (ball) query with a
//! fixed capacity; each member's relative position and feature pass through a
//! shared MLP and are reduced by an elementwise max, so the result does not
//! depend on the order votes are gathered in.
//!
//! Grouping is soft: a vote inside two clusters' balls contributes to both.

use crate::cloud::{ClusterSet, SeedSet, VoteSet};
use crate::nn::SharedMlp;
use crate::trace::{trace_event, trace_span};
use crate::util::{VoteBoxError, VoteBoxResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

mod fps;
mod group;

use fps::farthest_point_sample;
use group::ball_query;

/// Where cluster centers are sampled from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Farthest-point sampling over vote positions (default).
    #[default]
    VoteFps,
    /// Farthest-point sampling over the original seed positions; each
    /// sampled seed contributes the position of its own first vote.
    SeedFps,
}

/// Aggregation configuration, validated at construction.
#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// Number of clusters to produce; fixed per run.
    pub num_proposal: usize,
    /// Ball-query radius around each cluster center.
    pub radius: f32,
    /// Fixed capacity of a cluster's member set.
    pub max_group_size: usize,
    /// Center sampling policy.
    pub sampling: SamplingPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            num_proposal: 128,
            radius: 0.3,
            max_group_size: 16,
            sampling: SamplingPolicy::VoteFps,
        }
    }
}

/// Clusters votes into `num_proposal` aggregated proposal seeds.
pub struct VoteAggregator {
    cfg: AggregatorConfig,
    vote_feature_dim: usize,
    mlp: SharedMlp,
}

impl VoteAggregator {
    /// Creates an aggregator, validating the configuration and the MLP shape.
    ///
    /// The MLP consumes `[relative position (3) ‖ vote feature]`, so its
    /// input width must be `3 + vote_feature_dim`; its output width is the
    /// aggregated feature dimension handed to the proposal head.
    pub fn new(
        cfg: AggregatorConfig,
        vote_feature_dim: usize,
        mlp: SharedMlp,
    ) -> VoteBoxResult<Self> {
        if cfg.num_proposal == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "num_proposal must be >= 1",
            });
        }
        if !cfg.radius.is_finite() || cfg.radius <= 0.0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "grouping radius must be positive and finite",
            });
        }
        if cfg.max_group_size == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "max_group_size must be >= 1",
            });
        }
        let expected = 3 + vote_feature_dim;
        if mlp.in_dim() != expected {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected,
                got: mlp.in_dim(),
                context: "aggregation mlp input",
            });
        }
        Ok(Self {
            cfg,
            vote_feature_dim,
            mlp,
        })
    }

    /// Returns the configured cluster count.
    pub fn num_proposal(&self) -> usize {
        self.cfg.num_proposal
    }

    /// Returns the vote feature dimension this aggregator expects.
    pub fn vote_feature_dim(&self) -> usize {
        self.vote_feature_dim
    }

    /// Returns the aggregated feature dimension.
    pub fn aggregated_dim(&self) -> usize {
        self.mlp.out_dim()
    }

    /// Aggregates votes into exactly `num_proposal` clusters.
    ///
    /// `seeds` is consulted only under [`SamplingPolicy::SeedFps`]. An empty
    /// vote set yields origin-centered clusters with zero features.
    pub fn aggregate(&self, seeds: &SeedSet<'_>, votes: &VoteSet) -> VoteBoxResult<ClusterSet> {
        let centers = self.sample_centers(seeds, votes)?;
        let _span = trace_span!(
            "vote_aggregation",
            votes = votes.len(),
            clusters = self.cfg.num_proposal
        )
        .entered();

        let mut clusters = ClusterSet::zeros(self.cfg.num_proposal, self.mlp.out_dim());
        if votes.is_empty() {
            trace_event!("empty_vote_set");
            return Ok(clusters);
        }

        let mut members = Vec::with_capacity(self.cfg.max_group_size);
        let mut scratch = vec![0.0f32; self.mlp.scratch_len()];
        let mut input = vec![0.0f32; 3 + self.vote_feature_dim];
        let mut transformed = vec![0.0f32; self.mlp.out_dim()];
        let mut pooled = vec![0.0f32; self.mlp.out_dim()];
        for (c, center) in centers.iter().enumerate() {
            let count = self.pool_cluster(
                votes,
                center,
                &mut members,
                &mut scratch,
                &mut input,
                &mut transformed,
                &mut pooled,
            );
            clusters.centers[3 * c..3 * c + 3].copy_from_slice(center);
            if count > 0 {
                let dim = self.mlp.out_dim();
                clusters.features[c * dim..(c + 1) * dim].copy_from_slice(&pooled);
            }
            clusters.member_counts[c] = count;
        }

        Ok(clusters)
    }

    /// Parallel variant of [`aggregate`](Self::aggregate); clusters are
    /// independent, so the output is identical to the sequential path.
    #[cfg(feature = "rayon")]
    pub fn aggregate_par(&self, seeds: &SeedSet<'_>, votes: &VoteSet) -> VoteBoxResult<ClusterSet> {
        let centers = self.sample_centers(seeds, votes)?;
        let _span = trace_span!(
            "vote_aggregation",
            votes = votes.len(),
            clusters = self.cfg.num_proposal
        )
        .entered();

        let mut clusters = ClusterSet::zeros(self.cfg.num_proposal, self.mlp.out_dim());
        if votes.is_empty() {
            trace_event!("empty_vote_set");
            return Ok(clusters);
        }

        let dim = self.mlp.out_dim();
        let per_cluster: Vec<(Vec<f32>, usize)> = centers
            .par_iter()
            .map(|center| {
                let mut members = Vec::with_capacity(self.cfg.max_group_size);
                let mut scratch = vec![0.0f32; self.mlp.scratch_len()];
                let mut input = vec![0.0f32; 3 + self.vote_feature_dim];
                let mut transformed = vec![0.0f32; dim];
                let mut pooled = vec![0.0f32; dim];
                let count = self.pool_cluster(
                    votes,
                    center,
                    &mut members,
                    &mut scratch,
                    &mut input,
                    &mut transformed,
                    &mut pooled,
                );
                (pooled, count)
            })
            .collect();

        for (c, (pooled, count)) in per_cluster.into_iter().enumerate() {
            clusters.centers[3 * c..3 * c + 3].copy_from_slice(&centers[c]);
            if count > 0 {
                clusters.features[c * dim..(c + 1) * dim].copy_from_slice(&pooled);
            }
            clusters.member_counts[c] = count;
        }

        Ok(clusters)
    }

    fn sample_centers(
        &self,
        seeds: &SeedSet<'_>,
        votes: &VoteSet,
    ) -> VoteBoxResult<Vec<[f32; 3]>> {
        if votes.feature_dim() != self.vote_feature_dim {
            return Err(VoteBoxError::FeatureDimMismatch {
                expected: self.vote_feature_dim,
                got: votes.feature_dim(),
            });
        }
        if votes.is_empty() {
            return Ok(vec![[0.0; 3]; self.cfg.num_proposal]);
        }

        let m = self.cfg.num_proposal;
        let centers = match self.cfg.sampling {
            SamplingPolicy::VoteFps => {
                farthest_point_sample(&votes.positions, votes.len(), m)
                    .into_iter()
                    .map(|i| {
                        let p = votes.position(i);
                        [p[0], p[1], p[2]]
                    })
                    .collect()
            }
            SamplingPolicy::SeedFps => {
                // Votes are emitted per seed in order, so seed i's first vote
                // sits at index i * vote_factor.
                let vote_factor = votes.len() / seeds.len().max(1);
                let mut positions = Vec::with_capacity(3 * seeds.len());
                for i in 0..seeds.len() {
                    positions.extend_from_slice(seeds.position(i));
                }
                farthest_point_sample(&positions, seeds.len(), m)
                    .into_iter()
                    .map(|i| {
                        let p = votes.position(i * vote_factor);
                        [p[0], p[1], p[2]]
                    })
                    .collect()
            }
        };
        Ok(centers)
    }

    /// Groups votes around `center` and max-pools their transformed features
    /// into `pooled`. Returns the member count; `pooled` is untouched when it
    /// is zero.
    #[allow(clippy::too_many_arguments)]
    fn pool_cluster(
        &self,
        votes: &VoteSet,
        center: &[f32; 3],
        members: &mut Vec<usize>,
        scratch: &mut [f32],
        input: &mut [f32],
        transformed: &mut [f32],
        pooled: &mut [f32],
    ) -> usize {
        ball_query(votes, center, self.cfg.radius, self.cfg.max_group_size, members);
        if members.is_empty() {
            return 0;
        }

        pooled.fill(f32::NEG_INFINITY);
        for &m in members.iter() {
            let p = votes.position(m);
            input[0] = p[0] - center[0];
            input[1] = p[1] - center[1];
            input[2] = p[2] - center[2];
            input[3..].copy_from_slice(votes.feature(m));
            self.mlp.forward_into(input, scratch, transformed);
            for (slot, &value) in pooled.iter_mut().zip(transformed.iter()) {
                if value > *slot {
                    *slot = value;
                }
            }
        }
        members.len()
    }
}
