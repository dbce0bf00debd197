//! Proposal head: classification, heading, size, and box decoding.
//!
//! Each cluster's aggregated feature passes through a shared trunk and one
//! linear output whose row is sliced into an explicit [`Proposal`] bundle
//! with named fields (no loosely-typed maps). Decoding into a [`Box3d`] is a
//! separate pure step, so callers can inspect raw logits or boxes as needed.

use crate::cloud::ClusterSet;
use crate::nn::{Linear, SharedMlp};
use crate::trace::{trace_event, trace_span};
use crate::util::{VoteBoxError, VoteBoxResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub(crate) mod assign;
pub(crate) mod decode;
pub(crate) mod heading;

pub use assign::{assign_targets, NEAR_THRESHOLD};
pub use decode::Box3d;
pub use heading::HeadingGrid;

/// Head configuration: class count, discretizations, and size templates.
#[derive(Clone, Debug)]
pub struct HeadConfig {
    /// Number of object categories.
    pub num_class: usize,
    /// Number of discrete heading bins over [0, 2π).
    pub num_heading_bin: usize,
    /// Number of canonical size templates.
    pub num_size_cluster: usize,
    /// One mean size (w, l, h) per template; length must equal
    /// `num_size_cluster`.
    pub mean_size_arr: Vec<[f32; 3]>,
}

impl HeadConfig {
    fn validate(&self) -> VoteBoxResult<()> {
        if self.num_class == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "num_class must be >= 1",
            });
        }
        if self.num_size_cluster == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "num_size_cluster must be >= 1",
            });
        }
        if self.mean_size_arr.len() != self.num_size_cluster {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: self.num_size_cluster,
                got: self.mean_size_arr.len(),
                context: "mean_size_arr rows",
            });
        }
        Ok(())
    }

    /// Width of the head output row for this configuration.
    pub fn output_width(&self) -> usize {
        1 + 3 + 2 * self.num_heading_bin + 4 * self.num_size_cluster + self.num_class
    }
}

/// Raw per-cluster prediction bundle with named fields.
///
/// All slices keep the layout declared by [`HeadConfig`]; `size_residuals`
/// packs one 3-vector per size template.
#[derive(Clone, Debug)]
pub struct Proposal {
    /// Raw objectness logit (before sigmoid).
    pub objectness_logit: f32,
    /// Predicted center offset from the cluster center.
    pub center_offset: [f32; 3],
    /// Per-class logits, length `num_class`.
    pub class_logits: Vec<f32>,
    /// Per-bin heading logits, length `num_heading_bin`.
    pub heading_bin_logits: Vec<f32>,
    /// Per-bin heading residuals in radians, length `num_heading_bin`.
    pub heading_residuals: Vec<f32>,
    /// Per-template size logits, length `num_size_cluster`.
    pub size_cluster_logits: Vec<f32>,
    /// Per-template size residuals, length `3 * num_size_cluster`.
    pub size_residuals: Vec<f32>,
    /// Representative center of the originating cluster.
    pub cluster_center: [f32; 3],
    /// Number of votes the originating cluster aggregated.
    pub member_count: usize,
}

impl Proposal {
    /// Objectness probability; 0 for proposals from empty clusters.
    pub fn objectness_score(&self) -> f32 {
        decode::objectness_score(self.objectness_logit, self.member_count)
    }
}

/// Per-cluster prediction head.
pub struct ProposalHead {
    cfg: HeadConfig,
    grid: HeadingGrid,
    trunk: SharedMlp,
    out: Linear,
}

impl ProposalHead {
    /// Creates a head, validating the configuration and the layer chain.
    ///
    /// `trunk` consumes the aggregated cluster feature; `out` must produce
    /// exactly [`HeadConfig::output_width`] values.
    pub fn new(cfg: HeadConfig, trunk: SharedMlp, out: Linear) -> VoteBoxResult<Self> {
        cfg.validate()?;
        let grid = HeadingGrid::new(cfg.num_heading_bin)?;
        if out.in_dim() != trunk.out_dim() {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: trunk.out_dim(),
                got: out.in_dim(),
                context: "proposal output input",
            });
        }
        let needed = cfg.output_width();
        if out.out_dim() != needed {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: needed,
                got: out.out_dim(),
                context: "proposal output width",
            });
        }
        Ok(Self {
            cfg,
            grid,
            trunk,
            out,
        })
    }

    /// Returns the head configuration.
    pub fn config(&self) -> &HeadConfig {
        &self.cfg
    }

    /// Returns the heading grid used for decoding.
    pub fn heading_grid(&self) -> &HeadingGrid {
        &self.grid
    }

    /// Returns the cluster feature dimension this head expects.
    pub fn cluster_feature_dim(&self) -> usize {
        self.trunk.in_dim()
    }

    /// Predicts one proposal per cluster.
    pub fn predict(&self, clusters: &ClusterSet) -> VoteBoxResult<Vec<Proposal>> {
        self.check_dims(clusters)?;
        let _span = trace_span!("proposal_head", clusters = clusters.len()).entered();

        let mut scratch = vec![0.0f32; self.trunk.scratch_len()];
        let mut trunk_out = vec![0.0f32; self.trunk.out_dim()];
        let mut row = vec![0.0f32; self.out.out_dim()];
        let mut proposals = Vec::with_capacity(clusters.len());
        for c in 0..clusters.len() {
            self.trunk
                .forward_into(clusters.feature(c), &mut scratch, &mut trunk_out);
            self.out.forward_into(&trunk_out, &mut row);
            proposals.push(self.slice_row(clusters, c, &row));
        }

        trace_event!("proposals_emitted", count = proposals.len());
        Ok(proposals)
    }

    /// Parallel variant of [`predict`](Self::predict); output is identical
    /// to the sequential path.
    #[cfg(feature = "rayon")]
    pub fn predict_par(&self, clusters: &ClusterSet) -> VoteBoxResult<Vec<Proposal>> {
        self.check_dims(clusters)?;
        let _span = trace_span!("proposal_head", clusters = clusters.len()).entered();

        let proposals: Vec<Proposal> = (0..clusters.len())
            .into_par_iter()
            .map(|c| {
                let mut scratch = vec![0.0f32; self.trunk.scratch_len()];
                let mut trunk_out = vec![0.0f32; self.trunk.out_dim()];
                let mut row = vec![0.0f32; self.out.out_dim()];
                self.trunk
                    .forward_into(clusters.feature(c), &mut scratch, &mut trunk_out);
                self.out.forward_into(&trunk_out, &mut row);
                self.slice_row(clusters, c, &row)
            })
            .collect();

        trace_event!("proposals_emitted", count = proposals.len());
        Ok(proposals)
    }

    /// Decodes one proposal into its oriented box.
    pub fn decode(&self, proposal: &Proposal) -> Box3d {
        decode::decode_proposal(proposal, &self.grid, &self.cfg.mean_size_arr)
    }

    fn check_dims(&self, clusters: &ClusterSet) -> VoteBoxResult<()> {
        if clusters.feature_dim() != self.trunk.in_dim() {
            return Err(VoteBoxError::FeatureDimMismatch {
                expected: self.trunk.in_dim(),
                got: clusters.feature_dim(),
            });
        }
        Ok(())
    }

    /// Slices a raw output row into the named bundle.
    ///
    /// Layout: objectness (1), center offset (3), heading bin logits (NH),
    /// heading residuals (NH), size logits (NS), size residuals (3*NS),
    /// class logits (K).
    fn slice_row(&self, clusters: &ClusterSet, c: usize, row: &[f32]) -> Proposal {
        let nh = self.cfg.num_heading_bin;
        let ns = self.cfg.num_size_cluster;
        let k = self.cfg.num_class;

        let mut cursor = 0usize;
        let objectness_logit = row[cursor];
        cursor += 1;
        let center_offset = [row[cursor], row[cursor + 1], row[cursor + 2]];
        cursor += 3;
        let heading_bin_logits = row[cursor..cursor + nh].to_vec();
        cursor += nh;
        let heading_residuals = row[cursor..cursor + nh].to_vec();
        cursor += nh;
        let size_cluster_logits = row[cursor..cursor + ns].to_vec();
        cursor += ns;
        let size_residuals = row[cursor..cursor + 3 * ns].to_vec();
        cursor += 3 * ns;
        let class_logits = row[cursor..cursor + k].to_vec();

        let center = clusters.center(c);
        Proposal {
            objectness_logit,
            center_offset,
            class_logits,
            heading_bin_logits,
            heading_residuals,
            size_cluster_logits,
            size_residuals,
            cluster_center: [center[0], center[1], center[2]],
            member_count: clusters.member_count(c),
        }
    }
}
