//! End-to-end detection pipeline.
//!
//! `Detector` wires the three stages together:
//! seeds → votes → clusters → proposals → boxes. Every stage is a pure
//! transform over its input; the detector holds only the learned parameters
//! and is safe to call concurrently over independent seed sets. A run fails
//! atomically: the first stage error aborts with no partial output.

use crate::aggregate::VoteAggregator;
use crate::cloud::{ClusterSet, SeedSet, VoteSet};
use crate::proposal::{Box3d, Proposal, ProposalHead};
use crate::trace::trace_span;
use crate::util::{VoteBoxError, VoteBoxResult};
use crate::vote::VoteGenerator;

/// Pipeline-level options; the per-stage options live on the stage modules.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Objectness score below which a proposal is reported as background by
    /// [`Detections::confident`].
    pub objectness_threshold: f32,
    /// Evaluate independent elements in parallel (requires the `rayon`
    /// feature; ignored otherwise). Results are identical either way.
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            objectness_threshold: 0.5,
            parallel: false,
        }
    }
}

/// Fixed-size detection output: one proposal and one decoded box per
/// configured cluster.
pub struct Detections {
    proposals: Vec<Proposal>,
    boxes: Vec<Box3d>,
    threshold: f32,
}

impl Detections {
    /// Returns all proposals (always the configured proposal count).
    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    /// Returns the decoded box for every proposal, in proposal order.
    pub fn boxes(&self) -> &[Box3d] {
        &self.boxes
    }

    /// Returns the number of proposals.
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Returns true if there are no proposals.
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Iterates over boxes whose proposal clears the objectness threshold.
    pub fn confident(&self) -> impl Iterator<Item = &Box3d> + '_ {
        self.proposals
            .iter()
            .zip(&self.boxes)
            .filter(|(proposal, _)| proposal.objectness_score() >= self.threshold)
            .map(|(_, decoded)| decoded)
    }
}

/// The assembled detection pipeline.
pub struct Detector {
    cfg: DetectorConfig,
    generator: VoteGenerator,
    aggregator: VoteAggregator,
    head: ProposalHead,
}

impl Detector {
    /// Assembles a detector, validating every cross-stage dimension chain.
    pub fn new(
        cfg: DetectorConfig,
        generator: VoteGenerator,
        aggregator: VoteAggregator,
        head: ProposalHead,
    ) -> VoteBoxResult<Self> {
        if !cfg.objectness_threshold.is_finite()
            || !(0.0..=1.0).contains(&cfg.objectness_threshold)
        {
            return Err(VoteBoxError::InvalidConfig {
                reason: "objectness_threshold must be within [0, 1]",
            });
        }
        if aggregator.vote_feature_dim() != generator.seed_feature_dim() {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: generator.seed_feature_dim(),
                got: aggregator.vote_feature_dim(),
                context: "aggregator vote feature input",
            });
        }
        if head.cluster_feature_dim() != aggregator.aggregated_dim() {
            return Err(VoteBoxError::LayerShapeMismatch {
                expected: aggregator.aggregated_dim(),
                got: head.cluster_feature_dim(),
                context: "head cluster feature input",
            });
        }
        Ok(Self {
            cfg,
            generator,
            aggregator,
            head,
        })
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Returns the proposal head (for decoding or target assignment).
    pub fn head(&self) -> &ProposalHead {
        &self.head
    }

    /// Runs the full pipeline on one seed set.
    pub fn detect(&self, seeds: &SeedSet<'_>) -> VoteBoxResult<Detections> {
        let _span = trace_span!("detect", seeds = seeds.len()).entered();

        let votes = self.run_votes(seeds)?;
        let clusters = self.run_clusters(seeds, &votes)?;
        let proposals = self.run_head(&clusters)?;
        let boxes = proposals
            .iter()
            .map(|proposal| self.head.decode(proposal))
            .collect();

        Ok(Detections {
            proposals,
            boxes,
            threshold: self.cfg.objectness_threshold,
        })
    }

    /// Training hook: gradient computation is the training loop's concern;
    /// this is callable but intentionally does nothing.
    pub fn backward(&self) {}

    fn run_votes(&self, seeds: &SeedSet<'_>) -> VoteBoxResult<VoteSet> {
        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return self.generator.generate_par(seeds);
        }
        self.generator.generate(seeds)
    }

    fn run_clusters(&self, seeds: &SeedSet<'_>, votes: &VoteSet) -> VoteBoxResult<ClusterSet> {
        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return self.aggregator.aggregate_par(seeds, votes);
        }
        self.aggregator.aggregate(seeds, votes)
    }

    fn run_head(&self, clusters: &ClusterSet) -> VoteBoxResult<Vec<Proposal>> {
        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return self.head.predict_par(clusters);
        }
        self.head.predict(clusters)
    }
}
