//! VoteBox is a CPU-first 3D object-detection core built on deep Hough
//! voting.
//!
//! Given the seeds produced by an external point-set backbone (positions plus
//! per-point features), the crate regresses per-seed votes toward object
//! centers, aggregates the votes into a fixed number of proposal clusters,
//! and classifies/regresses each cluster into an oriented 3D bounding box.
//! The whole pipeline is a deterministic pure function of its inputs and the
//! learned parameters, with optional parallelism via the `rayon` feature.

pub mod aggregate;
pub mod cloud;
pub mod detect;
pub mod nn;
pub mod proposal;
mod trace;
pub mod util;
pub mod vote;

pub use aggregate::{AggregatorConfig, SamplingPolicy, VoteAggregator};
pub use cloud::{ClusterSet, SeedSet, VoteSet};
pub use detect::{Detections, Detector, DetectorConfig};
pub use nn::{Linear, SharedMlp};
pub use proposal::{
    assign_targets, Box3d, HeadConfig, HeadingGrid, Proposal, ProposalHead, NEAR_THRESHOLD,
};
pub use util::{VoteBoxError, VoteBoxResult};
pub use vote::{FeatureMode, VoteGenerator};
