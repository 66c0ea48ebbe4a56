//! Distributed DBSCAN clustering over a tree-based reduction network.
//!
//! Every back-end (leaf) of the tree runs DBSCAN over its own points and describes each cluster
//! found with its convex hull. The hulls travel up the tree: every internal node waits for all of
//! its children, merges the hulls that intersect (or lie within epsilon of each other) and
//! forwards the result. The front-end (root) drops the hulls that are too sparse, numbers the rest
//! by the total duration of the points they stand for, and broadcasts this global model back down
//! so every back-end can classify its complete point set against it.
//!
//! Points are typically the CPU bursts of a parallel program trace: two dimensional points
//! carrying an instance id and a duration. Cluster 0 is always noise.
//!
//! The protocol is written against the [`Transport`] trait. [`LocalTree`] deploys a whole tree
//! in-process, one thread per tree node.
//!
//! # Examples
//! ```
//!use tree_dbscan::{ClusteringParams, LocalTree, Point, RunConfig};
//!
//!let blob = |x0: f64| -> Vec<Point> {
//!    (0..16).map(|n| Point::xy(x0 + (n % 4) as f64 * 0.01, (n / 4) as f64 * 0.01)).collect()
//!};
//!let params = ClusteringParams::builder()
//!    .epsilon(0.02)
//!    .min_points(4)
//!    .normalize(false)
//!    .build();
//!
//!let tree = LocalTree::new(2, 2).unwrap();
//!let run = tree.run(RunConfig::new(params), vec![blob(0.0), blob(5.0)]).unwrap();
//!assert_eq!(2, run.root.global_model.len());
//!assert!(run.leaves.values().all(|leaf| leaf.partition.number_of_clusters() == 1));
//! ```

pub use crate::analyzer::{build_hulls, LocalAnalyzer, LocalModel};
pub use crate::classifier::ConvexHullClassifier;
pub use crate::clusters_info::{ClusterStatistics, ClustersInfo};
pub use crate::coordinator::{run_root, Coordinator, RootReport};
pub use crate::dbscan::Dbscan;
pub use crate::error::{Stage, TreeDbscanError};
pub use crate::filter::{run_filter, FilterState, ReductionFilter};
pub use crate::hull::{ConvexHullModel, HullParts, HullVertex, HULL_DIMENSIONS, MIN_HULL_POINTS};
pub use crate::hull_manager::{HullManager, WireHullBatch};
pub use crate::hyper_parameters::{
    ClusteringParams, ClusteringParamsBuilder, MinPointsPolicy, RunConfig,
    WEIGHTED_MIN_POINTS_FLOOR,
};
pub use crate::leaf::{run_leaf, Leaf, LeafOutcome, LeafPoints};
pub use crate::merge::{merge_pass, MergeOutcome};
pub use crate::message::{Direction, Message, Packet, Stream, Tag};
pub use crate::network::{LocalTree, TreeRun};
pub use crate::noise::{NoiseBatch, NoiseManager, NoiseOutcome};
pub use crate::partition::{ClusterId, Partition, NOISE_CLUSTER_ID};
pub use crate::point::{DimensionRanges, InstanceId, Point};
pub use crate::statistics::{NodeStatistics, Statistics, StatisticsReport};
pub use crate::topology::{NodeId, NodeRole, TreeTopology, ROOT};
pub use crate::transport::{AbortHandle, ChannelTransport, Transport};

mod analyzer;
mod classifier;
mod clusters_info;
mod coordinator;
mod dbscan;
mod distance;
mod error;
mod filter;
mod hull;
mod hull_manager;
mod hyper_parameters;
mod leaf;
mod merge;
mod message;
mod network;
mod noise;
mod partition;
mod point;
mod statistics;
mod topology;
mod transport;
