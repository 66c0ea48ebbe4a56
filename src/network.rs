use crate::coordinator::{run_root, Coordinator, RootReport};
use crate::filter::run_filter;
use crate::hyper_parameters::RunConfig;
use crate::leaf::{run_leaf, LeafOutcome, LeafPoints};
use crate::point::Point;
use crate::topology::{NodeId, NodeRole, TreeTopology};
use crate::transport::{AbortHandle, ChannelTransport};
use crate::TreeDbscanError;
use log::{error, info};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::thread;

/// Outcome of one run over the whole tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRun {
    pub root: RootReport,
    /// Final classification of every leaf, keyed by leaf rank.
    pub leaves: BTreeMap<NodeId, LeafOutcome>,
}

enum NodeOutcome {
    Root(RootReport),
    Filter,
    Leaf(LeafOutcome),
}

/// A reduction tree deployed in-process: one OS thread per tree node, talking over channels.
#[derive(Debug, Clone)]
pub struct LocalTree {
    topology: TreeTopology,
}

impl LocalTree {
    /// # Parameters
    /// * num_leaves - number of back-ends holding points
    /// * fanout - maximum number of children of every node
    pub fn new(num_leaves: usize, fanout: usize) -> Result<Self, TreeDbscanError> {
        Ok(LocalTree { topology: TreeTopology::balanced(num_leaves, fanout)? })
    }

    pub fn from_topology(topology: TreeTopology) -> Self {
        LocalTree { topology }
    }

    pub fn topology(&self) -> &TreeTopology {
        &self.topology
    }

    /// Runs one clustering run, every point of each leaf taking part in the clustering.
    ///
    /// # Parameters
    /// * config - run configuration broadcast by the root
    /// * leaf_points - one point set per leaf, in ascending leaf rank order
    pub fn run(
        &self,
        config: RunConfig,
        leaf_points: Vec<Vec<Point>>,
    ) -> Result<TreeRun, TreeDbscanError> {
        self.run_with(config, leaf_points.into_iter().map(LeafPoints::new).collect())
    }

    /// Same as `run`, with control over which points of each leaf are clustered.
    pub fn run_with(
        &self,
        config: RunConfig,
        leaf_points: Vec<LeafPoints>,
    ) -> Result<TreeRun, TreeDbscanError> {
        let leaves = self.topology.leaves();
        if leaf_points.len() != leaves.len() {
            return Err(TreeDbscanError::Configuration(format!(
                "{} point sets given for {} leaves",
                leaf_points.len(),
                leaves.len()
            )));
        }
        info!(
            "[FE] Running over {} nodes, {} of them leaves",
            self.topology.len(),
            leaves.len()
        );

        let mut data: BTreeMap<NodeId, LeafPoints> = leaves.into_iter().zip(leaf_points).collect();
        let coordinator = Coordinator::new(config);
        let (transports, abort) = ChannelTransport::wire(&self.topology);
        let first_failure: Mutex<Option<TreeDbscanError>> = Mutex::new(None);

        let outcomes = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(transports.len());
            for (node, mut transport) in transports.into_iter().enumerate() {
                let role = self.topology.role(node);
                let points = data.remove(&node).unwrap_or_default();
                let coordinator = &coordinator;
                let abort = &abort;
                let first_failure = &first_failure;
                let handle = thread::Builder::new()
                    .name(self.topology.label(node))
                    .spawn_scoped(scope, move || {
                        let outcome = match role {
                            NodeRole::Root => {
                                run_root(&mut transport, coordinator).map(NodeOutcome::Root)
                            }
                            NodeRole::Filter => {
                                run_filter(&mut transport).map(|_| NodeOutcome::Filter)
                            }
                            NodeRole::Leaf => {
                                run_leaf(&mut transport, points).map(NodeOutcome::Leaf)
                            }
                        };
                        outcome.map_err(|e| fail(node, e, abort, first_failure))
                    });
                match handle {
                    Ok(handle) => handles.push((node, handle)),
                    Err(e) => {
                        abort.abort(node);
                        return Err(TreeDbscanError::Io(e));
                    }
                }
            }
            Ok(handles
                .into_iter()
                .map(|(node, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        let e = TreeDbscanError::Protocol(format!("node {node} panicked"));
                        Err(fail(node, e, &abort, &first_failure))
                    })
                })
                .collect::<Vec<_>>())
        })?;

        let first = first_failure.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(e) = first {
            return Err(e);
        }

        let mut root = None;
        let mut leaves = BTreeMap::new();
        for (node, outcome) in outcomes.into_iter().enumerate() {
            match outcome? {
                NodeOutcome::Root(report) => root = Some(report),
                NodeOutcome::Leaf(outcome) => {
                    leaves.insert(node, outcome);
                }
                NodeOutcome::Filter => {}
            }
        }
        let root = root.ok_or_else(|| {
            TreeDbscanError::Protocol(String::from("the root finished without a report"))
        })?;
        Ok(TreeRun { root, leaves })
    }
}

/// Records the first failure of the run and wakes the rest of the tree up. Returns a marker
/// error for the failing thread; the recorded one is what the run reports.
fn fail(
    node: NodeId,
    e: TreeDbscanError,
    abort: &AbortHandle,
    first_failure: &Mutex<Option<TreeDbscanError>>,
) -> TreeDbscanError {
    error!("Node {node} failed: {e}");
    let mut first = first_failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let marker = TreeDbscanError::Transport(format!("node {node} failed"));
    if first.is_none() {
        *first = Some(e);
        drop(first);
        abort.abort(node);
    }
    marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyper_parameters::ClusteringParams;
    use crate::partition::NOISE_CLUSTER_ID;
    use crate::topology::ROOT;

    fn blob(x0: f64, y0: f64) -> Vec<Point> {
        (0..25)
            .map(|n| {
                Point::xy(x0 + (n % 5) as f64 * 0.01, y0 + (n / 5) as f64 * 0.01).with_duration(2)
            })
            .collect()
    }

    fn config() -> RunConfig {
        RunConfig::new(
            ClusteringParams::builder().epsilon(0.02).min_points(4).normalize(false).build(),
        )
    }

    #[test]
    fn clusters_split_across_leaves_are_merged() {
        let tree = LocalTree::new(2, 2).unwrap();
        let left = blob(0.0, 0.0);
        let mut right = blob(0.035, 0.0);
        right.extend(blob(1.0, 1.0));
        let run = tree.run(config(), vec![left, right]).unwrap();

        assert_eq!(2, run.root.global_model.len());
        let assignment_left = run.leaves[&1].partition.assignment().to_vec();
        let assignment_right = run.leaves[&2].partition.assignment().to_vec();
        let shared = assignment_left[0];
        assert!(assignment_left.iter().all(|&id| id == shared));
        assert!(assignment_right[..25].iter().all(|&id| id == shared));
        assert!(assignment_right[25..].iter().all(|&id| id != shared && id != NOISE_CLUSTER_ID));
        assert_eq!(3, run.root.statistics.len());
        assert!(run.root.statistics.get(ROOT).is_some());
        assert_eq!(75, run.root.clusters_info.iter().map(|c| c.individuals).sum::<u64>());
    }

    #[test]
    fn point_sets_must_match_the_leaves() {
        let tree = LocalTree::new(3, 2).unwrap();
        let err = tree.run(config(), vec![blob(0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, TreeDbscanError::Configuration(_)));
    }

    #[test]
    fn a_failing_leaf_aborts_the_run() {
        let tree = LocalTree::new(4, 2).unwrap();
        let bad = vec![Point::xy(0.0, 0.0), Point::new(vec![1.0, 2.0, 3.0])];
        let err = tree
            .run(config(), vec![blob(0.0, 0.0), bad, blob(1.0, 0.0), blob(2.0, 0.0)])
            .unwrap_err();
        let TreeDbscanError::Node { node, source, .. } = err else {
            panic!("expected a node failure, got {err}");
        };
        assert_eq!(tree.topology().leaves()[1], node);
        assert!(matches!(*source, TreeDbscanError::WrongDimension(_)));
    }
}
