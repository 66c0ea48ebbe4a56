use crate::clusters_info::ClustersInfo;
use crate::error::Stage;
use crate::filter::ReductionFilter;
use crate::hull::ConvexHullModel;
use crate::hull_manager::HullManager;
use crate::hyper_parameters::RunConfig;
use crate::message::{Direction, Message, Packet, Tag};
use crate::point::DimensionRanges;
use crate::statistics::StatisticsReport;
use crate::topology::{node_label, NodeRole, ROOT};
use crate::transport::Transport;
use crate::TreeDbscanError;
use log::{debug, info, warn};
use std::cmp::Reverse;
use std::time::Instant;

/// Turns the fully merged top of the tree into the global model.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinator {
    config: RunConfig,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Self {
        Coordinator { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Drops the hulls less dense than the configured min points and numbers the rest by
    /// descending total time, so cluster 1 is the one that ran the longest.
    pub fn finalize(&self, hulls: Vec<ConvexHullModel>) -> Vec<ConvexHullModel> {
        self.finalize_by(hulls, ConvexHullModel::total_time)
    }

    /// Same as `finalize` with a caller supplied sort key, largest first. Hulls with equal keys
    /// keep their merge order.
    ///
    /// # Parameters
    /// * hulls - output of the last merge pass
    /// * key - value ranking the surviving hulls
    pub fn finalize_by<K, F>(&self, hulls: Vec<ConvexHullModel>, key: F) -> Vec<ConvexHullModel>
    where
        K: Ord,
        F: Fn(&ConvexHullModel) -> K,
    {
        let min_points = self.config.params.min_points() as i64;
        let mut model: Vec<ConvexHullModel> =
            hulls.into_iter().filter(|hull| hull.density() >= min_points).collect();
        model.sort_by_key(|hull| Reverse(key(hull)));
        model
    }
}

/// Everything the root gathered over one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootReport {
    /// The broadcast model, cluster `i + 1` being hull `i`.
    pub global_model: Vec<ConvexHullModel>,
    pub dimensions: DimensionRanges,
    pub clusters_info: ClustersInfo,
    pub statistics: StatisticsReport,
    /// Noise points no tree level could cluster. Always 0 without noise processing.
    pub remaining_noise: usize,
}

/// Front-end side of the clustering protocol.
///
/// Broadcasts the configuration, then feeds every packet of the children through the root's
/// reduction filter and acts on what comes out of it: the global dimension ranges and the
/// finalized model go back down, while the cluster information and the statistics end the run.
pub fn run_root<T: Transport>(
    transport: &mut T,
    coordinator: &Coordinator,
) -> Result<RootReport, TreeDbscanError> {
    let label = node_label(NodeRole::Root, ROOT);
    let started = Instant::now();
    let mut filter = ReductionFilter::new(
        transport.node(),
        NodeRole::Root,
        transport.num_children(),
        transport.num_siblings(),
    );

    let config = Message::Config(coordinator.config().clone());
    for packet in filter.process(Packet::down(ROOT, config)) {
        transport.send_down(packet.message).map_err(|e| e.at(ROOT, Stage::Configuration))?;
    }
    info!("{label} Configuration sent to {} children", transport.num_children());

    let mut report = RootReport::default();
    let mut top_level = Vec::new();
    let mut info_received = false;
    loop {
        let packet = transport.recv().map_err(|e| e.at(ROOT, Stage::HullReduction))?;
        for out in filter.process(packet) {
            if out.direction == Direction::Down {
                transport.send_down(out.message).map_err(|e| e.at(ROOT, Stage::Configuration))?;
                continue;
            }
            match out.message {
                Message::XchangeDimensions(ranges) => {
                    debug!("{label} Global dimensions {:?} - {:?}", ranges.min, ranges.max);
                    report.dimensions = ranges.clone();
                    transport
                        .send_down(Message::XchangeDimensions(ranges))
                        .map_err(|e| e.at(ROOT, Stage::DimensionsExchange))?;
                }
                Message::Noise(batch) => {
                    report.remaining_noise += batch.len();
                }
                Message::AllNoiseSent => {
                    info!("{label} {} noise points left unclustered", report.remaining_noise);
                }
                Message::AllHulls(batch) => {
                    let hulls = HullManager::deserialize_all(&batch)
                        .map_err(|e| e.at(ROOT, Stage::HullReduction))?;
                    top_level.extend(hulls);
                }
                Message::AllHullsSent => {
                    let candidates = top_level.len();
                    report.global_model = coordinator.finalize(std::mem::take(&mut top_level));
                    info!(
                        "{label} Global model of {} clusters ({} hulls below min points dropped)",
                        report.global_model.len(),
                        candidates - report.global_model.len()
                    );
                    broadcast_model(transport, &report.global_model)
                        .map_err(|e| e.at(ROOT, Stage::HullReduction))?;
                }
                Message::ClustersInfo(clusters_info) => {
                    report.clusters_info = clusters_info;
                    info_received = true;
                }
                Message::Statistics(statistics) => {
                    report.statistics = statistics;
                    if let Some(root) = report.statistics.nodes.get_mut(&ROOT) {
                        root.total_time = started.elapsed();
                    }
                    if !info_received {
                        warn!("{label} Statistics completed before the cluster information");
                    }
                    info!("{label} Run complete in {:?}", started.elapsed());
                    return Ok(report);
                }
                Message::Config(_) => {
                    warn!("{label} Unexpected {} reached the coordinator, dropped", Tag::Config);
                }
            }
        }
    }
}

/// Sends the global model down one hull per message, in cluster order, then the sentinel.
fn broadcast_model<T: Transport>(
    transport: &T,
    model: &[ConvexHullModel],
) -> Result<(), TreeDbscanError> {
    for hull in model {
        transport.send_down(Message::AllHulls(HullManager::serialize_one(hull)))?;
    }
    transport.send_down(Message::AllHullsSent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyper_parameters::{ClusteringParams, MinPointsPolicy};
    use crate::point::Point;
    use crate::statistics::Statistics;
    use crate::topology::TreeTopology;
    use crate::transport::ChannelTransport;

    fn hull(x0: f64, density: usize, duration: u64) -> ConvexHullModel {
        let mut points = vec![
            Point::xy(x0, 0.0),
            Point::xy(x0 + 1.0, 0.0),
            Point::xy(x0 + 1.0, 1.0),
            Point::xy(x0, 1.0),
        ];
        while points.len() < density {
            points.push(Point::xy(x0 + 0.5, 0.5));
        }
        points.truncate(density);
        let points: Vec<Point> = points.into_iter().map(|p| p.with_duration(duration)).collect();
        let refs: Vec<&Point> = points.iter().collect();
        ConvexHullModel::build(&refs)
    }

    fn coordinator(min_points: usize) -> Coordinator {
        let params = ClusteringParams::builder()
            .epsilon(0.05)
            .min_points(min_points)
            .min_points_policy(MinPointsPolicy::Fixed)
            .normalize(false)
            .build();
        Coordinator::new(RunConfig::new(params))
    }

    #[test]
    fn sparse_hulls_are_dropped_and_the_rest_sorted_by_duration() {
        let hulls = vec![hull(0.0, 40, 1), hull(3.0, 2, 100), hull(6.0, 15, 10)];
        let model = coordinator(10).finalize(hulls);
        assert_eq!(vec![15, 40], model.iter().map(ConvexHullModel::density).collect::<Vec<_>>());
        let times: Vec<i64> = model.iter().map(ConvexHullModel::total_time).collect();
        assert_eq!(vec![150, 40], times);
    }

    #[test]
    fn equal_keys_keep_their_order() {
        let hulls = vec![hull(0.0, 12, 1), hull(3.0, 20, 1), hull(6.0, 12, 2)];
        let model = coordinator(10).finalize_by(hulls, ConvexHullModel::density);
        let times: Vec<i64> = model.iter().map(ConvexHullModel::total_time).collect();
        assert_eq!(vec![20, 12, 24], times);
    }

    fn feed_leaves(transports: &[ChannelTransport], leaves: &[(usize, f64, usize)]) {
        for &(leaf, x0, density) in leaves {
            let transport = &transports[leaf];
            let ranges = DimensionRanges { min: vec![x0, 0.0], max: vec![x0 + 1.0, 1.0] };
            transport.send_up(Message::XchangeDimensions(ranges)).unwrap();
            transport
                .send_up(Message::AllHulls(HullManager::serialize_one(&hull(x0, density, 1))))
                .unwrap();
            transport.send_up(Message::AllHullsSent).unwrap();
            transport.send_up(Message::ClustersInfo(ClustersInfo::default())).unwrap();
            let stats = Statistics::new(leaf, NodeRole::Leaf);
            transport.send_up(Message::Statistics(stats.serialize())).unwrap();
        }
    }

    #[test]
    fn root_run_broadcasts_and_collects() {
        let topology = TreeTopology::balanced(2, 2).unwrap();
        let (mut transports, _abort) = ChannelTransport::wire(&topology);
        feed_leaves(&transports, &[(1, 0.0, 12), (2, 0.5, 30)]);

        let report = run_root(&mut transports[0], &coordinator(10)).unwrap();
        assert_eq!(1, report.global_model.len());
        assert_eq!(42, report.global_model[0].density());
        assert_eq!(vec![0.0, 0.0], report.dimensions.min);
        assert_eq!(vec![1.5, 1.0], report.dimensions.max);
        assert_eq!(3, report.statistics.len());
        assert_eq!(1, report.statistics.get(ROOT).unwrap().valid_intersects);

        for leaf in [1, 2] {
            let tags: Vec<Tag> = (0..4).map(|_| transports[leaf].recv().unwrap().tag()).collect();
            assert_eq!(
                vec![Tag::Config, Tag::XchangeDimensions, Tag::AllHulls, Tag::AllHullsSent],
                tags
            );
        }
    }

    #[test]
    fn global_model_goes_down_one_hull_per_message() {
        let topology = TreeTopology::balanced(2, 2).unwrap();
        let (mut transports, _abort) = ChannelTransport::wire(&topology);
        feed_leaves(&transports, &[(1, 0.0, 12), (2, 5.0, 30)]);

        let report = run_root(&mut transports[0], &coordinator(10)).unwrap();
        assert_eq!(2, report.global_model.len());

        let leaf = &mut transports[1];
        assert_eq!(Tag::Config, leaf.recv().unwrap().tag());
        assert_eq!(Tag::XchangeDimensions, leaf.recv().unwrap().tag());
        for expected in &report.global_model {
            let Message::AllHulls(batch) = leaf.recv().unwrap().message else {
                panic!("expected a hull");
            };
            assert_eq!(*expected, HullManager::deserialize_one(&batch).unwrap());
        }
        assert_eq!(Tag::AllHullsSent, leaf.recv().unwrap().tag());
    }
}
