use crate::analyzer::LocalAnalyzer;
use crate::classifier::ConvexHullClassifier;
use crate::clusters_info::ClustersInfo;
use crate::error::Stage;
use crate::filter::ReductionFilter;
use crate::hull::ConvexHullModel;
use crate::hull_manager::HullManager;
use crate::hyper_parameters::RunConfig;
use crate::message::{Message, Packet, Stream};
use crate::noise::NoiseManager;
use crate::partition::Partition;
use crate::point::{validate_points, DimensionRanges, Point};
use crate::statistics::Statistics;
use crate::topology::{node_label, NodeRole};
use crate::transport::Transport;
use crate::TreeDbscanError;
use log::{debug, info, warn};
use std::time::Instant;

/// Points owned by a back-end.
///
/// Every point is classified at the end of the run, but only the clustering-eligible ones take
/// part in the local DBSCAN and in building the hulls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeafPoints {
    points: Vec<Point>,
    eligible: Vec<bool>,
}

impl LeafPoints {
    /// All points eligible for clustering.
    pub fn new(points: Vec<Point>) -> Self {
        let eligible = vec![true; points.len()];
        LeafPoints { points, eligible }
    }

    /// Keeps only the points matching the predicate for clustering. Classification still covers
    /// every point.
    pub fn restrict_clustering<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Point) -> bool,
    {
        self.eligible = self.points.iter().map(predicate).collect();
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn clustering_subset(&self) -> Vec<Point> {
        self.points
            .iter()
            .zip(self.eligible.iter())
            .filter(|(_, &eligible)| eligible)
            .map(|(p, _)| p.clone())
            .collect()
    }
}

/// What a back-end ends a run with.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafOutcome {
    /// Final cluster id of every local point, in input order.
    pub partition: Partition,
    pub clusters_info: ClustersInfo,
    /// Number of hulls this leaf contributed.
    pub local_hulls: usize,
}

/// Back-end side of the clustering protocol.
pub struct Leaf<'t, T: Transport> {
    transport: &'t mut T,
    uplink: ReductionFilter,
    label: String,
    statistics: Statistics,
}

impl<'t, T: Transport> Leaf<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        let node = transport.node();
        Leaf {
            uplink: ReductionFilter::new(node, NodeRole::Leaf, 0, transport.num_siblings()),
            label: node_label(NodeRole::Leaf, node),
            statistics: Statistics::new(node, NodeRole::Leaf),
            transport,
        }
    }

    /// Runs one clustering run over the leaf's points.
    ///
    /// Errors are tagged with this node's rank and the stage that failed.
    pub fn run(mut self, mut data: LeafPoints) -> Result<LeafOutcome, TreeDbscanError> {
        let node = self.transport.node();
        let started = Instant::now();

        let config = self.receive_config().map_err(|e| e.at(node, Stage::Configuration))?;
        self.exchange_dimensions(&config, &mut data)
            .map_err(|e| e.at(node, Stage::DimensionsExchange))?;
        let local_hulls = self
            .cluster_and_send(&config, &data)
            .map_err(|e| e.at(node, Stage::LocalClustering))?;
        let model = self.receive_global_model().map_err(|e| e.at(node, Stage::HullReduction))?;
        let partition = self.classify(&config, &data, &model);

        let clusters_info = ClustersInfo::from_partition(data.points(), &partition);
        self.statistics.current_mut().total_time = started.elapsed();
        let report = self.statistics.serialize();
        self.send_up(Message::ClustersInfo(clusters_info.clone()))
            .map_err(|e| e.at(node, Stage::Statistics))?;
        self.send_up(Message::Statistics(report)).map_err(|e| e.at(node, Stage::Statistics))?;

        info!(
            "{} {} points classified into {} clusters",
            self.label,
            partition.len(),
            partition.number_of_clusters()
        );
        Ok(LeafOutcome { partition, clusters_info, local_hulls })
    }

    fn receive_config(&mut self) -> Result<RunConfig, TreeDbscanError> {
        let packet = self.transport.recv_on(Stream::Control)?;
        match packet.message {
            Message::Config(config) => {
                debug!("{} Configuration received: {:?}", self.label, config.params);
                Ok(config)
            }
            other => Err(TreeDbscanError::Protocol(format!(
                "expected CONFIG, got {}",
                other.tag()
            ))),
        }
    }

    fn exchange_dimensions(
        &mut self,
        config: &RunConfig,
        data: &mut LeafPoints,
    ) -> Result<(), TreeDbscanError> {
        validate_points(&data.points)?;
        self.send_up(Message::XchangeDimensions(DimensionRanges::of(&data.points)))?;

        let packet = self.transport.recv_on(Stream::Dimensions)?;
        let Message::XchangeDimensions(global) = packet.message else {
            return Err(TreeDbscanError::Protocol(format!(
                "expected XCHANGE_DIMENSIONS, got {}",
                packet.message.tag()
            )));
        };
        if !config.params.normalize() || data.is_empty() {
            return Ok(());
        }
        if global.dims() != data.points[0].dims() {
            return Err(TreeDbscanError::WrongDimension(format!(
                "global ranges have {} dimensions, local points {}",
                global.dims(),
                data.points[0].dims()
            )));
        }
        for point in &mut data.points {
            point.normalize(&global);
        }
        Ok(())
    }

    fn cluster_and_send(
        &mut self,
        config: &RunConfig,
        data: &LeafPoints,
    ) -> Result<usize, TreeDbscanError> {
        let params = &config.params;
        let mut subset = data.clustering_subset();

        let timer = Instant::now();
        let model =
            LocalAnalyzer::new(params.epsilon(), params.min_points()).analyze(&mut subset)?;
        let noise = model.noise_points(&subset);

        let stats = self.statistics.current_mut();
        stats.clustering_time += timer.elapsed();
        stats.input_points = subset.len() as u64;
        stats.output_hulls = model.hulls.len() as u64;
        stats.output_points = noise.len() as u64;
        info!(
            "{} {} hulls and {} noise points out of {} points",
            self.label,
            model.hulls.len(),
            noise.len(),
            subset.len()
        );

        if params.process_noise() {
            self.send_up(Message::Noise(NoiseManager::serialize(&noise)))?;
            self.send_up(Message::AllNoiseSent)?;
        }
        self.send_up(Message::AllHulls(HullManager::serialize_all(&model.hulls)))?;
        self.send_up(Message::AllHullsSent)?;
        Ok(model.hulls.len())
    }

    fn receive_global_model(&mut self) -> Result<Vec<ConvexHullModel>, TreeDbscanError> {
        let mut model = Vec::new();
        loop {
            let packet = self.transport.recv_on(Stream::Hulls)?;
            match packet.message {
                Message::AllHulls(batch) => model.push(HullManager::deserialize_one(&batch)?),
                Message::AllHullsSent => break,
                other => warn!(
                    "{} Unexpected {} from node {}, dropped",
                    self.label,
                    other.tag(),
                    packet.from
                ),
            }
        }
        debug!("{} Global model of {} hulls received", self.label, model.len());
        Ok(model)
    }

    fn classify(
        &mut self,
        config: &RunConfig,
        data: &LeafPoints,
        model: &[ConvexHullModel],
    ) -> Partition {
        let timer = Instant::now();
        let classifier = ConvexHullClassifier::new(model, config.params.epsilon());
        #[cfg(feature = "parallel")]
        let partition = classifier.classify_par(data.points());
        #[cfg(not(feature = "parallel"))]
        let partition = classifier.classify(data.points());
        self.statistics.current_mut().classification_time += timer.elapsed();
        partition
    }

    /// Upward sends go through the leaf's bypass filter.
    fn send_up(&mut self, message: Message) -> Result<(), TreeDbscanError> {
        let node = self.transport.node();
        for packet in self.uplink.process(Packet::up(node, message)) {
            self.transport.send_up(packet.message)?;
        }
        Ok(())
    }
}

/// Runs the back-end protocol of one leaf over the given transport.
pub fn run_leaf<T: Transport>(
    transport: &mut T,
    data: LeafPoints,
) -> Result<LeafOutcome, TreeDbscanError> {
    Leaf::new(transport).run(data)
}
