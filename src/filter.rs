use crate::clusters_info::ClustersInfo;
use crate::hull::ConvexHullModel;
use crate::hull_manager::HullManager;
use crate::hyper_parameters::RunConfig;
use crate::merge::merge_pass;
use crate::message::{Direction, Message, Packet, Tag};
use crate::noise::NoiseManager;
use crate::point::{DimensionRanges, Point};
use crate::statistics::{Statistics, StatisticsReport};
use crate::topology::{node_label, NodeId, NodeRole};
use crate::transport::Transport;
use crate::TreeDbscanError;
use log::{debug, error, info, warn};
use std::time::Instant;

/// Progress of a filter through one clustering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No run in progress.
    Idle,
    /// Collecting the children's outputs.
    Accumulating,
    /// The merged hulls went upward; cluster information and statistics are still expected.
    Forwarded,
}

/// Aggregation stage sitting at every tree position that sends upward.
///
/// Every upward stream is reduced with a countdown latch over the children: the accumulated
/// outputs are only combined and forwarded once each child has reported. Downward packets are
/// forwarded untouched, except that the run configuration is captured on its way down. A filter
/// without children bypasses and forwards everything verbatim.
#[derive(Debug)]
pub struct ReductionFilter {
    node: NodeId,
    label: String,
    num_children: usize,
    num_siblings: usize,
    config: RunConfig,
    configured: bool,
    state: FilterState,
    needs_reset: bool,

    dims_pending: usize,
    dims: DimensionRanges,
    noise_pending: usize,
    noise: Vec<Point>,
    hulls_pending: usize,
    hulls: Vec<ConvexHullModel>,
    info_pending: usize,
    info: ClustersInfo,
    stats_pending: usize,
    statistics: Statistics,
    wait_started: Option<Instant>,
}

impl ReductionFilter {
    /// # Parameters
    /// * node - rank of the tree position the filter is attached to
    /// * role - role of that position, only used to label log lines and statistics
    /// * num_children - number of children to wait for, 0 to bypass
    /// * num_siblings - number of other children of the parent, used to weight min points
    pub fn new(node: NodeId, role: NodeRole, num_children: usize, num_siblings: usize) -> Self {
        ReductionFilter {
            node,
            label: node_label(role, node),
            num_children,
            num_siblings,
            config: RunConfig::default(),
            configured: false,
            state: FilterState::Idle,
            needs_reset: true,
            dims_pending: 0,
            dims: DimensionRanges::default(),
            noise_pending: 0,
            noise: Vec::new(),
            hulls_pending: 0,
            hulls: Vec::new(),
            info_pending: 0,
            info: ClustersInfo::default(),
            stats_pending: 0,
            statistics: Statistics::new(node, role),
            wait_started: None,
        }
    }

    pub fn is_bypass(&self) -> bool {
        self.num_children == 0
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Run configuration captured from the downward broadcast, if it went through already.
    pub fn config(&self) -> Option<&RunConfig> {
        self.configured.then_some(&self.config)
    }

    /// Counters of this filter for the current run.
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Min points used for the merges and the noise clustering at this tree level.
    pub fn effective_min_points(&self) -> usize {
        let params = &self.config.params;
        params.min_points_policy().effective_min_points(
            params.min_points(),
            self.num_siblings,
            self.num_children,
        )
    }

    /// Handles one incoming packet.
    ///
    /// # Returns
    /// * the packets to send on, each tagged with the direction it must travel
    pub fn process(&mut self, packet: Packet) -> Vec<Packet> {
        if self.is_bypass() {
            return vec![packet];
        }
        match packet.direction {
            Direction::Down => {
                if let Message::Config(config) = &packet.message {
                    self.config = config.clone();
                    self.configured = true;
                }
                vec![Packet::down(self.node, packet.message)]
            }
            Direction::Up => {
                self.start_run_if_needed();
                self.reduce(packet)
            }
        }
    }

    fn start_run_if_needed(&mut self) {
        if !self.needs_reset {
            return;
        }
        debug!("{} New run, waiting for {} children", self.label, self.num_children);
        if !self.configured {
            warn!("{} No run configuration received, using defaults", self.label);
        }
        self.dims_pending = self.num_children;
        self.dims = DimensionRanges::default();
        self.noise_pending = self.num_children;
        self.noise = Vec::new();
        self.hulls_pending = self.num_children;
        self.hulls = Vec::with_capacity(self.num_children);
        self.info_pending = self.num_children;
        self.info.reset();
        self.stats_pending = self.num_children;
        self.statistics.reset();
        self.wait_started = None;
        self.needs_reset = false;
        self.state = FilterState::Accumulating;
    }

    fn reduce(&mut self, packet: Packet) -> Vec<Packet> {
        let from = packet.from;
        let tag = packet.tag();
        match packet.message {
            Message::XchangeDimensions(ranges) => {
                if let Err(e) = self.dims.combine(&ranges) {
                    error!("{} Dropping dimensions of node {from}: {e}", self.label);
                }
                if countdown(&mut self.dims_pending, &self.label, tag) {
                    return vec![self.up(Message::XchangeDimensions(self.dims.clone()))];
                }
                Vec::new()
            }
            Message::Noise(batch) => {
                match NoiseManager::unpack(&batch, &mut self.noise) {
                    Ok(count) => self.statistics.current_mut().input_points += count as u64,
                    Err(e) => error!("{} Dropping noise of node {from}: {e}", self.label),
                }
                Vec::new()
            }
            Message::AllNoiseSent => {
                if countdown(&mut self.noise_pending, &self.label, tag) {
                    return self.cluster_noise();
                }
                Vec::new()
            }
            Message::AllHulls(batch) => {
                self.wait_started.get_or_insert_with(Instant::now);
                match HullManager::deserialize_all(&batch) {
                    Ok(hulls) => {
                        debug!("{} {} hulls from node {from}", self.label, hulls.len());
                        self.statistics.current_mut().input_hulls += hulls.len() as u64;
                        self.hulls.extend(hulls);
                    }
                    Err(e) => error!("{} Dropping hulls of node {from}: {e}", self.label),
                }
                Vec::new()
            }
            Message::AllHullsSent => {
                self.wait_started.get_or_insert_with(Instant::now);
                if countdown(&mut self.hulls_pending, &self.label, tag) {
                    return self.merge_and_forward();
                }
                Vec::new()
            }
            Message::ClustersInfo(info) => {
                self.info.combine(&info);
                if countdown(&mut self.info_pending, &self.label, tag) {
                    return vec![self.up(Message::ClustersInfo(self.info.clone()))];
                }
                Vec::new()
            }
            Message::Statistics(report) => {
                self.statistics.unpack(report);
                if countdown(&mut self.stats_pending, &self.label, tag) {
                    let report: StatisticsReport = self.statistics.serialize();
                    self.state = FilterState::Idle;
                    self.needs_reset = true;
                    return vec![self.up(Message::Statistics(report))];
                }
                Vec::new()
            }
            Message::Config(_) => {
                warn!("{} Unexpected {tag} travelling up from node {from}, dropped", self.label);
                Vec::new()
            }
        }
    }

    fn cluster_noise(&mut self) -> Vec<Packet> {
        let mut noise = std::mem::take(&mut self.noise);
        let total = noise.len();
        let remaining = if self.config.params.process_noise() && !noise.is_empty() {
            let timer = Instant::now();
            let manager =
                NoiseManager::new(self.config.params.epsilon(), self.effective_min_points());
            let outcome = manager.cluster_noise(&mut noise);
            self.statistics.current_mut().clustering_time += timer.elapsed();
            match outcome {
                Ok(outcome) => {
                    debug!(
                        "{} {} hulls out of {total} noise points",
                        self.label,
                        outcome.hulls.len()
                    );
                    self.hulls.extend(outcome.hulls);
                    outcome.remaining
                }
                Err(e) => {
                    error!("{} Noise clustering failed, forwarding it as is: {e}", self.label);
                    noise
                }
            }
        } else {
            noise
        };
        self.statistics.current_mut().output_points = remaining.len() as u64;
        vec![
            self.up(Message::Noise(NoiseManager::serialize(&remaining))),
            self.up(Message::AllNoiseSent),
        ]
    }

    fn merge_and_forward(&mut self) -> Vec<Packet> {
        if let Some(started) = self.wait_started.take() {
            self.statistics.current_mut().merge_wait_time += started.elapsed();
        }
        let epsilon = self.config.params.epsilon();
        let min_points = self.effective_min_points();
        let hulls = std::mem::take(&mut self.hulls);
        let input = hulls.len();

        let timer = Instant::now();
        let outcome = merge_pass(hulls, epsilon, min_points);
        let stats = self.statistics.current_mut();
        stats.intersecting_time += timer.elapsed();
        stats.increase_intersects(outcome.attempts, outcome.merges);
        stats.output_hulls = outcome.hulls.len() as u64;

        info!(
            "{} Merged {input} hulls into {} ({} of {} intersections, min points {min_points})",
            self.label,
            outcome.hulls.len(),
            outcome.merges,
            outcome.attempts
        );
        self.state = FilterState::Forwarded;
        vec![
            self.up(Message::AllHulls(HullManager::serialize_all(&outcome.hulls))),
            self.up(Message::AllHullsSent),
        ]
    }

    fn up(&self, message: Message) -> Packet {
        Packet::up(self.node, message)
    }
}

/// Drives a tree-internal node for one clustering run: every packet received goes through the
/// filter and whatever it emits is routed on. Returns once the merged statistics went upward.
pub fn run_filter<T: Transport>(transport: &mut T) -> Result<(), TreeDbscanError> {
    let node = transport.node();
    let mut filter = ReductionFilter::new(
        node,
        NodeRole::Filter,
        transport.num_children(),
        transport.num_siblings(),
    );
    loop {
        let packet = transport.recv()?;
        let mut finished = false;
        for out in filter.process(packet) {
            finished |= out.direction == Direction::Up && out.tag() == Tag::Statistics;
            match out.direction {
                Direction::Up => transport.send_up(out.message)?,
                Direction::Down => transport.send_down(out.message)?,
            }
        }
        if finished {
            debug!("{} Run complete", filter.label);
            return Ok(());
        }
    }
}

/// Counts one child off. Returns true for the last child; extra sentinels are reported and
/// ignored.
fn countdown(pending: &mut usize, label: &str, tag: Tag) -> bool {
    match *pending {
        0 => {
            warn!("{label} More {tag} messages than children, dropped");
            false
        }
        1 => {
            *pending = 0;
            true
        }
        _ => {
            *pending -= 1;
            false
        }
    }
}
