use crate::clusters_info::ClustersInfo;
use crate::hull_manager::WireHullBatch;
use crate::hyper_parameters::RunConfig;
use crate::noise::NoiseBatch;
use crate::point::DimensionRanges;
use crate::statistics::StatisticsReport;
use crate::topology::NodeId;
use std::fmt::{Display, Formatter};

/// Logical channels of the protocol. Delivery is FIFO within a stream between two nodes, and
/// unordered across streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Run configuration broadcast.
    Control,
    /// Dimension ranges reduction and broadcast.
    Dimensions,
    /// Hull batches and, when enabled, residual noise.
    Hulls,
    /// Cluster information and node statistics.
    Statistics,
}

/// Message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Config,
    XchangeDimensions,
    AllHulls,
    AllHullsSent,
    Noise,
    AllNoiseSent,
    Statistics,
    ClustersInfo,
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tag::Config => "CONFIG",
            Tag::XchangeDimensions => "XCHANGE_DIMENSIONS",
            Tag::AllHulls => "ALL_HULLS",
            Tag::AllHullsSent => "ALL_HULLS_SENT",
            Tag::Noise => "NOISE",
            Tag::AllNoiseSent => "ALL_NOISE_SENT",
            Tag::Statistics => "STATISTICS",
            Tag::ClustersInfo => "CLUSTERS_INFO",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Config(RunConfig),
    XchangeDimensions(DimensionRanges),
    AllHulls(WireHullBatch),
    AllHullsSent,
    Noise(NoiseBatch),
    AllNoiseSent,
    Statistics(StatisticsReport),
    ClustersInfo(ClustersInfo),
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::Config(_) => Tag::Config,
            Message::XchangeDimensions(_) => Tag::XchangeDimensions,
            Message::AllHulls(_) => Tag::AllHulls,
            Message::AllHullsSent => Tag::AllHullsSent,
            Message::Noise(_) => Tag::Noise,
            Message::AllNoiseSent => Tag::AllNoiseSent,
            Message::Statistics(_) => Tag::Statistics,
            Message::ClustersInfo(_) => Tag::ClustersInfo,
        }
    }

    /// Stream the message travels on.
    pub fn stream(&self) -> Stream {
        match self.tag() {
            Tag::Config => Stream::Control,
            Tag::XchangeDimensions => Stream::Dimensions,
            Tag::AllHulls | Tag::AllHullsSent | Tag::Noise | Tag::AllNoiseSent => Stream::Hulls,
            Tag::Statistics | Tag::ClustersInfo => Stream::Statistics,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the root.
    Up,
    /// Towards the leaves.
    Down,
}

/// A message in flight together with its routing information.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub from: NodeId,
    pub direction: Direction,
    pub stream: Stream,
    pub message: Message,
}

impl Packet {
    pub fn up(from: NodeId, message: Message) -> Self {
        Packet { from, direction: Direction::Up, stream: message.stream(), message }
    }

    pub fn down(from: NodeId, message: Message) -> Self {
        Packet { from, direction: Direction::Down, stream: message.stream(), message }
    }

    pub fn tag(&self) -> Tag {
        self.message.tag()
    }
}
