use crate::topology::NodeId;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Protocol stage a tree node was executing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    DimensionsExchange,
    LocalClustering,
    HullReduction,
    Statistics,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::DimensionsExchange => "dimensions exchange",
            Stage::LocalClustering => "local clustering",
            Stage::HullReduction => "hull reduction",
            Stage::Statistics => "statistics",
        };
        write!(f, "{name}")
    }
}

/// Errors raised by the clustering components and the tree protocol drivers.
#[derive(Debug, Error)]
pub enum TreeDbscanError {
    #[error("The dataset provided is empty")]
    EmptyDataset,
    #[error("Input vectors have mismatched dimensions: {0}")]
    WrongDimension(String),
    #[error("Non finite coordinate: {0}")]
    NonFiniteCoordinate(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Malformed hull batch: {0}")]
    MalformedBatch(String),
    #[error("Invalid tree topology: {0}")]
    Topology(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Protocol violation: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Node {node} failed during {stage}: {source}")]
    Node {
        node: NodeId,
        stage: Stage,
        #[source]
        source: Box<TreeDbscanError>,
    },
}

impl TreeDbscanError {
    /// Tags an error with the tree rank and protocol stage it surfaced in.
    pub fn at(self, node: NodeId, stage: Stage) -> Self {
        match self {
            // Already attributed further down the call chain
            TreeDbscanError::Node { .. } => self,
            other => TreeDbscanError::Node { node, stage, source: Box::new(other) },
        }
    }
}
