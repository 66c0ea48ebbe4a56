use crate::topology::{NodeId, NodeRole};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

/// Counters and phase timings of one tree node for one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatistics {
    pub role: NodeRole,
    pub input_points: u64,
    pub output_points: u64,
    pub input_hulls: u64,
    pub output_hulls: u64,
    pub valid_intersects: u64,
    pub total_intersects: u64,
    pub clustering_time: Duration,
    pub intersecting_time: Duration,
    /// Time spent waiting for the children before the merge pass could start.
    pub merge_wait_time: Duration,
    pub classification_time: Duration,
    pub total_time: Duration,
}

impl NodeStatistics {
    pub fn new(role: NodeRole) -> Self {
        NodeStatistics {
            role,
            input_points: 0,
            output_points: 0,
            input_hulls: 0,
            output_hulls: 0,
            valid_intersects: 0,
            total_intersects: 0,
            clustering_time: Duration::ZERO,
            intersecting_time: Duration::ZERO,
            merge_wait_time: Duration::ZERO,
            classification_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }

    pub fn increase_intersects(&mut self, attempts: u64, valid: u64) {
        self.total_intersects += attempts;
        self.valid_intersects += valid;
    }

    /// What the node consumed, `\n` separated.
    pub fn in_stats(&self) -> String {
        let mut stats = String::new();
        match self.role {
            NodeRole::Leaf => {
                let _ = write!(
                    stats,
                    "Clustering points={}\\nClustering time={:?}",
                    self.input_points, self.clustering_time
                );
            }
            NodeRole::Filter | NodeRole::Root => {
                let _ = write!(
                    stats,
                    "Sum hulls={}\\nNoise points={}\\nNoise time={:?}\\nIntersections={}/{} ({}%)",
                    self.input_hulls,
                    self.input_points,
                    self.clustering_time,
                    self.valid_intersects,
                    self.total_intersects,
                    (self.valid_intersects * 100).checked_div(self.total_intersects).unwrap_or(0)
                );
                if self.valid_intersects > 0 {
                    let average = self.intersecting_time / self.total_intersects.max(1) as u32;
                    let _ = write!(
                        stats,
                        "\\nIntersection time={:?} (Avg={:?})",
                        self.intersecting_time, average
                    );
                }
            }
        }
        stats
    }

    /// What the node produced, `\n` separated.
    pub fn out_stats(&self) -> String {
        format!("Hulls={}\\nNoise={}", self.output_hulls, self.output_points)
    }
}

/// Statistics records of a subtree, keyed by node. Payload of the STATISTICS message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatisticsReport {
    pub nodes: BTreeMap<NodeId, NodeStatistics>,
}

impl StatisticsReport {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds every record of `other`. A node reporting twice keeps its latest record.
    pub fn absorb(&mut self, other: StatisticsReport) {
        self.nodes.extend(other.nodes);
    }

    pub fn get(&self, node: NodeId) -> Option<&NodeStatistics> {
        self.nodes.get(&node)
    }

    /// One `id,in-stats,out-stats` line per node, in node order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (id, stats) in &self.nodes {
            let _ = writeln!(out, "{id},{},{}", stats.in_stats(), stats.out_stats());
        }
        out
    }
}

/// Statistics collector of one node: its own counters plus the records received from the
/// children for the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    node: NodeId,
    current: NodeStatistics,
    received: StatisticsReport,
}

impl Statistics {
    pub fn new(node: NodeId, role: NodeRole) -> Self {
        Statistics {
            node,
            current: NodeStatistics::new(role),
            received: StatisticsReport::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn current(&self) -> &NodeStatistics {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut NodeStatistics {
        &mut self.current
    }

    /// Keeps the records a child sent.
    pub fn unpack(&mut self, report: StatisticsReport) {
        self.received.absorb(report);
    }

    /// This node's record together with everything received, ready to go upward.
    pub fn serialize(&self) -> StatisticsReport {
        let mut report = self.received.clone();
        report.nodes.insert(self.node, self.current.clone());
        report
    }

    pub fn reset(&mut self) {
        self.current = NodeStatistics::new(self.current.role);
        self.received = StatisticsReport::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_includes_own_record_and_children() {
        let mut leaf = Statistics::new(3, NodeRole::Leaf);
        leaf.current_mut().input_points = 120;
        leaf.current_mut().output_hulls = 2;

        let mut filter = Statistics::new(1, NodeRole::Filter);
        filter.current_mut().input_hulls = 2;
        filter.current_mut().increase_intersects(4, 1);
        filter.unpack(leaf.serialize());

        let report = filter.serialize();
        assert_eq!(2, report.len());
        assert_eq!(120, report.get(3).unwrap().input_points);
        assert_eq!(4, report.get(1).unwrap().total_intersects);
    }

    #[test]
    fn render_one_line_per_node() {
        let mut leaf = Statistics::new(2, NodeRole::Leaf);
        leaf.current_mut().input_points = 10;
        leaf.current_mut().output_hulls = 1;
        leaf.current_mut().output_points = 3;
        let mut root = Statistics::new(0, NodeRole::Root);
        root.unpack(leaf.serialize());

        let rendered = root.serialize().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(2, lines.len());
        assert!(lines[0].starts_with("0,Sum hulls=0"));
        assert!(lines[0].contains("Intersections=0/0 (0%)"));
        assert!(lines[1].starts_with("2,Clustering points=10"));
        assert!(lines[1].ends_with(",Hulls=1\\nNoise=3"));
    }

    #[test]
    fn reset_clears_counters_and_records() {
        let mut stats = Statistics::new(1, NodeRole::Filter);
        stats.current_mut().input_hulls = 5;
        stats.unpack(Statistics::new(3, NodeRole::Leaf).serialize());
        stats.reset();
        assert_eq!(0, stats.current().input_hulls);
        assert_eq!(1, stats.serialize().len());
    }
}
