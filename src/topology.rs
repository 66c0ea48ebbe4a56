use crate::TreeDbscanError;
use std::fmt::{Display, Formatter};

/// Rank of a process in the reduction tree. The root is always rank 0.
pub type NodeId = usize;

pub const ROOT: NodeId = 0;

/// Role a tree position plays in the clustering protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Front-end: finalizes and broadcasts the global model.
    Root,
    /// Tree-internal process aggregating its children's outputs.
    Filter,
    /// Back-end owning raw points.
    Leaf,
}

impl Display for NodeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeRole::Root => "FE",
            NodeRole::Filter => "FILTER",
            NodeRole::Leaf => "BE",
        };
        write!(f, "{name}")
    }
}

/// Shape of the reduction tree: every node knows its parent and children.
///
/// Ranks are assigned breadth first, so the root is 0 and the leaves hold the highest ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeTopology {
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
}

impl TreeTopology {
    /// Builds the shallowest tree with `num_leaves` leaves in which no node has more than
    /// `fanout` children.
    ///
    /// # Parameters
    /// * num_leaves - number of back-ends, at least 1
    /// * fanout - maximum number of children per node, at least 2
    ///
    /// # Returns
    /// * the topology, or an error if the parameters cannot describe a tree
    pub fn balanced(num_leaves: usize, fanout: usize) -> Result<Self, TreeDbscanError> {
        if num_leaves == 0 {
            return Err(TreeDbscanError::Topology(String::from("a tree needs at least one leaf")));
        }
        if fanout < 2 {
            return Err(TreeDbscanError::Topology(format!(
                "fan-out must be at least 2, got {fanout}"
            )));
        }

        // Group level widths from the leaves up until a single node is left
        let mut widths = vec![num_leaves];
        while widths.last().is_some_and(|&w| w > 1) {
            let width = widths[widths.len() - 1];
            widths.push(width.div_ceil(fanout));
        }
        // A single leaf still hangs below a root that only coordinates
        if widths.len() == 1 {
            widths.push(1);
        }
        widths.reverse();

        let mut topology = TreeTopology { parents: vec![None], children: vec![Vec::new()] };
        let mut level: Vec<NodeId> = vec![ROOT];
        for &width in &widths[1..] {
            let mut next_level = Vec::with_capacity(width);
            for n in 0..width {
                // Contiguous blocks, every node of the level above gets at least one child
                let parent = level[n * level.len() / width];
                let id = topology.parents.len();
                topology.parents.push(Some(parent));
                topology.children.push(Vec::new());
                topology.children[parent].push(id);
                next_level.push(id);
            }
            level = next_level;
        }
        Ok(topology)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.len()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(node).copied().flatten()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Other children of this node's parent. The root has none.
    pub fn siblings(&self, node: NodeId) -> Vec<NodeId> {
        match self.parent(node) {
            Some(parent) => self.children(parent).iter().copied().filter(|&n| n != node).collect(),
            None => Vec::new(),
        }
    }

    pub fn role(&self, node: NodeId) -> NodeRole {
        if node == ROOT {
            NodeRole::Root
        } else if self.children(node).is_empty() {
            NodeRole::Leaf
        } else {
            NodeRole::Filter
        }
    }

    /// Leaf ranks in ascending order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes().filter(|&n| self.role(n) == NodeRole::Leaf).collect()
    }

    /// Log prefix naming the node, like `[BE 5]`.
    pub fn label(&self, node: NodeId) -> String {
        node_label(self.role(node), node)
    }
}

pub(crate) fn node_label(role: NodeRole, node: NodeId) -> String {
    match role {
        NodeRole::Root => format!("[{role}]"),
        _ => format!("[{role} {node}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tree() {
        let topology = TreeTopology::balanced(3, 4).unwrap();
        assert_eq!(4, topology.len());
        assert_eq!(&[1, 2, 3], topology.children(ROOT));
        assert_eq!(vec![1, 2, 3], topology.leaves());
        assert_eq!(vec![1, 3], topology.siblings(2));
        assert_eq!(NodeRole::Root, topology.role(ROOT));
    }

    #[test]
    fn two_level_tree() {
        let topology = TreeTopology::balanced(4, 2).unwrap();
        // root -> 2 filters -> 4 leaves
        assert_eq!(7, topology.len());
        assert_eq!(&[1, 2], topology.children(ROOT));
        assert_eq!(NodeRole::Filter, topology.role(1));
        assert_eq!(&[3, 4], topology.children(1));
        assert_eq!(&[5, 6], topology.children(2));
        assert_eq!(Some(2), topology.parent(6));
        assert_eq!(vec![3, 4, 5, 6], topology.leaves());
    }

    #[test]
    fn uneven_tree_keeps_every_leaf() {
        let topology = TreeTopology::balanced(5, 2).unwrap();
        assert_eq!(5, topology.leaves().len());
        for node in topology.nodes() {
            assert!(topology.children(node).len() <= 2);
        }
    }

    #[test]
    fn single_leaf_hangs_below_root() {
        let topology = TreeTopology::balanced(1, 2).unwrap();
        assert_eq!(&[1], topology.children(ROOT));
        assert_eq!(NodeRole::Leaf, topology.role(1));
        assert!(topology.siblings(1).is_empty());
    }

    #[test]
    fn rejects_degenerate_shapes() {
        assert!(TreeTopology::balanced(0, 2).is_err());
        assert!(TreeTopology::balanced(4, 1).is_err());
    }

    #[test]
    fn labels() {
        let topology = TreeTopology::balanced(4, 2).unwrap();
        assert_eq!("[FE]", topology.label(0));
        assert_eq!("[FILTER 1]", topology.label(1));
        assert_eq!("[BE 3]", topology.label(3));
    }
}
