use std::collections::BTreeSet;

/// Cluster identifier. Real clusters are numbered from 1.
pub type ClusterId = u32;

/// Id reserved for points that belong to no cluster.
pub const NOISE_CLUSTER_ID: ClusterId = 0;

/// Result of one clustering or classification run: the cluster id of every input point, in
/// input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    assignment: Vec<ClusterId>,
    ids: BTreeSet<ClusterId>,
}

impl Partition {
    pub fn new() -> Self {
        Partition::default()
    }

    pub fn from_assignment(assignment: Vec<ClusterId>) -> Self {
        let ids = assignment.iter().copied().collect();
        Partition { assignment, ids }
    }

    pub fn assignment(&self) -> &[ClusterId] {
        &self.assignment
    }

    pub fn into_assignment(self) -> Vec<ClusterId> {
        self.assignment
    }

    /// Distinct ids present in the assignment, noise included.
    pub fn ids(&self) -> &BTreeSet<ClusterId> {
        &self.ids
    }

    pub fn push(&mut self, id: ClusterId) {
        self.assignment.push(id);
        self.ids.insert(id);
    }

    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Number of distinct non-noise clusters.
    pub fn number_of_clusters(&self) -> usize {
        self.ids.iter().filter(|&&id| id != NOISE_CLUSTER_ID).count()
    }

    pub fn has_noise(&self) -> bool {
        self.ids.contains(&NOISE_CLUSTER_ID)
    }

    pub fn max_id(&self) -> ClusterId {
        self.ids.iter().next_back().copied().unwrap_or(NOISE_CLUSTER_ID)
    }

    /// Indices of the points assigned to `id`, in input order.
    pub fn members(&self, id: ClusterId) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|(_, &assigned)| assigned == id)
            .map(|(n, _)| n)
            .collect()
    }

    /// Point indices grouped by cluster id. Slot 0 holds the noise points, so the vector has
    /// `max_id() + 1` slots, some possibly empty.
    pub fn points_per_cluster(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.max_id() as usize + 1];
        for (n, id) in self.assignment.iter().enumerate() {
            groups[*id as usize].push(n);
        }
        groups
    }
}
