use crate::partition::{ClusterId, Partition, NOISE_CLUSTER_ID};
use crate::point::Point;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

const CSV_DELIMITER: char = ',';

/// Aggregate of the points a leaf classified into one cluster.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterStatistics {
    pub id: ClusterId,
    pub individuals: u64,
    pub total_duration: u64,
}

impl ClusterStatistics {
    pub fn new(id: ClusterId) -> Self {
        ClusterStatistics { id, individuals: 0, total_duration: 0 }
    }

    pub fn add(&mut self, point: &Point) {
        self.individuals += 1;
        self.total_duration += point.duration();
    }

    pub fn aggregate(&mut self, other: &ClusterStatistics) {
        self.individuals += other.individuals;
        self.total_duration += other.total_duration;
    }

    pub fn duration_mean(&self) -> f64 {
        if self.individuals == 0 {
            0.0
        } else {
            self.total_duration as f64 / self.individuals as f64
        }
    }
}

/// Per cluster statistics combined by cluster id. Payload of the CLUSTERS_INFO message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClustersInfo {
    clusters: BTreeMap<ClusterId, ClusterStatistics>,
}

impl ClustersInfo {
    /// Statistics of a classified point set. Every id of the partition gets an entry.
    pub fn from_partition(points: &[Point], partition: &Partition) -> Self {
        let mut info = ClustersInfo::default();
        for (point, &id) in points.iter().zip(partition.assignment()) {
            info.clusters.entry(id).or_insert_with(|| ClusterStatistics::new(id)).add(point);
        }
        info
    }

    /// Folds another table into this one, adding up the clusters sharing an id.
    pub fn combine(&mut self, other: &ClustersInfo) {
        for (id, stats) in &other.clusters {
            self.clusters
                .entry(*id)
                .and_modify(|mine| mine.aggregate(stats))
                .or_insert_with(|| stats.clone());
        }
    }

    pub fn get(&self, id: ClusterId) -> Option<&ClusterStatistics> {
        self.clusters.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterStatistics> {
        self.clusters.values()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn has_noise(&self) -> bool {
        self.clusters.contains_key(&NOISE_CLUSTER_ID)
    }

    pub fn reset(&mut self) {
        self.clusters.clear();
    }

    fn write_row<F>(&self, f: &mut Formatter<'_>, label: &str, value: F) -> std::fmt::Result
    where
        F: Fn(&ClusterStatistics) -> String,
    {
        write!(f, "{label}")?;
        // The noise column is always present
        if !self.has_noise() {
            write!(f, "{CSV_DELIMITER}0")?;
        }
        for stats in self.clusters.values() {
            write!(f, "{CSV_DELIMITER}{}", value(stats))?;
        }
        writeln!(f)
    }
}

/// CSV table with one column per cluster, noise first.
impl Display for ClustersInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let num_clusters = self.clusters.keys().filter(|&&id| id != NOISE_CLUSTER_ID).count();
        write!(f, "Cluster Name{CSV_DELIMITER}NOISE")?;
        for i in 1..=num_clusters {
            write!(f, "{CSV_DELIMITER}Cluster {i}")?;
        }
        writeln!(f)?;

        let absolute_total: u64 = self.clusters.values().map(|s| s.total_duration).sum();
        self.write_row(f, "Density", |s| s.individuals.to_string())?;
        self.write_row(f, "Total duration", |s| s.total_duration.to_string())?;
        self.write_row(f, "Avg. duration", |s| s.duration_mean().to_string())?;
        self.write_row(f, "% Total duration", |s| {
            if absolute_total == 0 {
                String::from("0")
            } else {
                (s.total_duration as f64 / absolute_total as f64).to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(durations: &[u64]) -> Vec<Point> {
        durations.iter().map(|&d| Point::xy(0.0, 0.0).with_duration(d)).collect()
    }

    #[test]
    fn built_from_classification() {
        let pts = points(&[10, 20, 30, 40]);
        let partition = Partition::from_assignment(vec![1, 0, 1, 2]);
        let info = ClustersInfo::from_partition(&pts, &partition);
        assert_eq!(3, info.len());
        assert_eq!(2, info.get(1).unwrap().individuals);
        assert_eq!(40, info.get(1).unwrap().total_duration);
        assert_eq!(20.0, info.get(1).unwrap().duration_mean());
        assert_eq!(20, info.get(NOISE_CLUSTER_ID).unwrap().total_duration);
    }

    #[test]
    fn combine_adds_up_shared_ids() {
        let partition = |ids: Vec<u32>| Partition::from_assignment(ids);
        let a = ClustersInfo::from_partition(&points(&[10, 10]), &partition(vec![1, 2]));
        let b = ClustersInfo::from_partition(&points(&[5, 5]), &partition(vec![2, 3]));
        let mut combined = ClustersInfo::default();
        combined.combine(&a);
        combined.combine(&b);
        assert_eq!(3, combined.len());
        assert_eq!(2, combined.get(2).unwrap().individuals);
        assert_eq!(15, combined.get(2).unwrap().total_duration);
    }

    #[test]
    fn csv_without_noise_pads_the_noise_column() {
        let info = ClustersInfo::from_partition(
            &points(&[30, 10]),
            &Partition::from_assignment(vec![1, 2]),
        );
        let csv = info.to_string();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!("Cluster Name,NOISE,Cluster 1,Cluster 2", lines[0]);
        assert_eq!("Density,0,1,1", lines[1]);
        assert_eq!("Total duration,0,30,10", lines[2]);
        assert_eq!("Avg. duration,0,30,10", lines[3]);
        assert_eq!("% Total duration,0,0.75,0.25", lines[4]);
    }
}
