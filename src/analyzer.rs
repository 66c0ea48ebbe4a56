use crate::dbscan::Dbscan;
use crate::hull::ConvexHullModel;
use crate::partition::{Partition, NOISE_CLUSTER_ID};
use crate::point::Point;
use crate::TreeDbscanError;

/// Result of a local analysis: the partition of the analysed points and one hull per cluster,
/// in cluster id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalModel {
    pub partition: Partition,
    pub hulls: Vec<ConvexHullModel>,
}

impl LocalModel {
    /// The points the partition left as noise, in input order.
    pub fn noise_points(&self, points: &[Point]) -> Vec<Point> {
        self.partition
            .members(NOISE_CLUSTER_ID)
            .into_iter()
            .filter_map(|n| points.get(n).cloned())
            .collect()
    }
}

/// Turns a point set into the hull models exchanged through the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAnalyzer {
    dbscan: Dbscan,
}

impl LocalAnalyzer {
    pub fn new(epsilon: f64, min_points: usize) -> Self {
        LocalAnalyzer { dbscan: Dbscan::new(epsilon, min_points) }
    }

    /// Runs DBSCAN over the points, annotating their neighbourhood sizes, then builds the hull of
    /// every cluster found.
    pub fn analyze(&self, points: &mut [Point]) -> Result<LocalModel, TreeDbscanError> {
        let partition = self.dbscan.cluster(points)?;
        let hulls = build_hulls(points, &partition);
        Ok(LocalModel { partition, hulls })
    }
}

/// One hull per non-noise cluster of the partition, in ascending id order.
pub fn build_hulls(points: &[Point], partition: &Partition) -> Vec<ConvexHullModel> {
    partition
        .points_per_cluster()
        .iter()
        .skip(1)
        .filter(|members| !members.is_empty())
        .map(|members| {
            let cluster: Vec<&Point> = members.iter().map(|&n| &points[n]).collect();
            ConvexHullModel::build(&cluster)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(x0: f64, y0: f64, side: usize, spacing: f64, duration: u64) -> Vec<Point> {
        let mut points = Vec::new();
        for i in 0..side {
            for j in 0..side {
                points.push(
                    Point::xy(x0 + i as f64 * spacing, y0 + j as f64 * spacing)
                        .with_duration(duration),
                );
            }
        }
        points
    }

    #[test]
    fn one_hull_per_cluster() {
        let mut points = grid(0.0, 0.0, 4, 0.1, 1);
        points.extend(grid(3.0, 3.0, 5, 0.1, 2));
        points.push(Point::xy(9.0, 9.0).with_duration(100));

        let model = LocalAnalyzer::new(0.15, 4).analyze(&mut points).unwrap();
        assert_eq!(2, model.hulls.len());
        assert_eq!(16, model.hulls[0].density());
        assert_eq!(16, model.hulls[0].total_time());
        assert_eq!(25, model.hulls[1].density());
        assert_eq!(50, model.hulls[1].total_time());

        let noise = model.noise_points(&points);
        assert_eq!(1, noise.len());
        assert_eq!(100, noise[0].duration());
    }

    #[test]
    fn hull_vertices_carry_neighbourhood_sizes() {
        let mut points = grid(0.0, 0.0, 3, 0.1, 1);
        let model = LocalAnalyzer::new(0.11, 3).analyze(&mut points).unwrap();
        assert_eq!(1, model.hulls.len());
        // every vertex is a corner of the grid, which sees two axis neighbours
        assert!(model.hulls[0].vertices().iter().all(|v| v.neighbourhood_size == 3));
    }

    #[test]
    fn no_points_no_hulls() {
        let model = LocalAnalyzer::new(0.1, 3).analyze(&mut []).unwrap();
        assert!(model.hulls.is_empty());
        assert!(model.partition.is_empty());
    }
}
