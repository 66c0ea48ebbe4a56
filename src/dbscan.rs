use crate::distance::{squared_euclidean, squared_radius};
use crate::partition::{ClusterId, Partition, NOISE_CLUSTER_ID};
use crate::point::{validate_points, Point};
use crate::TreeDbscanError;
use std::collections::VecDeque;

/// Local density based clustering primitive every tree node runs over its own points.
#[derive(Debug, Clone, PartialEq)]
pub struct Dbscan {
    epsilon: f64,
    min_points: usize,
}

impl Dbscan {
    /// # Parameters
    /// * `epsilon` - radius of the neighbourhood queries
    /// * `min_points` - neighbourhood size, the point itself included, that makes a core point
    pub fn new(epsilon: f64, min_points: usize) -> Self {
        Dbscan { epsilon, min_points }
    }

    /// Clusters the points and annotates each of them with the size of its epsilon
    /// neighbourhood.
    ///
    /// # Parameters
    /// * `points` - the points to cluster. All of them must have the same dimensionality and
    ///              finite coordinates.
    ///
    /// # Returns
    /// * The partition, with clusters numbered from 1 in discovery order and noise as 0. An
    ///   empty input gives an empty partition.
    pub fn cluster(&self, points: &mut [Point]) -> Result<Partition, TreeDbscanError> {
        if points.is_empty() {
            return Ok(Partition::new());
        }
        validate_points(points)?;

        let (labels, sizes) = self.expand_clusters(points)?;
        for (point, size) in points.iter_mut().zip(sizes) {
            point.annotate_neighbourhood(size);
        }
        let assignment = labels.into_iter().map(|l| l.unwrap_or(NOISE_CLUSTER_ID)).collect();
        Ok(Partition::from_assignment(assignment))
    }

    fn expand_clusters(
        &self,
        points: &[Point],
    ) -> Result<(Vec<Option<ClusterId>>, Vec<usize>), TreeDbscanError> {
        let n_samples = points.len();
        let mut tree: kdtree::KdTree<f64, usize, &[f64]> = kdtree::KdTree::new(points[0].dims());
        for (n, point) in points.iter().enumerate() {
            tree.add(point.coords(), n).map_err(kdtree_error)?;
        }
        let radius = squared_radius(self.epsilon);
        let region = |n: usize| -> Result<Vec<usize>, TreeDbscanError> {
            let neighbours = tree
                .within(points[n].coords(), radius, &squared_euclidean)
                .map_err(kdtree_error)?;
            Ok(neighbours.into_iter().map(|(_, &idx)| idx).collect())
        };

        let mut labels: Vec<Option<ClusterId>> = vec![None; n_samples];
        let mut visited = vec![false; n_samples];
        let mut sizes = vec![0; n_samples];
        let mut next_id: ClusterId = 1;

        for n in 0..n_samples {
            if visited[n] {
                continue;
            }
            visited[n] = true;
            let neighbours = region(n)?;
            sizes[n] = neighbours.len();
            if neighbours.len() < self.min_points {
                continue;
            }

            let id = next_id;
            next_id += 1;
            labels[n] = Some(id);
            let mut queue: VecDeque<usize> = neighbours.into_iter().collect();
            while let Some(m) = queue.pop_front() {
                if labels[m].is_none() {
                    labels[m] = Some(id);
                }
                if visited[m] {
                    continue;
                }
                visited[m] = true;
                let reachable = region(m)?;
                sizes[m] = reachable.len();
                if reachable.len() >= self.min_points {
                    queue.extend(reachable);
                }
            }
        }
        Ok((labels, sizes))
    }
}

fn kdtree_error(err: kdtree::ErrorKind) -> TreeDbscanError {
    match err {
        kdtree::ErrorKind::WrongDimension => {
            TreeDbscanError::WrongDimension(String::from("point rejected by the k-d tree"))
        }
        kdtree::ErrorKind::NonFiniteCoordinate => {
            TreeDbscanError::NonFiniteCoordinate(String::from("point rejected by the k-d tree"))
        }
        kdtree::ErrorKind::ZeroCapacity => {
            TreeDbscanError::Configuration(String::from("k-d tree created without capacity"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(cx: f64, cy: f64, n: usize, spacing: f64) -> Vec<Point> {
        (0..n)
            .map(|i| Point::xy(cx + spacing * (i % 3) as f64, cy + spacing * (i / 3) as f64))
            .collect()
    }

    #[test]
    fn two_blobs_and_an_outlier() {
        let mut points = blob(0.0, 0.0, 9, 0.1);
        points.extend(blob(5.0, 5.0, 9, 0.1));
        points.push(Point::xy(10.0, 10.0));

        let partition = Dbscan::new(0.15, 3).cluster(&mut points).unwrap();
        assert_eq!(2, partition.number_of_clusters());
        assert!(partition.has_noise());
        assert!(partition.assignment()[..9].iter().all(|&id| id == 1));
        assert!(partition.assignment()[9..18].iter().all(|&id| id == 2));
        assert_eq!(NOISE_CLUSTER_ID, partition.assignment()[18]);
    }

    #[test]
    fn neighbourhood_sizes_include_the_point_itself() {
        let mut points = blob(0.0, 0.0, 9, 0.1);
        points.push(Point::xy(10.0, 10.0));
        Dbscan::new(0.11, 3).cluster(&mut points).unwrap();
        // centre of the 3x3 grid sees its 4 axis neighbours
        assert_eq!(5, points[4].neighbourhood_size());
        assert_eq!(3, points[0].neighbourhood_size());
        assert_eq!(1, points[9].neighbourhood_size());
    }

    #[test]
    fn border_points_join_the_cluster() {
        let mut points = blob(0.0, 0.0, 9, 0.1);
        // within reach of a core point but too sparse to be core itself
        points.push(Point::xy(0.3, 0.2));
        let partition = Dbscan::new(0.11, 4).cluster(&mut points).unwrap();
        assert_eq!(1, partition.assignment()[9]);
        assert_eq!(2, points[9].neighbourhood_size());
    }

    #[test]
    fn empty_input_gives_empty_partition() {
        let partition = Dbscan::new(0.1, 3).cluster(&mut []).unwrap();
        assert!(partition.is_empty());
    }

    #[test]
    fn everything_noise_when_too_sparse() {
        let mut points = blob(0.0, 0.0, 6, 1.0);
        let partition = Dbscan::new(0.5, 2).cluster(&mut points).unwrap();
        assert_eq!(0, partition.number_of_clusters());
        assert_eq!(vec![0; 6], partition.into_assignment());
    }

    #[test]
    fn rejects_invalid_points() {
        let mut points = vec![Point::xy(0.0, 0.0), Point::xy(f64::INFINITY, 0.0)];
        assert!(matches!(
            Dbscan::new(0.1, 2).cluster(&mut points),
            Err(TreeDbscanError::NonFiniteCoordinate(..))
        ));
    }
}
