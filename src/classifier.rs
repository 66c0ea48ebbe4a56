use crate::hull::ConvexHullModel;
use crate::partition::{ClusterId, Partition, NOISE_CLUSTER_ID};
use crate::point::Point;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Classifies points against the global model: an ordered list of hulls where hull `i` stands
/// for cluster `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHullClassifier<'a> {
    model: &'a [ConvexHullModel],
    epsilon: f64,
}

impl<'a> ConvexHullClassifier<'a> {
    pub fn new(model: &'a [ConvexHullModel], epsilon: f64) -> Self {
        ConvexHullClassifier { model, epsilon }
    }

    /// Cluster id of a single point.
    ///
    /// The first hull containing the point wins. Failing that, the first hull within epsilon of
    /// the point wins. Otherwise the point is noise.
    pub fn classify_point(&self, point: &Point) -> ClusterId {
        let position = self
            .model
            .iter()
            .position(|hull| hull.is_inside(point))
            .or_else(|| self.model.iter().position(|hull| hull.is_near(point, self.epsilon)));
        match position {
            Some(idx) => idx as ClusterId + 1,
            None => NOISE_CLUSTER_ID,
        }
    }

    /// Classifies every point, in input order.
    pub fn classify(&self, points: &[Point]) -> Partition {
        Partition::from_assignment(points.iter().map(|p| self.classify_point(p)).collect())
    }

    /// Same as `classify`, spreading the points over the rayon thread pool.
    #[cfg(feature = "parallel")]
    pub fn classify_par(&self, points: &[Point]) -> Partition {
        Partition::from_assignment(points.par_iter().map(|p| self.classify_point(p)).collect())
    }
}
