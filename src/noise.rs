use crate::analyzer::LocalAnalyzer;
use crate::hull::ConvexHullModel;
use crate::point::Point;
use crate::TreeDbscanError;

/// Flattened noise points travelling up the tree. Payload of the NOISE message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoiseBatch {
    pub dims: usize,
    pub coords: Vec<f64>,
    pub durations: Vec<u64>,
}

impl NoiseBatch {
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

/// What clustering the accumulated noise of a subtree produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoiseOutcome {
    /// Hulls of the clusters that only show up once the noise of several children is put together.
    pub hulls: Vec<ConvexHullModel>,
    /// Points that are still noise, to be forwarded upward.
    pub remaining: Vec<Point>,
}

/// Secondary channel that accumulates and re-clusters residual noise across the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseManager {
    analyzer: LocalAnalyzer,
}

impl NoiseManager {
    pub fn new(epsilon: f64, min_points: usize) -> Self {
        NoiseManager { analyzer: LocalAnalyzer::new(epsilon, min_points) }
    }

    pub fn serialize(points: &[Point]) -> NoiseBatch {
        let dims = points.first().map(Point::dims).unwrap_or(0);
        NoiseBatch {
            dims,
            coords: points.iter().flat_map(|p| p.coords().iter().copied()).collect(),
            durations: points.iter().map(Point::duration).collect(),
        }
    }

    /// Appends the points of a batch to `into`.
    ///
    /// # Returns
    /// * the number of points unpacked
    pub fn unpack(batch: &NoiseBatch, into: &mut Vec<Point>) -> Result<usize, TreeDbscanError> {
        if batch.is_empty() {
            return Ok(0);
        }
        if batch.dims == 0 || batch.coords.len() != batch.dims * batch.len() {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "{} noise coordinates cannot hold {} points of {} dimensions",
                batch.coords.len(),
                batch.len(),
                batch.dims
            )));
        }
        into.extend(
            batch
                .coords
                .chunks_exact(batch.dims)
                .zip(batch.durations.iter())
                .map(|(coords, &duration)| Point::new(coords.to_vec()).with_duration(duration)),
        );
        Ok(batch.len())
    }

    /// Clusters the accumulated noise points, annotating their neighbourhood sizes. The points
    /// are left in place when clustering fails.
    pub fn cluster_noise(&self, points: &mut [Point]) -> Result<NoiseOutcome, TreeDbscanError> {
        let model = self.analyzer.analyze(points)?;
        let remaining = model.noise_points(points);
        Ok(NoiseOutcome { hulls: model.hulls, remaining })
    }
}
