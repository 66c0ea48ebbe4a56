use crate::hull::{ConvexHullModel, HullParts};
use crate::point::InstanceId;
use crate::TreeDbscanError;

/// Serialized form of an ordered list of hulls: per hull arrays plus flattened vertex arrays
/// sliced by the per hull counts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireHullBatch {
    pub densities: Vec<i64>,
    pub total_times: Vec<i64>,
    pub point_counts: Vec<usize>,
    pub dim_counts: Vec<usize>,
    pub instances: Vec<InstanceId>,
    pub neighbourhood_sizes: Vec<i64>,
    pub coords: Vec<f64>,
}

impl WireHullBatch {
    pub fn len(&self) -> usize {
        self.densities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.densities.is_empty()
    }

    /// Checks the flattened arrays hold exactly what the per hull counts announce.
    pub fn validate(&self) -> Result<(), TreeDbscanError> {
        let n = self.densities.len();
        if self.total_times.len() != n || self.point_counts.len() != n || self.dim_counts.len() != n
        {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "per hull arrays disagree: {n} densities, {} total times, {} point counts, {} \
                 dimension counts",
                self.total_times.len(),
                self.point_counts.len(),
                self.dim_counts.len()
            )));
        }
        let total_points: usize = self.point_counts.iter().sum();
        if self.instances.len() != total_points || self.neighbourhood_sizes.len() != total_points {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "expected {total_points} vertices, got {} instances and {} neighbourhood sizes",
                self.instances.len(),
                self.neighbourhood_sizes.len()
            )));
        }
        let total_coords: usize =
            self.point_counts.iter().zip(self.dim_counts.iter()).map(|(p, d)| p * d).sum();
        if self.coords.len() != total_coords {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "expected {total_coords} coordinates, got {}",
                self.coords.len()
            )));
        }
        Ok(())
    }

    fn push(&mut self, parts: HullParts) {
        self.densities.push(parts.density);
        self.total_times.push(parts.total_time);
        self.point_counts.push(parts.instances.len());
        self.dim_counts.push(parts.dims);
        self.instances.extend(parts.instances);
        self.neighbourhood_sizes.extend(parts.neighbourhood_sizes);
        self.coords.extend(parts.coords);
    }
}

/// Converts between hull lists and wire batches. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct HullManager;

impl HullManager {
    /// Flattens the hulls into one batch, keeping their order.
    pub fn serialize_all(hulls: &[ConvexHullModel]) -> WireHullBatch {
        let mut batch = WireHullBatch::default();
        for hull in hulls {
            batch.push(hull.serialize());
        }
        batch
    }

    /// Rebuilds every hull of a batch, in batch order.
    pub fn deserialize_all(batch: &WireHullBatch) -> Result<Vec<ConvexHullModel>, TreeDbscanError> {
        batch.validate()?;

        let mut hulls = Vec::with_capacity(batch.len());
        let mut point_offset = 0;
        let mut coord_offset = 0;
        for i in 0..batch.len() {
            let points = batch.point_counts[i];
            let dims = batch.dim_counts[i];
            let parts = HullParts {
                density: batch.densities[i],
                total_time: batch.total_times[i],
                dims,
                instances: batch.instances[point_offset..point_offset + points].to_vec(),
                neighbourhood_sizes: batch.neighbourhood_sizes[point_offset..point_offset + points]
                    .to_vec(),
                coords: batch.coords[coord_offset..coord_offset + points * dims].to_vec(),
            };
            hulls.push(ConvexHullModel::deserialize(&parts)?);
            point_offset += points;
            coord_offset += points * dims;
        }
        Ok(hulls)
    }

    pub fn serialize_one(hull: &ConvexHullModel) -> WireHullBatch {
        HullManager::serialize_all(std::slice::from_ref(hull))
    }

    /// Single hull variant of `deserialize_all`. The batch must hold exactly one hull.
    pub fn deserialize_one(batch: &WireHullBatch) -> Result<ConvexHullModel, TreeDbscanError> {
        if batch.len() != 1 {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "expected a single hull, got {}",
                batch.len()
            )));
        }
        let mut hulls = HullManager::deserialize_all(batch)?;
        hulls.pop().ok_or_else(|| TreeDbscanError::MalformedBatch(String::from("empty batch")))
    }
}
