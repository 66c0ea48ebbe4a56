use crate::TreeDbscanError;

/// Identifier of the trace instance (burst) a point was extracted from.
pub type InstanceId = i64;

/// A clustering point: a fixed-dimensionality coordinate vector annotated with the instance it
/// was extracted from, its burst duration and, once a local DBSCAN has run over it, the size of
/// its epsilon neighbourhood.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    coords: Vec<f64>,
    instance: InstanceId,
    duration: u64,
    neighbourhood_size: i64,
}

impl Point {
    pub fn new(coords: Vec<f64>) -> Self {
        Point { coords, instance: 0, duration: 0, neighbourhood_size: 0 }
    }

    /// Shorthand for a two dimensional point, the dimensionality the hull geometry works in.
    pub fn xy(x: f64, y: f64) -> Self {
        Point::new(vec![x, y])
    }

    pub fn with_instance(mut self, instance: InstanceId) -> Self {
        self.instance = instance;
        self
    }

    pub fn with_duration(mut self, duration: u64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_neighbourhood_size(mut self, neighbourhood_size: i64) -> Self {
        self.neighbourhood_size = neighbourhood_size;
        self
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn dims(&self) -> usize {
        self.coords.len()
    }

    pub fn x(&self) -> f64 {
        self.coords.first().copied().unwrap_or(0.0)
    }

    pub fn y(&self) -> f64 {
        self.coords.get(1).copied().unwrap_or(0.0)
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn neighbourhood_size(&self) -> i64 {
        self.neighbourhood_size
    }

    pub(crate) fn annotate_neighbourhood(&mut self, neighbourhood_size: usize) {
        self.neighbourhood_size = neighbourhood_size as i64;
    }

    /// Rescales every coordinate into `[0, 1]` using the given per dimension ranges. A dimension
    /// whose range is empty maps to 0.
    pub(crate) fn normalize(&mut self, ranges: &DimensionRanges) {
        for (dim, value) in self.coords.iter_mut().enumerate() {
            let (min, max) = (ranges.min[dim], ranges.max[dim]);
            let span = max - min;
            *value = if span > 0.0 { (*value - min) / span } else { 0.0 };
        }
    }
}

/// Per dimension minimum and maximum of a point set. Payload of the dimensions exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimensionRanges {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl DimensionRanges {
    pub fn of(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return DimensionRanges::default();
        };
        let mut ranges = DimensionRanges { min: first.coords.clone(), max: first.coords.clone() };
        for point in &points[1..] {
            for (dim, value) in point.coords.iter().enumerate() {
                ranges.min[dim] = ranges.min[dim].min(*value);
                ranges.max[dim] = ranges.max[dim].max(*value);
            }
        }
        ranges
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Widens these ranges to also cover `other`. Empty ranges (a leaf without points) are
    /// neutral.
    pub fn combine(&mut self, other: &DimensionRanges) -> Result<(), TreeDbscanError> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if self.dims() != other.dims() || other.max.len() != other.min.len() {
            return Err(TreeDbscanError::WrongDimension(format!(
                "cannot combine ranges of {} and {} dimensions",
                self.dims(),
                other.dims()
            )));
        }
        for dim in 0..self.dims() {
            self.min[dim] = self.min[dim].min(other.min[dim]);
            self.max[dim] = self.max[dim].max(other.max[dim]);
        }
        Ok(())
    }
}

/// Checks a point set is usable for clustering: consistent dimensionality and finite
/// coordinates.
pub(crate) fn validate_points(points: &[Point]) -> Result<(), TreeDbscanError> {
    let Some(first) = points.first() else {
        return Ok(());
    };
    let dims_0th = first.dims();
    for (n, point) in points.iter().enumerate() {
        if point.coords.iter().any(|c| !c.is_finite()) {
            return Err(TreeDbscanError::NonFiniteCoordinate(format!(
                "{n}th point contains non-finite element(s)"
            )));
        }
        let dims_nth = point.dims();
        if dims_nth != dims_0th {
            return Err(TreeDbscanError::WrongDimension(format!(
                "0th point has {dims_0th} dimensions, but {n}th has {dims_nth}"
            )));
        }
    }
    Ok(())
}
