use crate::point::{InstanceId, Point};
use crate::TreeDbscanError;
use geo::line_measures::Distance;
use geo::{
    Coord, ConvexHull, Euclidean, Geometry, Intersects, Line, LineString, MultiPoint, Polygon,
};
use std::collections::HashMap;

/// Minimum number of points needed to compute a polygon. Smaller clusters keep every point as a
/// vertex.
pub const MIN_HULL_POINTS: usize = 3;

/// Dimensionality of the hull geometry.
pub const HULL_DIMENSIONS: usize = 2;

/// Hull vertex with the metadata of the point it was taken from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullVertex {
    pub x: f64,
    pub y: f64,
    pub instance: InstanceId,
    pub neighbourhood_size: i64,
}

impl HullVertex {
    fn from_point(point: &Point) -> Self {
        HullVertex {
            x: point.x(),
            y: point.y(),
            instance: point.instance(),
            neighbourhood_size: point.neighbourhood_size(),
        }
    }

    fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }

    fn squared_distance(&self, other: &HullVertex) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }
}

/// Flat numeric form of one hull, as carried in the wire batches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HullParts {
    pub density: i64,
    pub total_time: i64,
    pub dims: usize,
    pub instances: Vec<InstanceId>,
    pub neighbourhood_sizes: Vec<i64>,
    pub coords: Vec<f64>,
}

/// Geometry a hull degenerates to depending on its number of vertices.
enum Shape {
    Empty,
    Point(geo::Point<f64>),
    Segment(Line<f64>),
    Polygon(Polygon<f64>),
}

impl Shape {
    fn geometry(self) -> Option<Geometry<f64>> {
        match self {
            Shape::Empty => None,
            Shape::Point(point) => Some(point.into()),
            Shape::Segment(segment) => Some(segment.into()),
            Shape::Polygon(polygon) => Some(polygon.into()),
        }
    }

    /// Shared points test, the boundaries included. An empty hull intersects nothing.
    fn intersects(self, other: Shape) -> bool {
        match (self.geometry(), other.geometry()) {
            (Some(a), Some(b)) => a.intersects(&b),
            _ => false,
        }
    }
}

/// Convex hull summary of one cluster.
///
/// `density` counts the points the hull stands for, which is usually far more than its number of
/// vertices. `total_time` is the summed duration of those points.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHullModel {
    density: i64,
    total_time: i64,
    vertices: Vec<HullVertex>,
}

impl ConvexHullModel {
    /// Builds the hull of a cluster's points. Only the first two coordinates of each point take
    /// part in the geometry.
    ///
    /// # Parameters
    /// * points - the members of one cluster
    ///
    /// # Returns
    /// * the hull model, with density equal to the number of points
    pub fn build(points: &[&Point]) -> Self {
        let vertices: Vec<HullVertex> = points.iter().map(|p| HullVertex::from_point(p)).collect();
        let total_time = points.iter().map(|p| p.duration() as i64).sum();
        ConvexHullModel::from_candidates(vertices, points.len() as i64, total_time)
    }

    fn from_candidates(candidates: Vec<HullVertex>, density: i64, total_time: i64) -> Self {
        let vertices = if candidates.len() >= MIN_HULL_POINTS {
            convex_vertices(&candidates)
        } else {
            candidates
        };
        ConvexHullModel { density, total_time, vertices }
    }

    pub fn density(&self) -> i64 {
        self.density
    }

    pub fn total_time(&self) -> i64 {
        self.total_time
    }

    /// Vertices in counter-clockwise hull order, without repeating the first one.
    pub fn vertices(&self) -> &[HullVertex] {
        &self.vertices
    }

    pub fn size(&self) -> usize {
        self.vertices.len()
    }

    pub fn dims(&self) -> usize {
        HULL_DIMENSIONS
    }

    /// Merges this hull with `other` if their regions touch.
    ///
    /// Two hulls merge when their regions intersect, a point or segment hull included. Otherwise
    /// they merge when some pair of vertices lies within `epsilon` and the mean neighbourhood
    /// size of the pair plus one reaches `min_points`. Between two proper polygons the vertex
    /// test only runs for a positive `epsilon`.
    ///
    /// # Returns
    /// * the hull of both vertex sets with summed density and time, or `None` if they stay apart
    pub fn merge(&self, other: &ConvexHullModel, epsilon: f64, min_points: usize) -> Option<Self> {
        let do_merge = if self.size() < MIN_HULL_POINTS || other.size() < MIN_HULL_POINTS {
            self.shape().intersects(other.shape())
                || self.has_near_vertices(other, epsilon, min_points)
        } else if self.polygon().intersects(&other.polygon()) {
            true
        } else {
            epsilon > 0.0 && self.has_near_vertices(other, epsilon, min_points)
        };

        if !do_merge {
            return None;
        }
        let joint: Vec<HullVertex> =
            self.vertices.iter().chain(other.vertices.iter()).copied().collect();
        Some(ConvexHullModel::from_candidates(
            joint,
            self.density + other.density,
            self.total_time + other.total_time,
        ))
    }

    fn has_near_vertices(&self, other: &ConvexHullModel, epsilon: f64, min_points: usize) -> bool {
        let squared_epsilon = epsilon * epsilon;
        self.vertices.iter().any(|a| {
            other.vertices.iter().any(|b| {
                a.squared_distance(b) <= squared_epsilon
                    && (a.neighbourhood_size + b.neighbourhood_size) / 2 + 1 >= min_points as i64
            })
        })
    }

    /// Point in hull test, the boundary counts as inside.
    pub fn is_inside(&self, point: &Point) -> bool {
        let query = geo::Point::new(point.x(), point.y());
        match self.shape() {
            Shape::Empty => false,
            Shape::Point(vertex) => vertex.intersects(&query),
            Shape::Segment(segment) => segment.intersects(&query),
            Shape::Polygon(polygon) => polygon.intersects(&query),
        }
    }

    /// True when the point lies within `epsilon` of the hull region.
    pub fn is_near(&self, point: &Point, epsilon: f64) -> bool {
        self.distance(point).is_some_and(|d| d <= epsilon)
    }

    /// Euclidean distance from the point to the hull region, zero inside. `None` for an empty
    /// hull.
    pub fn distance(&self, point: &Point) -> Option<f64> {
        let query = geo::Point::new(point.x(), point.y());
        match self.shape() {
            Shape::Empty => None,
            Shape::Point(vertex) => Some(Euclidean.distance(&query, &vertex)),
            Shape::Segment(segment) => Some(Euclidean.distance(&query, &segment)),
            Shape::Polygon(polygon) => Some(Euclidean.distance(&query, &polygon)),
        }
    }

    fn polygon(&self) -> Polygon<f64> {
        let ring: LineString<f64> = self.vertices.iter().map(HullVertex::coord).collect();
        Polygon::new(ring, vec![])
    }

    fn shape(&self) -> Shape {
        match self.vertices.as_slice() {
            [] => Shape::Empty,
            [a] => Shape::Point(a.coord().into()),
            [a, b] => Shape::Segment(Line::new(a.coord(), b.coord())),
            _ => Shape::Polygon(self.polygon()),
        }
    }

    /// Flattens the hull. Vertex order is kept as is.
    pub fn serialize(&self) -> HullParts {
        let mut parts = HullParts {
            density: self.density,
            total_time: self.total_time,
            dims: HULL_DIMENSIONS,
            instances: Vec::with_capacity(self.size()),
            neighbourhood_sizes: Vec::with_capacity(self.size()),
            coords: Vec::with_capacity(self.size() * HULL_DIMENSIONS),
        };
        for vertex in &self.vertices {
            parts.instances.push(vertex.instance);
            parts.neighbourhood_sizes.push(vertex.neighbourhood_size);
            parts.coords.push(vertex.x);
            parts.coords.push(vertex.y);
        }
        parts
    }

    /// Rebuilds a hull from its flat form without recomputing the geometry.
    pub fn deserialize(parts: &HullParts) -> Result<Self, TreeDbscanError> {
        let num_points = parts.instances.len();
        if parts.dims != HULL_DIMENSIONS {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "hulls are {HULL_DIMENSIONS} dimensional, got {} dimensions",
                parts.dims
            )));
        }
        if parts.neighbourhood_sizes.len() != num_points
            || parts.coords.len() != num_points * parts.dims
        {
            return Err(TreeDbscanError::MalformedBatch(format!(
                "{num_points} instances, {} neighbourhood sizes and {} coordinates do not describe \
                 the same vertices",
                parts.neighbourhood_sizes.len(),
                parts.coords.len()
            )));
        }
        let vertices = parts
            .coords
            .chunks_exact(parts.dims)
            .zip(parts.instances.iter().zip(parts.neighbourhood_sizes.iter()))
            .map(|(xy, (&instance, &neighbourhood_size))| HullVertex {
                x: xy[0],
                y: xy[1],
                instance,
                neighbourhood_size,
            })
            .collect();
        Ok(ConvexHullModel { density: parts.density, total_time: parts.total_time, vertices })
    }
}

/// Convex hull of the candidates, keeping the metadata of the point each vertex came from. When
/// several candidates share a position the first one wins.
fn convex_vertices(candidates: &[HullVertex]) -> Vec<HullVertex> {
    let mut by_position: HashMap<(u64, u64), HullVertex> = HashMap::with_capacity(candidates.len());
    for vertex in candidates {
        by_position.entry((vertex.x.to_bits(), vertex.y.to_bits())).or_insert(*vertex);
    }

    let cloud: MultiPoint<f64> =
        candidates.iter().map(|v| geo::Point::new(v.x, v.y)).collect::<Vec<_>>().into();
    let hull = cloud.convex_hull();

    let ring = &hull.exterior().0;
    // The ring is closed, the last coordinate repeats the first
    let open = match ring.split_last() {
        Some((last, rest)) if !rest.is_empty() && rest[0] == *last => rest,
        _ => ring.as_slice(),
    };
    open.iter()
        .filter_map(|c| by_position.get(&(c.x.to_bits(), c.y.to_bits())).copied())
        .collect()
}
