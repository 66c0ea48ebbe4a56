use num_traits::Float;

/// Squared euclidean distance. This is the metric the k-d tree range queries run on, so query
/// radii must be squared as well.
pub(crate) fn squared_euclidean<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x) - (*y)) * ((*x) - (*y)))
        .fold(T::zero(), std::ops::Add::add)
}

/// Range query radius for an epsilon neighbourhood under `squared_euclidean`.
pub(crate) fn squared_radius<T: Float>(epsilon: T) -> T {
    epsilon * epsilon
}
