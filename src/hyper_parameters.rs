use log::warn;

// Defaults for parameters
const EPSILON_DEFAULT: f64 = 0.05;
const MIN_POINTS_DEFAULT: usize = 10;
const PROCESS_NOISE_DEFAULT: bool = false;
const NORMALIZE_DEFAULT: bool = true;
const MIN_POINTS_POLICY_DEFAULT: MinPointsPolicy =
    MinPointsPolicy::WeightedBySiblings { floor: WEIGHTED_MIN_POINTS_FLOOR };

// Valid minimums/left bounds of parameters
const MIN_POINTS_MINIMUM: usize = 1;
const EPSILON_MINIMUM: f64 = f64::EPSILON;

/// Lowest min points a filter is allowed to weight down to.
pub const WEIGHTED_MIN_POINTS_FLOOR: usize = 3;

/// How a filter derives the min points it merges with from the configured value.
///
/// Clusters that straddle several branches of the tree only show a fraction of their density to
/// each filter, so by default the configured value is divided by the fan-out at the filter's
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinPointsPolicy {
    /// `configured / (siblings + 1)`, never below `floor`.
    WeightedBySiblings { floor: usize },
    /// `configured / children`, never below `floor`.
    WeightedByChildren { floor: usize },
    /// Always the configured value.
    Fixed,
}

impl MinPointsPolicy {
    /// Effective min points for a filter with `siblings` siblings and `children` children.
    pub fn effective_min_points(
        &self,
        configured: usize,
        siblings: usize,
        children: usize,
    ) -> usize {
        match *self {
            MinPointsPolicy::WeightedBySiblings { floor } => {
                (configured / (siblings + 1)).max(floor)
            }
            MinPointsPolicy::WeightedByChildren { floor } => {
                (configured / children.max(1)).max(floor)
            }
            MinPointsPolicy::Fixed => configured,
        }
    }
}

/// Parameters of a tree clustering run. Use `ClusteringParams::builder()` to customise them,
/// otherwise `ClusteringParams::default()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringParams {
    pub(crate) epsilon: f64,
    pub(crate) min_points: usize,
    pub(crate) process_noise: bool,
    pub(crate) normalize: bool,
    pub(crate) min_points_policy: MinPointsPolicy,
}

/// Builder object to set custom clustering parameters.
pub struct ClusteringParamsBuilder {
    epsilon: Option<f64>,
    min_points: Option<usize>,
    process_noise: Option<bool>,
    normalize: Option<bool>,
    min_points_policy: Option<MinPointsPolicy>,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClusteringParams {
    /// Enters the builder pattern, allowing custom parameters to be set using various setter
    /// methods.
    ///
    /// # Returns
    /// * the parameter configuration builder
    pub fn builder() -> ClusteringParamsBuilder {
        ClusteringParamsBuilder {
            epsilon: None,
            min_points: None,
            process_noise: None,
            normalize: None,
            min_points_policy: None,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    pub fn process_noise(&self) -> bool {
        self.process_noise
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn min_points_policy(&self) -> MinPointsPolicy {
        self.min_points_policy
    }
}

impl ClusteringParamsBuilder {
    /// Sets epsilon, the radius of the neighbourhood DBSCAN uses to decide whether a point is a
    /// core point. It is also the tolerance hulls are merged and points classified with.
    /// Defaults to 0.05, meant for normalized data.
    ///
    /// # Parameters
    /// * epsilon - the neighbourhood radius, strictly positive
    ///
    /// # Returns
    /// * the parameter configuration builder
    pub fn epsilon(mut self, epsilon: f64) -> ClusteringParamsBuilder {
        let valid_epsilon = if epsilon.is_finite() && epsilon >= EPSILON_MINIMUM {
            epsilon
        } else {
            warn!("epsilon ({epsilon}) must be a positive number. Set to {EPSILON_DEFAULT}.");
            EPSILON_DEFAULT
        };
        self.epsilon = Some(valid_epsilon);
        self
    }

    /// Sets min points, the number of points an epsilon neighbourhood must hold for its centre to
    /// be a core point. The coordinator also drops global hulls less dense than this.
    /// Defaults to 10.
    ///
    /// # Parameters
    /// * min_points - the minimum neighbourhood size
    ///
    /// # Returns
    /// * the parameter configuration builder
    pub fn min_points(mut self, min_points: usize) -> ClusteringParamsBuilder {
        let valid_min_points = ClusteringParamsBuilder::validate_input_left_bound(
            min_points,
            MIN_POINTS_MINIMUM,
            "min_points",
        );
        self.min_points = Some(valid_min_points);
        self
    }

    /// Sets whether noise points travel up the tree to be re-clustered at every filter.
    /// Defaults to false.
    pub fn process_noise(mut self, process_noise: bool) -> ClusteringParamsBuilder {
        self.process_noise = Some(process_noise);
        self
    }

    /// Sets whether leaves rescale their points to the global per dimension ranges before
    /// clustering. Defaults to true.
    pub fn normalize(mut self, normalize: bool) -> ClusteringParamsBuilder {
        self.normalize = Some(normalize);
        self
    }

    /// Sets how filters weight min points down with the tree fan-out.
    /// Defaults to `MinPointsPolicy::WeightedBySiblings { floor: 3 }`.
    pub fn min_points_policy(mut self, policy: MinPointsPolicy) -> ClusteringParamsBuilder {
        self.min_points_policy = Some(policy);
        self
    }

    /// Finishes the building of the parameter configuration.
    ///
    /// # Returns
    /// * The completed clustering parameters.
    pub fn build(self) -> ClusteringParams {
        ClusteringParams {
            epsilon: self.epsilon.unwrap_or(EPSILON_DEFAULT),
            min_points: self.min_points.unwrap_or(MIN_POINTS_DEFAULT),
            process_noise: self.process_noise.unwrap_or(PROCESS_NOISE_DEFAULT),
            normalize: self.normalize.unwrap_or(NORMALIZE_DEFAULT),
            min_points_policy: self.min_points_policy.unwrap_or(MIN_POINTS_POLICY_DEFAULT),
        }
    }

    fn validate_input_left_bound(input_param: usize, left_bound: usize, param: &str) -> usize {
        if input_param < left_bound {
            warn!(
                "{param} ({input_param}) cannot be lower than {left_bound}. Set to {left_bound}."
            );
            left_bound
        } else {
            input_param
        }
    }
}

/// Run configuration the root broadcasts to every node before clustering starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunConfig {
    pub params: ClusteringParams,
    /// Reference to the clustering definition the parameters were taken from.
    pub definition: String,
    pub input: String,
    pub output: String,
    pub verbose: bool,
    pub reconstruct: bool,
}

impl RunConfig {
    pub fn new(params: ClusteringParams) -> Self {
        RunConfig { params, ..RunConfig::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = ClusteringParams::default();
        assert_eq!(EPSILON_DEFAULT, params.epsilon());
        assert_eq!(MIN_POINTS_DEFAULT, params.min_points());
        assert!(!params.process_noise());
        assert!(params.normalize());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let params = ClusteringParams::builder().epsilon(-1.0).min_points(0).build();
        assert_eq!(EPSILON_DEFAULT, params.epsilon());
        assert_eq!(MIN_POINTS_MINIMUM, params.min_points());
    }

    #[test]
    fn weighting_by_siblings_is_floored() {
        let policy = MinPointsPolicy::WeightedBySiblings { floor: 3 };
        assert_eq!(10, policy.effective_min_points(40, 3, 2));
        assert_eq!(3, policy.effective_min_points(10, 7, 2));
        assert_eq!(40, policy.effective_min_points(40, 0, 2));
    }

    #[test]
    fn other_policies() {
        let by_children = MinPointsPolicy::WeightedByChildren { floor: 3 };
        assert_eq!(20, by_children.effective_min_points(40, 5, 2));
        assert_eq!(3, by_children.effective_min_points(4, 0, 0));
        assert_eq!(40, MinPointsPolicy::Fixed.effective_min_points(40, 5, 2));
    }
}
