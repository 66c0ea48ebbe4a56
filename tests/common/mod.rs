#![allow(dead_code)]
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tree_dbscan::{
    merge_pass, ClusteringParams, ConvexHullClassifier, ConvexHullModel, Coordinator,
    LocalAnalyzer, MinPointsPolicy, Partition, Point, RunConfig, NOISE_CLUSTER_ID,
};

pub type ClassifyFn = fn(&ConvexHullClassifier, &[Point]) -> Partition;

/// Points on a regular grid covering `[x0, x1] x [y0, y1]`.
pub fn grid(x0: f64, y0: f64, x1: f64, y1: f64, step: f64, duration: u64) -> Vec<Point> {
    let nx = ((x1 - x0) / step).round() as usize;
    let ny = ((y1 - y0) / step).round() as usize;
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
    for i in 0..=nx {
        for j in 0..=ny {
            let point = Point::xy(x0 + i as f64 * step, y0 + j as f64 * step);
            points.push(point.with_duration(duration));
        }
    }
    points
}

/// `n` points drawn uniformly from the square of half side `radius` around the centre.
pub fn blob(rng: &mut StdRng, cx: f64, cy: f64, radius: f64, n: usize) -> Vec<Point> {
    (0..n)
        .map(|_| {
            let x = cx + rng.gen_range(-radius..radius);
            let y = cy + rng.gen_range(-radius..radius);
            Point::xy(x, y).with_duration(rng.gen_range(1..100))
        })
        .collect()
}

pub fn hull_of(points: &[Point]) -> ConvexHullModel {
    let refs: Vec<&Point> = points.iter().collect();
    ConvexHullModel::build(&refs)
}

pub fn config(epsilon: f64, min_points: usize) -> RunConfig {
    let params = ClusteringParams::builder()
        .epsilon(epsilon)
        .min_points(min_points)
        .min_points_policy(MinPointsPolicy::Fixed)
        .normalize(false)
        .build();
    RunConfig::new(params)
}

/// Single level reduction done by hand: every leaf analysed locally, all the hulls merged at once
/// and the result finalized as the root would.
pub fn global_model(leaves: &mut [Vec<Point>], config: &RunConfig) -> Vec<ConvexHullModel> {
    let params = &config.params;
    let analyzer = LocalAnalyzer::new(params.epsilon(), params.min_points());
    let hulls: Vec<ConvexHullModel> = leaves
        .iter_mut()
        .flat_map(|points| analyzer.analyze(points).unwrap().hulls)
        .collect();
    let merged = merge_pass(hulls, params.epsilon(), params.min_points());
    Coordinator::new(config.clone()).finalize(merged.hulls)
}

fn distinct(ids: &[u32]) -> HashSet<u32> {
    ids.iter().copied().collect()
}

pub fn test_overlapping_leaves_share_a_cluster(classify_fn: ClassifyFn) {
    let a = grid(0.0, 0.0, 1.0, 1.0, 0.1, 1);
    let b = grid(0.9, 0.9, 2.0, 2.0, 0.1, 1);
    let c = grid(5.0, 5.0, 6.0, 6.0, 0.1, 1);
    let hulls = vec![hull_of(&a), hull_of(&b), hull_of(&c)];

    let outcome = merge_pass(hulls, 0.05, 10);
    assert_eq!(2, outcome.hulls.len());
    let mut densities: Vec<i64> = outcome.hulls.iter().map(ConvexHullModel::density).collect();
    densities.sort();
    assert_eq!(vec![a.len() as i64, (a.len() + b.len()) as i64], densities);

    let model = Coordinator::new(config(0.05, 10)).finalize(outcome.hulls);
    let classifier = ConvexHullClassifier::new(&model, 0.05);
    let ab: Vec<Point> = a.iter().chain(b.iter()).cloned().collect();
    assert_eq!(HashSet::from([1]), distinct(classify_fn(&classifier, &ab).assignment()));
    assert_eq!(HashSet::from([2]), distinct(classify_fn(&classifier, &c).assignment()));
}

pub fn test_sparse_hulls_dropped_at_the_root(classify_fn: ClassifyFn) {
    let long_running = grid(0.0, 0.0, 0.2, 0.2, 0.05, 10);
    let short_running: Vec<Point> =
        grid(3.0, 0.0, 3.3, 0.3, 0.05, 1).into_iter().take(40).collect();
    let sparse = vec![
        Point::xy(6.0, 6.0).with_duration(500),
        Point::xy(6.1, 6.0).with_duration(500),
    ];
    assert_eq!(25, long_running.len());

    let model = Coordinator::new(config(0.05, 10)).finalize(vec![
        hull_of(&short_running),
        hull_of(&sparse),
        hull_of(&long_running),
    ]);
    assert_eq!(vec![25, 40], model.iter().map(ConvexHullModel::density).collect::<Vec<_>>());

    let classifier = ConvexHullClassifier::new(&model, 0.05);
    let probes = [Point::xy(0.1, 0.1), Point::xy(3.1, 0.1), Point::xy(6.05, 6.0)];
    assert_eq!(&[1, 2, NOISE_CLUSTER_ID], classify_fn(&classifier, &probes).assignment());
}

pub fn test_points_near_a_hull_join_it(classify_fn: ClassifyFn) {
    let model = vec![hull_of(&grid(0.0, 0.0, 1.0, 1.0, 0.25, 1))];
    let classifier = ConvexHullClassifier::new(&model, 0.1);
    let probes = [Point::xy(1.05, 0.5), Point::xy(0.5, -0.09), Point::xy(1.2, 0.5)];
    assert_eq!(&[1, 1, NOISE_CLUSTER_ID], classify_fn(&classifier, &probes).assignment());
}

pub fn test_random_blobs_across_leaves(classify_fn: ClassifyFn) {
    let mut rng = StdRng::seed_from_u64(7);
    let centres = [(0.0, 0.0), (2.0, 0.0), (0.0, 2.0)];
    let blobs: Vec<Vec<Point>> =
        centres.iter().map(|&(x, y)| blob(&mut rng, x, y, 0.2, 800)).collect();

    // every blob is spread over every leaf
    let mut leaves: Vec<Vec<Point>> = vec![Vec::new(); 4];
    let mut origin: Vec<Vec<usize>> = vec![Vec::new(); 4];
    for (b, points) in blobs.iter().enumerate() {
        for (n, point) in points.iter().enumerate() {
            leaves[n % 4].push(point.clone());
            origin[n % 4].push(b);
        }
    }

    let config = config(0.1, 5);
    let model = global_model(&mut leaves, &config);
    assert_eq!(3, model.len());
    let clustered: i64 = model.iter().map(ConvexHullModel::density).sum();
    assert!(clustered > 2350 && clustered <= 2400);

    let classifier = ConvexHullClassifier::new(&model, config.params.epsilon());
    let mut blob_ids: Vec<HashSet<u32>> = vec![HashSet::new(); 3];
    for (points, origin) in leaves.iter().zip(&origin) {
        let partition = classify_fn(&classifier, points);
        for (id, &b) in partition.assignment().iter().zip(origin) {
            blob_ids[b].insert(*id);
        }
    }
    assert!(blob_ids.iter().all(|ids| ids.len() == 1));
    let all: HashSet<u32> = blob_ids.iter().flatten().copied().collect();
    assert_eq!(HashSet::from([1, 2, 3]), all);
}

pub fn test_empty_model_leaves_everything_noise(classify_fn: ClassifyFn) {
    let classifier = ConvexHullClassifier::new(&[], 0.05);
    let points = grid(0.0, 0.0, 1.0, 1.0, 0.5, 1);
    let partition = classify_fn(&classifier, &points);
    assert_eq!(9, partition.len());
    assert_eq!(0, partition.number_of_clusters());
    assert!(partition.has_noise());
}

pub fn test_classification_is_repeatable(classify_fn: ClassifyFn) {
    let model = vec![
        hull_of(&grid(0.0, 0.0, 1.0, 1.0, 0.25, 1)),
        hull_of(&grid(0.5, 0.5, 1.5, 1.5, 0.25, 1)),
    ];
    let classifier = ConvexHullClassifier::new(&model, 0.05);
    let mut rng = StdRng::seed_from_u64(11);
    let points = blob(&mut rng, 0.75, 0.75, 1.0, 500);
    let first = classify_fn(&classifier, &points);
    for _ in 0..3 {
        assert_eq!(first, classify_fn(&classifier, &points));
    }
}
