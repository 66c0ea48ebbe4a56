//! tree-dbscan - clusters a CSV of points over an in-process reduction tree
//!
//! Usage:
//!   tree-dbscan <input.csv> [--epsilon <e>] [--min-points <n>] [--leaves <n>] [--fanout <n>]
//!
//! Every row is `x,y` or `x,y,duration`. Rows are dealt round-robin to the leaves; the cluster id
//! of every row is printed in input order, 0 standing for noise.

use clap::Parser;
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tree_dbscan::{ClusteringParams, LocalTree, Point, RunConfig, TreeDbscanError};

#[derive(Parser)]
#[command(name = "tree-dbscan")]
#[command(about = "Distributed DBSCAN over a tree of in-process nodes", long_about = None)]
struct Cli {
    /// CSV file with one `x,y[,duration]` point per line
    input: PathBuf,

    /// Neighbourhood radius
    #[arg(short, long, default_value = "0.05")]
    epsilon: f64,

    /// Minimum neighbourhood size of a core point
    #[arg(short, long, default_value = "10")]
    min_points: usize,

    /// Number of back-ends the points are spread over
    #[arg(short, long, default_value = "4")]
    leaves: usize,

    /// Maximum number of children per tree node
    #[arg(short, long, default_value = "2")]
    fanout: usize,

    /// Cluster the noise left by the back-ends again at every tree level
    #[arg(long)]
    process_noise: bool,

    /// Cluster the raw coordinates instead of rescaling them into the unit square
    #[arg(long)]
    no_normalize: bool,

    /// Log the statistics of every tree node
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), TreeDbscanError> {
    let points = read_points(&cli.input)?;
    let params = ClusteringParams::builder()
        .epsilon(cli.epsilon)
        .min_points(cli.min_points)
        .process_noise(cli.process_noise)
        .normalize(!cli.no_normalize)
        .build();
    let mut config = RunConfig::new(params);
    config.input = cli.input.display().to_string();
    config.verbose = cli.verbose;

    let tree = LocalTree::new(cli.leaves, cli.fanout)?;
    let num_leaves = tree.topology().leaves().len();
    let total = points.len();
    let mut dealt: Vec<Vec<Point>> = vec![Vec::new(); num_leaves];
    for (n, point) in points.into_iter().enumerate() {
        dealt[n % num_leaves].push(point);
    }

    let run = tree.run(config, dealt)?;

    let assignments: Vec<&[u32]> =
        run.leaves.values().map(|leaf| leaf.partition.assignment()).collect();
    for n in 0..total {
        println!("{}", assignments[n % num_leaves][n / num_leaves]);
    }

    info!("[FE] {} clusters found", run.root.global_model.len());
    for line in run.root.clusters_info.to_string().lines() {
        info!("[FE] {line}");
    }
    if cli.verbose {
        for line in run.root.statistics.render().lines() {
            info!("[FE] {line}");
        }
    }
    Ok(())
}

fn read_points(path: &Path) -> Result<Vec<Point>, TreeDbscanError> {
    let contents = fs::read_to_string(path)?;
    let mut points = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if !(2..=3).contains(&fields.len()) {
            return Err(TreeDbscanError::Configuration(format!(
                "line {}: expected `x,y[,duration]`, got {} fields",
                n + 1,
                fields.len()
            )));
        }
        let coord = |field: &str| {
            field.parse::<f64>().map_err(|e| {
                TreeDbscanError::Configuration(format!("line {}: `{field}`: {e}", n + 1))
            })
        };
        let mut point = Point::xy(coord(fields[0])?, coord(fields[1])?).with_instance(n as i64);
        if let Some(duration) = fields.get(2) {
            let duration = duration.parse::<u64>().map_err(|e| {
                TreeDbscanError::Configuration(format!("line {}: `{duration}`: {e}", n + 1))
            })?;
            point = point.with_duration(duration);
        }
        points.push(point);
    }
    if points.is_empty() {
        return Err(TreeDbscanError::EmptyDataset);
    }
    Ok(points)
}
