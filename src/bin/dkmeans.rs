extern crate pretty_env_logger;

#[macro_use]
extern crate log;

use clap::{Parser, ValueEnum};
use dkmeans::{comm, io, Algorithm, Solver, StopCriterion};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    /// Single-worker reference run
    Sequential,
    /// Full-batch Lloyd iteration
    Batch,
    /// Mini-batch / stochastic iteration
    Minibatch,
}

impl From<Method> for Algorithm {
    fn from(method: Method) -> Algorithm {
        match method {
            Method::Sequential => Algorithm::Sequential,
            Method::Batch => Algorithm::Batch,
            Method::Minibatch => Algorithm::MiniBatch,
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(version, about = "distributed k-means clustering")]
struct ArgParser {
    /// Dataset to cluster (dimension header, then one point per row)
    dataset: std::path::PathBuf,

    /// Number of clusters to search for
    #[arg(short, default_value_t = 2)]
    k: usize,

    /// Iteration strategy
    #[arg(short, long, value_enum, default_value_t = Method::Batch)]
    method: Method,

    /// Number of workers the dataset is split over
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Hard iteration cap (non-positive: unlimited)
    #[arg(long, default_value_t = 1000)]
    max_iterations: i64,

    /// Stop once a round changes fewer labels than this (non-positive: ignore)
    #[arg(long, default_value_t = 1)]
    min_changes: i64,

    /// Stop once no centroid moved at least this far (non-positive: ignore)
    #[arg(long, default_value_t = -1.0)]
    min_displacement: f64,

    /// Global batch size per round of the minibatch strategy
    #[arg(long, default_value_t = 20)]
    batch_size: usize,

    /// Consecutive converged rounds the minibatch strategy requires
    #[arg(long, default_value_t = 15)]
    stable_rounds: usize,

    /// Base seed of the deterministic label randomization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Project every centroid onto the nearest actual dataset point
    #[arg(long, default_value_t = false)]
    medoid: bool,

    /// Ground-truth labels, one integer per point
    #[arg(long)]
    true_labels: Option<std::path::PathBuf>,

    /// Value added to each raw ground-truth label (label files are usually 1-based)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    offset: i64,

    /// Report the clustering purity (needs --true-labels)
    #[arg(long, default_value_t = false)]
    purity: bool,

    /// Write the labelled dataset to this file
    #[arg(short, long)]
    output: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn checkargs(args: &ArgParser) {
    let mut fail = false;
    if args.workers == 0 {
        error!("--workers must be at least 1");
        fail = true;
    }
    if matches!(args.method, Method::Sequential) && args.workers != 1 {
        error!("the sequential strategy runs on exactly one worker");
        fail = true;
    }
    if args.purity && args.true_labels.is_none() {
        error!("--purity needs --true-labels");
        fail = true;
    }
    if fail {
        std::process::exit(1);
    }
}

struct Summary {
    iterations: usize,
    distortion: f64,
    counts: Vec<i64>,
    purity: Option<f64>,
    output: Vec<u8>,
}

fn main() -> dkmeans::Result<()> {
    let args = ArgParser::parse();
    let level = if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .init();
    checkargs(&args);

    let dataset = io::read_dataset_file::<f64>(&args.dataset)?;
    let truth = match &args.true_labels {
        Some(path) => Some(io::read_true_labels_file(path)?),
        None => None,
    };
    info!(
        "{} points of dimension {}, k = {}, {:?} on {} worker(s)",
        dataset.len(), dataset.dim, args.k, args.method, args.workers
    );

    let stop = StopCriterion::new(args.max_iterations, args.min_displacement, args.min_changes);
    let start = Instant::now();
    let results = comm::run(args.workers, |comm| -> dkmeans::Result<Summary> {
        let mut solver = Solver::new(comm, &dataset, args.method.into())?;
        solver.set_k(args.k)?;
        solver.set_stop(stop);
        solver.set_batch_size(args.batch_size);
        solver.set_stable_rounds(args.stable_rounds);
        solver.set_seed(args.seed);
        solver.set_medoid(args.medoid);
        if let Some(truth) = &truth {
            solver.set_true_labels(truth, args.offset)?;
        }

        solver.solve();

        let purity = if args.purity { Some(solver.purity()?) } else { None };
        let distortion = solver.distortion();
        let mut output = Vec::new();
        if args.output.is_some() {
            solver.write_output(&mut output)?;
        }
        Ok(Summary {
            iterations: solver.iterations(),
            distortion,
            counts: (0..args.k).map(|kk| solver.cluster_count(kk)).collect(),
            purity,
            output,
        })
    });
    let elapsed = start.elapsed();

    // Replicated state: worker 0's summary speaks for the whole run.
    let summary = results.into_iter().next().unwrap()?;
    info!(
        "converged after {} iterations in {:.3}s",
        summary.iterations,
        elapsed.as_secs_f64()
    );
    info!("distortion {:.6}", summary.distortion);
    info!("cluster sizes {:?}", summary.counts);
    if let Some(purity) = summary.purity {
        info!("purity {:.4}", purity);
    }

    if let Some(path) = &args.output {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&summary.output)?;
        info!("labelled dataset written to {}", path.display());
    }
    Ok(())
}
