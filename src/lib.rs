//! # dkmeans - API documentation
//!
//! dkmeans is a small rust library for distributed k-means-clustering over a
//! fixed pool of communicating workers.
//!
//! ## Design target
//! The library mirrors the classic SPMD structure of message-passing codes:
//! every worker runs the same program against its own contiguous shard of the
//! dataset and the workers meet in blocking collective operations (sum, max,
//! min-with-location, broadcast) to reconcile shared state. Workers are
//! threads wired together through a channel mesh, so a whole multi-worker
//! calculation runs inside one process; the per-worker assignment scan is
//! additionally parallelized over a thread pool.
//!
//! ## Supported strategies
//! The iteration protocol is picked per [`Solver`] through [`Algorithm`]:
//! the sequential baseline, full-batch Lloyd iteration, and a mini-batch /
//! stochastic variant with incremental centroid updates.
//!
//! ## Supported primitive types
//! - [`f32`]
//! - [`f64`]
//!
//! ## Example
//! ```rust
//! use dkmeans::*;
//!
//! fn main() {
//!     let dataset = io::read_dataset::<f64>("2\n0 0\n0 1\n1 0\n10 10\n10 11\n11 10\n".as_bytes()).unwrap();
//!
//!     // Run the full-batch strategy on 3 workers
//!     let results = comm::run(3, |comm| {
//!         let mut solver = Solver::new(comm, &dataset, Algorithm::Batch).unwrap();
//!         solver.set_k(2).unwrap();
//!         solver.solve();
//!         (solver.iterations(), solver.distortion())
//!     });
//!
//!     let (iterations, distortion) = results[0];
//!     println!("converged after {} iterations, distortion {}", iterations, distortion);
//! }
//! ```
//!
//! ## Short API-Overview / Description
//! Entry-point of the library is the [`Solver`] struct, one instance per
//! worker, generic over the underlying primitive type and the distance
//! strategy of the assignment step. [`comm::run`] spawns the worker pool and
//! hands each closure its [`Communicator`]; inside, a solver is configured
//! (`set_k`, [`StopCriterion`], seed, batch size, ground-truth labels),
//! driven with [`Solver::solve`], and read out through its accessors
//! (iterations, global cluster counts, [`Solver::distortion`],
//! [`Solver::purity`], [`Solver::write_output`]).
//!
//! **Note**: collective accessors must be called by every worker together,
//! in the same order. Calling one from a subset of the workers deadlocks by
//! design of the blocking collectives.

#[macro_use] mod helpers;
mod error;
mod partition;
mod point;
mod primitives;
mod solver;
mod stop;
mod variants;

pub mod comm;
pub mod distances;
pub mod io;

pub use comm::Communicator;
pub use distances::{DistanceFunction, Manhattan, SquaredEuclidean};
pub use error::{Error, Result};
pub use partition::Partition;
pub use point::{dist2, Dataset, Point, UNSET_LABEL};
pub use primitives::Primitive;
pub use solver::{Algorithm, Phase, Solver};
pub use stop::{ConvergenceStreak, StopCriterion};
