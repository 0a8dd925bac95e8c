use crate::{
    dist2, Communicator, Dataset, DistanceFunction, Error, Partition, Point, Primitive, Result,
    SquaredEuclidean, StopCriterion, UNSET_LABEL,
};
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::io::Write;

/// The three iteration protocols a solver can be constructed with.
///
/// A closed set: the strategy is chosen once at construction and shapes the
/// whole communication schedule of `solve()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// Single worker, no communication. The correctness and timing baseline.
    Sequential,
    /// Full-batch Lloyd iteration: every point reassigned every round, full
    /// centroid recompute and reconciliation every round.
    Batch,
    /// Mini-batch/stochastic rounds with incremental centroid updates and
    /// the consecutive-rounds stopping rule.
    MiniBatch,
}

/// Lifecycle of a solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Randomized,
    Iterating,
    Converged,
}

/// Distributed k-means solver, one instance per worker.
///
/// Owns the worker's contiguous shard of the dataset plus the replicated
/// centroid set and global cluster counts. Replicated state is only
/// consistent immediately after a collective operation returned; every
/// iteration protocol in [`crate::variants`] is written so that reads of
/// centroids or global counts happen strictly after the reconciliation
/// collective of the round that produced them.
///
/// ## Generics
/// - **T**: floating-point primitive of the calculation
/// - **D**: distance strategy used by the assignment engine
pub struct Solver<T: Primitive, D: DistanceFunction<T> = SquaredEuclidean> {
    pub(crate) comm: Communicator<T>,
    pub(crate) partition: Partition,
    pub(crate) dim: usize,
    pub(crate) shard: Vec<Point<T>>,
    pub(crate) algorithm: Algorithm,
    pub(crate) metric: D,

    pub(crate) k: usize,
    pub(crate) centroids: Vec<Point<T>>,
    /// Per-worker counts of locally held points per cluster.
    pub(crate) counts: Vec<i64>,
    /// Replicated global counts; refreshed by every count reduction.
    pub(crate) global_counts: Vec<i64>,

    pub(crate) stop: StopCriterion<T>,
    pub(crate) batch_size: usize,
    pub(crate) stable_rounds: usize,
    pub(crate) seed: u64,
    pub(crate) medoid: bool,

    pub(crate) iterations: usize,
    phase: Phase,
    true_labels_set: bool,
}

impl<T: Primitive> Solver<T, SquaredEuclidean> {
    /// Construct a solver over its worker's communicator, partitioning the
    /// global dataset into this worker's contiguous share.
    pub fn new(comm: Communicator<T>, dataset: &Dataset<T>, algorithm: Algorithm) -> Result<Self> {
        Self::with_metric(comm, dataset, algorithm, SquaredEuclidean)
    }
}

impl<T: Primitive, D: DistanceFunction<T>> Solver<T, D> {
    pub fn with_metric(
        comm: Communicator<T>, dataset: &Dataset<T>, algorithm: Algorithm, metric: D,
    ) -> Result<Self> {
        if dataset.is_empty() {
            return Err(Error::EmptyDataset);
        }
        assert!(
            algorithm != Algorithm::Sequential || comm.size() == 1,
            "the sequential strategy runs on exactly one worker"
        );
        debug_assert!(dataset.points.iter().all(|p| p.dim() == dataset.dim));

        let partition = Partition::new(dataset.len(), comm.rank(), comm.size());
        let shard = dataset.points[partition.range()].to_vec();
        Ok(Self {
            comm,
            partition,
            dim: dataset.dim,
            shard,
            algorithm,
            metric,
            k: 0,
            centroids: Vec::new(),
            counts: Vec::new(),
            global_counts: Vec::new(),
            stop: StopCriterion::default(),
            batch_size: 20,
            stable_rounds: 15,
            seed: 0,
            medoid: false,
            iterations: 0,
            phase: Phase::Uninitialized,
            true_labels_set: false,
        })
    }

    /// Set the number of clusters to search for. (Re)creates the centroid
    /// set and the cluster counts.
    pub fn set_k(&mut self, k: usize) -> Result<()> {
        if k == 0 || k > self.partition.global_len() {
            return Err(Error::KOutOfRange { k, len: self.partition.global_len() });
        }
        self.k = k;
        self.centroids = vec![Point::zero(self.dim); k];
        self.counts = vec![0; k];
        self.global_counts = vec![0; k];
        Ok(())
    }

    pub fn set_stop(&mut self, stop: StopCriterion<T>) {
        self.stop = stop;
    }

    /// Total batch size per round of the mini-batch strategy; split across
    /// workers the same way the dataset is.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
    }

    /// Consecutive still-converged rounds the mini-batch strategy demands
    /// before terminating.
    pub fn set_stable_rounds(&mut self, rounds: usize) {
        self.stable_rounds = rounds;
    }

    /// Base seed for the deterministic label randomization and the
    /// mini-batch sampling.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Replace each computed mean with the dataset point nearest to it
    /// (exhaustive global scan) after every full recompute.
    pub fn set_medoid(&mut self, medoid: bool) {
        self.medoid = medoid;
    }

    /// Attach ground-truth labels for the purity evaluation. `labels` is the
    /// full global sequence, in dataset order; every worker takes its own
    /// partition range. `offset` is added to each raw label (label files are
    /// commonly 1-based, hence the conventional offset of -1).
    pub fn set_true_labels(&mut self, labels: &[i64], offset: i64) -> Result<()> {
        if labels.len() != self.partition.global_len() {
            return Err(Error::TrueLabelCount {
                got: labels.len(),
                expected: self.partition.global_len(),
            });
        }
        for (pt, &raw) in self.shard.iter_mut().zip(&labels[self.partition.range()]) {
            pt.set_true_label(raw + offset);
        }
        self.true_labels_set = true;
        Ok(())
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Iterations used by the last `solve()` call.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Global (reduced, replicated) count of points in the given cluster.
    pub fn cluster_count(&self, label: usize) -> i64 {
        self.global_counts[label]
    }

    pub fn centroids(&self) -> &[Point<T>] {
        &self.centroids
    }

    /// This worker's shard of the dataset, with current labels.
    pub fn local_points(&self) -> &[Point<T>] {
        &self.shard
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Run the configured strategy to convergence. Results are read through
    /// the accessors afterwards.
    pub fn solve(&mut self) {
        assert!(self.k > 0, "set_k must be called before solve");
        self.iterations = 0;

        self.randomize();
        self.phase = Phase::Randomized;
        self.compute_centroids();

        self.phase = Phase::Iterating;
        match self.algorithm {
            Algorithm::Sequential => crate::variants::sequential::solve(self),
            Algorithm::Batch => crate::variants::batch::solve(self),
            Algorithm::MiniBatch => crate::variants::minibatch::solve(self),
        }
        self.phase = Phase::Converged;

        if self.comm.rank() == 0 {
            debug!("converged after {} iterations", self.iterations);
        }
    }

    /// Drop the dataset shard to give memory back after solving. Accessors
    /// that need the points (purity, output, distortion) stop working; the
    /// centroids, counts and iteration statistics survive.
    pub fn release_dataset(&mut self) {
        self.shard = Vec::new();
    }

    /// Assign every point a uniform random label in `[0, k)`.
    ///
    /// The label of global point `i` is derived from a fresh RNG seeded from
    /// `i` and the configured base seed, so the outcome is identical for any
    /// worker count without any communication.
    pub(crate) fn randomize(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        for (i, pt) in self.shard.iter_mut().enumerate() {
            let global = (self.partition.offset() + i) as u64;
            let mut rng = StdRng::seed_from_u64(global.wrapping_mul(1000).wrapping_add(self.seed));
            let label = rng.gen_range(0..self.k);
            pt.set_label(label as i64);
            self.counts[label] += 1;
        }
        if self.comm.rank() == 0 {
            debug!("randomized initial labels (k = {})", self.k);
        }
    }

    /// Full centroid recompute (the batch Lloyd's step): componentwise local
    /// sums, one count reduction, one flat sum reduction, divide by the
    /// *global* count.
    ///
    /// A cluster whose global count is zero is reseeded afterwards, see
    /// [`Self::reseed_empty_clusters`]. With the medoid option on, every
    /// centroid is then projected onto the nearest actual dataset point.
    pub(crate) fn compute_centroids(&mut self) {
        let (k, dim) = (self.k, self.dim);

        let mut sums = vec![T::zero(); k * dim];
        for pt in &self.shard {
            let label = pt.label();
            assert!(label >= 0 && (label as usize) < k, "label {} out of range", label);
            let row = &mut sums[label as usize * dim..(label as usize + 1) * dim];
            row.iter_mut().zip(pt.coords()).for_each(|(s, &c)| *s += c);
        }

        // Counts first: the divisor below must never be a stale local count.
        let mut global = self.counts.clone();
        self.comm.all_reduce_sum_i64(&mut global);
        self.comm.all_reduce_sum(&mut sums);
        self.global_counts = global;

        for kk in 0..k {
            if self.global_counts[kk] == 0 {
                continue;
            }
            let divisor = T::from(self.global_counts[kk]).unwrap();
            let row = &sums[kk * dim..(kk + 1) * dim];
            self.centroids[kk] = Point::new(row.iter().map(|&s| s / divisor).collect());
        }
        self.reseed_empty_clusters();

        if self.medoid {
            self.project_to_medoids();
        }
    }

    /// Give every empty cluster a fresh centroid: the dataset point whose
    /// global index equals the cluster index, which the cluster also adopts
    /// as its first member. Adopting can empty the donor cluster, so the
    /// scan repeats until it comes up clean; since an adopted point never
    /// leaves again within the pass, at most k rescans happen. On return no
    /// cluster is empty.
    ///
    /// The scan is driven entirely by the replicated global counts, so all
    /// workers walk it in lockstep and meet in the collectives together.
    fn reseed_empty_clusters(&mut self) {
        loop {
            let mut reseeded = false;
            for kk in 0..self.k {
                if self.global_counts[kk] != 0 {
                    continue;
                }
                reseeded = true;

                let coords = self.global_point(kk);
                let owner = self.partition.rank_of(kk);
                let mut donor = vec![0i64];
                if self.comm.rank() == owner {
                    let local = kk - self.partition.offset();
                    donor[0] = self.shard[local].label();
                    self.shard[local].set_label(kk as i64);
                }
                self.comm.broadcast_i64s(owner, &mut donor);

                let donor = donor[0] as usize;
                if self.comm.rank() == owner {
                    self.counts[donor] -= 1;
                    self.counts[kk] += 1;
                }
                self.global_counts[donor] -= 1;
                self.global_counts[kk] += 1;
                self.centroids[kk] = Point::new(coords);
            }
            if !reseeded {
                break;
            }
        }
    }

    /// Fetch the coordinates of the dataset point with the given global
    /// index from whichever worker holds it. Collective.
    pub(crate) fn global_point(&self, global_index: usize) -> Vec<T> {
        let owner = self.partition.rank_of(global_index);
        let mut coords = if self.comm.rank() == owner {
            self.shard[global_index - self.partition.offset()].coords().to_vec()
        } else {
            Vec::new()
        };
        self.comm.broadcast(owner, &mut coords);
        coords
    }

    /// Replace each centroid with the dataset point nearest to it, scanning
    /// the entire dataset in ascending global index order. Collective.
    fn project_to_medoids(&mut self) {
        for kk in 0..self.k {
            let mut best = T::infinity();
            let mut best_idx = usize::MAX;
            for (i, pt) in self.shard.iter().enumerate() {
                let d = self.metric.distance(pt.coords(), self.centroids[kk].coords());
                if d < best {
                    best = d;
                    best_idx = self.partition.offset() + i;
                }
            }
            let (_, winner) = self.comm.all_reduce_min_loc(best, best_idx);
            let coords = self.global_point(winner);
            self.centroids[kk] = Point::new(coords);
        }
    }

    /// Reassign every local point to its nearest centroid. Mutates labels in
    /// place and keeps the *local* counts incrementally consistent; the
    /// global reconciliation is deferred to the caller's collective step.
    /// Returns the local number of changed labels.
    ///
    /// Parallel across the shard; static work packets, since the per-point
    /// cost is uniform.
    pub(crate) fn update_assignments(&mut self) -> i64 {
        let k = self.k;
        let centroids = &self.centroids;
        let metric = &self.metric;
        let work_packet = (self.shard.len() / rayon::current_num_threads().max(1)).max(1);

        let (delta, changes) = self.shard.par_iter_mut()
            .with_min_len(work_packet)
            .fold(|| (vec![0i64; k], 0i64), |(mut delta, mut changes), pt| {
                let best = nearest_centroid(pt.coords(), centroids, metric) as i64;
                let old = pt.label();
                if old != best {
                    if old != UNSET_LABEL {
                        delta[old as usize] -= 1;
                    }
                    delta[best as usize] += 1;
                    pt.set_label(best);
                    changes += 1;
                }
                (delta, changes)
            })
            .reduce(|| (vec![0i64; k], 0), |(mut da, ca), (db, cb)| {
                da.iter_mut().zip(db).for_each(|(a, b)| *a += b);
                (da, ca + cb)
            });

        self.counts.iter_mut().zip(delta).for_each(|(c, d)| *c += d);
        changes
    }

    /// Largest euclidean movement of any centroid relative to `previous`.
    /// Local value; the caller reduces it to the global maximum.
    pub(crate) fn displacement(&self, previous: &[Point<T>]) -> T {
        let mut worst = T::zero();
        for (old, new) in previous.iter().zip(&self.centroids) {
            let d = dist2(old, new);
            if d > worst {
                worst = d;
            }
        }
        worst.sqrt()
    }

    /// Global within-cluster distance sum under the configured metric.
    /// Collective: every worker must call this together.
    pub fn distortion(&self) -> T {
        let local: T = self.shard.iter()
            .map(|pt| {
                let label = pt.label();
                assert!(label >= 0, "distortion before any assignment");
                self.metric.distance(pt.coords(), self.centroids[label as usize].coords())
            })
            .sum();
        let mut buf = [local];
        self.comm.all_reduce_sum(&mut buf);
        buf[0]
    }

    /// Clustering purity against the ground-truth labels, in `[0, 1]`.
    ///
    /// Each cluster is credited with its majority ground-truth label (ties
    /// to the lowest label); purity is the globally reduced fraction of
    /// points whose ground truth matches their cluster's majority label.
    /// Read-only and collective; fails if ground truth was never attached.
    pub fn purity(&self) -> Result<T> {
        if !self.true_labels_set {
            return Err(Error::TrueLabelsNotSet);
        }
        let k = self.k;

        // contingency[cluster * k + true_label]; ground-truth labels outside
        // [0, k) can never be a majority and are left out of the table.
        let mut contingency = vec![0i64; k * k];
        for pt in &self.shard {
            let (label, truth) = (pt.label() as usize, pt.true_label());
            if truth >= 0 && (truth as usize) < k {
                contingency[label * k + truth as usize] += 1;
            }
        }
        self.comm.all_reduce_sum_i64(&mut contingency);

        let mut majority = vec![UNSET_LABEL; k];
        for kk in 0..k {
            let row = &contingency[kk * k..(kk + 1) * k];
            let mut best = row[0];
            let mut best_label = 0;
            for (label, &count) in row.iter().enumerate().skip(1) {
                if count > best {
                    best = count;
                    best_label = label;
                }
            }
            majority[kk] = best_label as i64;
        }

        let matches: i64 = self.shard.iter()
            .filter(|pt| pt.true_label() == majority[pt.label() as usize])
            .count() as i64;
        let mut buf = [matches];
        self.comm.all_reduce_sum_i64(&mut buf);

        Ok(T::from(buf[0]).unwrap() / T::from(self.partition.global_len()).unwrap())
    }

    /// Emit the labelled dataset. Worker 0 writes; the others stream their
    /// shards to it point by point. Collective.
    ///
    /// Format, as consumed by the downstream plotting scripts:
    /// ```text
    /// dim = <n>;
    /// clusters = <k>;
    /// dataset = [ <label> <coord 0> ... <coord n-1>;
    /// ...];
    /// ```
    pub fn write_output(&self, out: &mut dyn Write) -> Result<()> {
        if self.comm.rank() == 0 {
            writeln!(out, "dim = {};", self.dim)?;
            writeln!(out, "clusters = {};", self.k)?;
            write!(out, "dataset = [ ")?;
            let mut first = true;
            for pt in &self.shard {
                if !first {
                    write!(out, ";\n")?;
                }
                write!(out, "{}", pt)?;
                first = false;
            }
            for peer in 1..self.comm.size() {
                let share = self.comm.recv_i64s(peer)[0];
                for _ in 0..share {
                    let pt = self.comm.recv_point(peer);
                    write!(out, ";\n{}", pt)?;
                }
            }
            write!(out, "];")?;
        } else {
            self.comm.send_i64s(0, &[self.shard.len() as i64]);
            for pt in &self.shard {
                self.comm.send_point(0, pt);
            }
        }
        Ok(())
    }
}

/// Index of the centroid nearest to `coords` under `metric`. Ties are
/// broken by the first encountered minimum: strict `<`, ascending index.
pub(crate) fn nearest_centroid<T: Primitive>(
    coords: &[T], centroids: &[Point<T>], metric: &impl DistanceFunction<T>,
) -> usize {
    let mut best = metric.distance(coords, centroids[0].coords());
    let mut best_idx = 0;
    for (kk, centroid) in centroids.iter().enumerate().skip(1) {
        let d = metric.distance(coords, centroid.coords());
        if d < best {
            best = d;
            best_idx = kk;
        }
    }
    best_idx
}
