use crate::solver::nearest_centroid;
use crate::stop::ConvergenceStreak;
use crate::{DistanceFunction, Primitive, Solver};
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Distributed mini-batch (stochastic) iteration.
///
/// Each round every worker draws its slice of the global batch uniformly
/// from its own shard, reassigns only those points, and the centroids are
/// rescaled incrementally from the reduced coordinate deltas instead of
/// being recomputed from scratch:
///
/// ```text
/// centroid = (centroid * old_count + delta) / new_count
/// ```
///
/// with both counts taken from global reductions bracketing the sampling
/// step. A round that drew an unlucky batch can look converged, so the
/// stopping criterion has to hold for a streak of consecutive rounds
/// before the run terminates.
pub(crate) fn solve<T: Primitive, D: DistanceFunction<T>>(solver: &mut Solver<T, D>) {
    let (k, dim) = (solver.k, solver.dim);
    let rank = solver.comm.rank();

    // This worker's slice of the global batch, split like the dataset.
    let batch_share = solver.batch_size / solver.comm.size()
        + usize::from(rank < solver.batch_size % solver.comm.size());
    let draws = if solver.shard.is_empty() { 0 } else { batch_share };

    let mut rng = StdRng::seed_from_u64(
        (rank as u64).wrapping_mul(10_000).wrapping_add(solver.seed),
    );
    let mut streak = ConvergenceStreak::new(solver.stable_rounds);

    let mut changes = solver.stop.min_label_changes.max(0) + 1;
    let mut displacement = solver.stop.min_centroid_displacement + T::one();

    loop {
        let continuing = solver.stop.should_continue(solver.iterations, changes, displacement);
        if streak.observe(continuing) {
            break;
        }

        let mut old_counts = solver.counts.clone();
        solver.comm.all_reduce_sum_i64(&mut old_counts);

        let mut delta = vec![T::zero(); k * dim];
        let mut local_changes = 0i64;
        for _ in 0..draws {
            let i = rng.gen_range(0..solver.shard.len());
            let best = nearest_centroid(
                solver.shard[i].coords(), &solver.centroids, &solver.metric,
            ) as i64;
            let old = solver.shard[i].label();
            if old != best {
                solver.counts[old as usize] -= 1;
                solver.counts[best as usize] += 1;
                solver.shard[i].set_label(best);
                local_changes += 1;
                let coords = solver.shard[i].coords();
                let out = &mut delta[old as usize * dim..(old as usize + 1) * dim];
                out.iter_mut().zip(coords).for_each(|(d, &c)| *d -= c);
                let inn = &mut delta[best as usize * dim..(best as usize + 1) * dim];
                inn.iter_mut().zip(coords).for_each(|(d, &c)| *d += c);
            }
        }

        let mut new_counts = solver.counts.clone();
        solver.comm.all_reduce_sum_i64(&mut new_counts);
        solver.comm.all_reduce_sum(&mut delta);

        let previous = solver.stop.displacement_enabled().then(|| solver.centroids.clone());
        for kk in 0..k {
            // A cluster the batch emptied keeps its previous centroid; it
            // can win points back in a later round.
            if new_counts[kk] > 0 {
                let old = T::from(old_counts[kk]).unwrap();
                let new = T::from(new_counts[kk]).unwrap();
                let row = &delta[kk * dim..(kk + 1) * dim];
                let centroid = &mut solver.centroids[kk];
                for n in 0..dim {
                    centroid[n] = (centroid[n] * old + row[n]) / new;
                }
            }
        }
        solver.global_counts = new_counts;

        let mut buf = [local_changes];
        solver.comm.all_reduce_sum_i64(&mut buf);
        changes = buf[0];
        if let Some(previous) = previous {
            displacement = solver.comm.all_reduce_max(solver.displacement(&previous));
        }
        solver.iterations += 1;

        if rank == 0 {
            debug!(
                "iteration {}: {} label changes, displacement {}",
                solver.iterations, changes, displacement
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{comm, Algorithm, Dataset, Point, Solver};

    fn two_blobs() -> Dataset<f64> {
        Dataset {
            dim: 2,
            points: [
                [0.0, 0.0], [0.0, 1.0], [1.0, 0.0],
                [10.0, 10.0], [10.0, 11.0], [11.0, 10.0],
            ]
            .iter()
            .map(|c| Point::new(c.to_vec()))
            .collect(),
        }
    }

    fn solve_with(workers: usize, seed: u64) -> (Vec<i64>, Vec<i64>, usize) {
        let data = two_blobs();
        let results = comm::run::<f64, _, _>(workers, |c| {
            let mut solver = Solver::new(c, &data, Algorithm::MiniBatch).unwrap();
            solver.set_k(2).unwrap();
            solver.set_seed(seed);
            solver.set_batch_size(12);
            solver.solve();
            let labels: Vec<i64> = solver.local_points().iter().map(|p| p.label()).collect();
            let counts = vec![solver.cluster_count(0), solver.cluster_count(1)];
            (labels, counts, solver.iterations())
        });
        let mut labels = Vec::new();
        let mut counts = Vec::new();
        let mut iterations = 0;
        for (l, c, i) in results {
            labels.extend(l);
            counts = c;
            iterations = i;
        }
        (labels, counts, iterations)
    }

    #[test]
    fn terminates_with_a_consistent_clustering() {
        for workers in [1usize, 2, 3] {
            let (labels, counts, _) = solve_with(workers, 0);
            assert!(labels.iter().all(|&l| l == 0 || l == 1), "workers = {}", workers);
            assert_eq!(counts.iter().sum::<i64>(), 6, "workers = {}", workers);
            let zeros = labels.iter().filter(|&&l| l == 0).count() as i64;
            assert_eq!(counts[0], zeros, "workers = {}", workers);
        }
    }

    #[test]
    fn same_seed_reproduces_the_same_run() {
        assert_eq!(solve_with(2, 42), solve_with(2, 42));
    }

    #[test]
    fn stable_clustering_ends_the_run() {
        // a converged run keeps voting "stop" every round; the streak must
        // accumulate those votes, not reset on them
        let data = two_blobs();
        let mut solver = Solver::new(crate::Communicator::single(), &data, Algorithm::MiniBatch)
            .unwrap();
        solver.set_k(2).unwrap();
        solver.set_batch_size(12);
        solver.set_stable_rounds(3);
        solver.solve();
        assert!(solver.iterations() >= 3);
        assert_eq!(solver.cluster_count(0) + solver.cluster_count(1), 6);
    }

    #[test]
    fn needs_a_streak_of_stale_rounds() {
        let data = two_blobs();
        let mut solver = Solver::new(crate::Communicator::single(), &data, Algorithm::MiniBatch)
            .unwrap();
        solver.set_k(2).unwrap();
        solver.set_batch_size(12);
        solver.set_stable_rounds(15);
        solver.solve();
        // even an instantly stable run keeps sampling until the streak is full
        assert!(solver.iterations() >= 14);
    }
}
