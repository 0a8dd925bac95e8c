use crate::{DistanceFunction, Primitive, Solver};
use log::debug;

/// Distributed full-batch Lloyd iteration.
///
/// Every round reassigns the whole shard in parallel, runs the full centroid
/// recompute (two sum reductions inside `compute_centroids`), then reconciles
/// the round statistics: label changes are sum-reduced and the centroid
/// displacement max-reduced, so every worker evaluates the stopping criterion
/// on identical values and the workers leave the loop in the same round.
pub(crate) fn solve<T: Primitive, D: DistanceFunction<T>>(solver: &mut Solver<T, D>) {
    let mut changes = solver.stop.min_label_changes.max(0) + 1;
    let mut displacement = solver.stop.min_centroid_displacement + T::one();

    while solver.stop.should_continue(solver.iterations, changes, displacement) {
        let previous = solver.stop.displacement_enabled().then(|| solver.centroids.clone());

        let local_changes = solver.update_assignments();
        solver.compute_centroids();

        let mut buf = [local_changes];
        solver.comm.all_reduce_sum_i64(&mut buf);
        changes = buf[0];

        if let Some(previous) = previous {
            displacement = solver.comm.all_reduce_max(solver.displacement(&previous));
        }
        solver.iterations += 1;

        if solver.comm.rank() == 0 {
            debug!(
                "iteration {}: {} label changes, displacement {}",
                solver.iterations, changes, displacement
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{comm, Algorithm, Communicator, Dataset, Point, Solver};

    fn two_blobs() -> Dataset<f64> {
        // integer coordinates: every reduction is exact, so results are
        // bit-identical for any worker count
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

    fn solve_with(workers: usize, data: &Dataset<f64>) -> (Vec<i64>, Vec<Vec<f64>>, usize) {
        let results = comm::run::<f64, _, _>(workers, |c| {
            let mut solver = Solver::new(c, data, Algorithm::Batch).unwrap();
            solver.set_k(2).unwrap();
            solver.solve();
            let labels: Vec<i64> = solver.local_points().iter().map(|p| p.label()).collect();
            let centroids: Vec<Vec<f64>> =
                solver.centroids().iter().map(|c| c.coords().to_vec()).collect();
            (labels, centroids, solver.iterations())
        });
        let mut labels = Vec::new();
        let mut per_worker = Vec::new();
        for (l, c, i) in results {
            labels.extend(l);
            per_worker.push((c, i));
        }
        // replicated state must be bit-for-bit identical on every worker
        for (rank, worker) in per_worker.iter().enumerate() {
            assert_eq!(worker, &per_worker[0], "rank {} diverged", rank);
        }
        let (centroids, iterations) = per_worker.swap_remove(0);
        (labels, centroids, iterations)
    }

    #[test]
    fn result_is_invariant_under_the_worker_count() {
        let data = two_blobs();
        let reference = solve_with(1, &data);
        for workers in [2usize, 3, 4] {
            assert_eq!(solve_with(workers, &data), reference, "workers = {}", workers);
        }
    }

    #[test]
    fn two_blobs_end_up_in_two_clusters() {
        let data = two_blobs();
        let (labels, _, iterations) = solve_with(3, &data);
        assert!(iterations < 1000, "no convergence within the cap");
        // first three points together, last three together, different labels
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn rounds_never_increase_the_distortion() {
        let data = two_blobs();
        let mut solver = Solver::new(Communicator::single(), &data, Algorithm::Batch).unwrap();
        solver.set_k(2).unwrap();
        // deliberately bad split: both clusters straddle the blobs
        for (i, pt) in solver.shard.iter_mut().enumerate() {
            let label = (i % 2) as i64;
            pt.set_label(label);
            solver.counts[label as usize] += 1;
        }
        solver.compute_centroids();
        let mut previous = solver.distortion();
        for round in 0..10 {
            solver.update_assignments();
            solver.compute_centroids();
            let current = solver.distortion();
            assert!(
                current <= previous + 1e-12,
                "distortion rose from {} to {} in round {}",
                previous, current, round
            );
            previous = current;
        }
    }

    #[test]
    fn distortion_beats_the_one_cluster_baseline() {
        let data = two_blobs();
        let distortions = comm::run::<f64, _, _>(2, |c| {
            let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
            solver.set_k(2).unwrap();
            solver.solve();
            solver.distortion()
        });
        // squared distance sum of all six points to the global mean
        let baseline = 2724.0 / 9.0;
        for d in distortions {
            assert!(d < baseline, "distortion {} not below {}", d, baseline);
        }
    }

    #[test]
    fn purity_round_trip_is_perfect() {
        let data = two_blobs();
        let (labels, _, _) = solve_with(2, &data);
        // feed the converged labels back as 1-based ground truth
        let truth: Vec<i64> = labels.iter().map(|&l| l + 1).collect();

        let purities = comm::run::<f64, _, _>(2, |c| {
            let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
            solver.set_k(2).unwrap();
            solver.set_true_labels(&truth, -1).unwrap();
            solver.solve();
            solver.purity().unwrap()
        });
        for p in purities {
            assert_approx_eq!(p, 1.0f64);
        }
    }
}
