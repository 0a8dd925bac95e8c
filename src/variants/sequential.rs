use crate::solver::nearest_centroid;
use crate::{DistanceFunction, Primitive, Solver};
use log::debug;

/// Single-worker Lloyd iteration, written as plain loops.
///
/// The reference implementation the distributed strategies are validated
/// and timed against: no thread pool, no communicator traffic (the size-1
/// collectives inside `compute_centroids` degenerate to local work).
pub(crate) fn solve<T: Primitive, D: DistanceFunction<T>>(solver: &mut Solver<T, D>) {
    let mut changes = solver.stop.min_label_changes.max(0) + 1;
    let mut displacement = solver.stop.min_centroid_displacement + T::one();

    while solver.stop.should_continue(solver.iterations, changes, displacement) {
        let previous = solver.stop.displacement_enabled().then(|| solver.centroids.clone());

        changes = 0;
        for i in 0..solver.shard.len() {
            let best = nearest_centroid(
                solver.shard[i].coords(), &solver.centroids, &solver.metric,
            ) as i64;
            let old = solver.shard[i].label();
            if old != best {
                solver.counts[old as usize] -= 1;
                solver.counts[best as usize] += 1;
                solver.shard[i].set_label(best);
                changes += 1;
            }
        }

        solver.compute_centroids();
        if let Some(previous) = previous {
            displacement = solver.displacement(&previous);
        }
        solver.iterations += 1;

        debug!(
            "iteration {}: {} label changes, displacement {}",
            solver.iterations, changes, displacement
        );
    }
}
