//! Multi-worker end-to-end properties, driven through the public API only.

use dkmeans::{comm, io, Algorithm, Communicator, Solver, StopCriterion};

const SIX_POINTS: &str = "2\n0 0\n0 1\n1 0\n10 10\n10 11\n11 10\n";

fn six_points() -> dkmeans::Dataset<f64> {
    io::read_dataset(SIX_POINTS.as_bytes()).unwrap()
}

fn batch_labels(workers: usize, k: usize) -> Vec<i64> {
    let data = six_points();
    comm::run::<f64, _, _>(workers, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
        solver.set_k(k).unwrap();
        solver.solve();
        solver.local_points().iter().map(|p| p.label()).collect::<Vec<_>>()
    })
    .into_iter()
    .flatten()
    .collect()
}

#[test]
fn batch_result_is_worker_count_invariant() {
    let reference = batch_labels(1, 2);
    for workers in [2usize, 3, 4, 6] {
        assert_eq!(batch_labels(workers, 2), reference, "workers = {}", workers);
    }
}

#[test]
fn more_workers_than_points_is_legal() {
    // 8 workers over 6 points: two workers idle through every collective
    let labels = batch_labels(8, 2);
    assert_eq!(labels.len(), 6);
    assert_eq!(labels, batch_labels(1, 2));
}

#[test]
fn sequential_run_is_deterministic() {
    let data = six_points();
    let run = || {
        let mut solver =
            Solver::new(Communicator::single(), &data, Algorithm::Sequential).unwrap();
        solver.set_k(3).unwrap();
        solver.solve();
        let labels: Vec<i64> = solver.local_points().iter().map(|p| p.label()).collect();
        (labels, solver.iterations())
    };
    assert_eq!(run(), run());
}

#[test]
fn k_equals_n_ends_with_each_point_its_own_cluster() {
    let data = six_points();
    let results = comm::run::<f64, _, _>(3, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
        solver.set_k(6).unwrap();
        solver.solve();
        (solver.iterations(), (0..6).map(|kk| solver.cluster_count(kk)).collect::<Vec<_>>())
    });
    for (iterations, counts) in results {
        assert!(iterations <= 1000);
        assert_eq!(counts, vec![1; 6]);
    }
}

#[test]
fn purity_round_trip_over_workers() {
    let data = six_points();
    let truth: Vec<i64> = batch_labels(3, 2).iter().map(|&l| l + 1).collect();
    let purities = comm::run::<f64, _, _>(3, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
        solver.set_k(2).unwrap();
        solver.set_true_labels(&truth, -1).unwrap();
        solver.solve();
        solver.purity().unwrap()
    });
    for p in purities {
        assert!((p - 1.0).abs() < 1e-12);
    }
}

#[test]
fn displacement_criterion_applies_across_workers() {
    let data = six_points();
    let iterations = comm::run::<f64, _, _>(2, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
        solver.set_k(2).unwrap();
        // displacement-only stopping; generous threshold forces a stop as
        // soon as the centroids settle
        solver.set_stop(StopCriterion::new(1000, 1e-9, -1));
        solver.solve();
        solver.iterations()
    });
    assert_eq!(iterations[0], iterations[1]);
    assert!(iterations[0] < 1000);
}

#[test]
fn minibatch_converges_over_workers() {
    let data = six_points();
    let results = comm::run::<f64, _, _>(3, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::MiniBatch).unwrap();
        solver.set_k(2).unwrap();
        solver.set_batch_size(12);
        solver.solve();
        (
            solver.local_points().iter().map(|p| p.label()).collect::<Vec<_>>(),
            solver.cluster_count(0) + solver.cluster_count(1),
        )
    });
    let mut labels = Vec::new();
    for (local, total) in results {
        assert_eq!(total, 6);
        labels.extend(local);
    }
    assert!(labels.iter().all(|&l| l == 0 || l == 1));
}

#[test]
fn output_collects_all_shards_in_order() {
    let data = six_points();
    let outputs = comm::run::<f64, _, _>(3, |c| {
        let mut solver = Solver::new(c, &data, Algorithm::Batch).unwrap();
        solver.set_k(2).unwrap();
        solver.solve();
        let mut buf = Vec::new();
        solver.write_output(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    });
    // only worker 0 writes; the others stream their shards to it
    assert!(outputs[1].is_empty());
    assert!(outputs[2].is_empty());
    let text = &outputs[0];
    assert!(text.starts_with("dim = 2;\nclusters = 2;\ndataset = [ "));
    assert!(text.ends_with("];"));
    assert_eq!(text.matches(';').count(), 2 + 6);
    // shards appear in dataset order: coordinates of the first and last point
    let body = text.split('[').nth(1).unwrap();
    let rows: Vec<&str> = body.trim_end_matches("];").split(";\n").collect();
    assert_eq!(rows.len(), 6);
    assert!(rows[0].trim_start().ends_with("0 0"));
    assert!(rows[5].ends_with("11 10"));
}
