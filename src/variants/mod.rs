//! The iteration protocols behind [`crate::Solver::solve`].
//!
//! Each variant is a free function driving the shared solver state. All of
//! them start from the same randomized labels and initial centroids (the
//! solver primes those before dispatching) and differ only in how a round
//! reassigns points, updates centroids, and decides to stop.

pub(crate) mod batch;
pub(crate) mod minibatch;
pub(crate) mod sequential;
