use crate::Primitive;

/// Thresholds deciding when a running calculation stops.
///
/// Each of the three tests is independently disabled by a non-positive
/// value. The run continues while **all** enabled tests vote to continue.
/// Immutable for the lifetime of a `solve()` call.
///
/// ## Fields
/// - **max_iterations**: Hard iteration cap (`<= 0`: unlimited)
/// - **min_centroid_displacement**: Continue while the largest centroid
///   movement since the previous round is at least this euclidean distance
///   (`<= 0`: ignore displacement)
/// - **min_label_changes**: Continue while at least this many points changed
///   label in the last round (`<= 0`: ignore label changes)
#[derive(Clone, Copy, Debug)]
pub struct StopCriterion<T: Primitive> {
    pub max_iterations: i64,
    pub min_centroid_displacement: T,
    pub min_label_changes: i64,
}

impl<T: Primitive> Default for StopCriterion<T> {
    /// The reference configuration: at most 1000 iterations, stop once a
    /// round changes no label, displacement ignored.
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            min_centroid_displacement: T::from(-1).unwrap(),
            min_label_changes: 1,
        }
    }
}

impl<T: Primitive> StopCriterion<T> {
    pub fn new(max_iterations: i64, min_centroid_displacement: T, min_label_changes: i64) -> Self {
        Self { max_iterations, min_centroid_displacement, min_label_changes }
    }

    /// Pure continue/stop decision for the state at the end of a round.
    pub fn should_continue(&self, iteration: usize, label_changes: i64, displacement: T) -> bool {
        (self.max_iterations <= 0 || (iteration as i64) < self.max_iterations)
            && (self.min_label_changes <= 0 || label_changes >= self.min_label_changes)
            && (self.min_centroid_displacement <= T::zero()
                || displacement >= self.min_centroid_displacement)
    }

    pub fn displacement_enabled(&self) -> bool {
        self.min_centroid_displacement > T::zero()
    }
}

/// Consecutive-rounds stop rule for the sampling-based strategy.
///
/// A single round of a stochastic run can look converged purely through an
/// unlucky batch draw; the mini-batch protocol therefore only terminates
/// after the stop condition has held for a full streak of consecutive
/// rounds. One round voting "continue" resets the streak.
pub struct ConvergenceStreak {
    required: usize,
    stale_rounds: usize,
}

impl ConvergenceStreak {
    pub fn new(required: usize) -> Self {
        Self { required, stale_rounds: 0 }
    }

    /// Feed one round's continue/stop vote.
    /// Returns **true** once the calculation should terminate.
    pub fn observe(&mut self, would_continue: bool) -> bool {
        if would_continue {
            self.stale_rounds = 0;
        } else {
            self.stale_rounds += 1;
        }
        self.stale_rounds >= self.required
    }
}
