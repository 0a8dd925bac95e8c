mod euclidean;
mod manhattan;

pub use euclidean::SquaredEuclidean;
pub use manhattan::Manhattan;

use crate::Primitive;

/// Strategy used by the assignment engine to compare a sample against the
/// centroid set. Injected into the solver as a generic parameter; the
/// default is [`SquaredEuclidean`].
///
/// Implementations only need to preserve the ordering of distances, not
/// report a true norm. [`SquaredEuclidean`] skips the final square root for
/// that reason.
pub trait DistanceFunction<T: Primitive>: Send + Sync {
    fn distance(&self, a: &[T], b: &[T]) -> T;
}
