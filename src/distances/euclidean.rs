use crate::{DistanceFunction, Primitive};

/// Squared euclidean distance (the classic k-means metric, without the
/// order-preserving but wasted square root).
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredEuclidean;

impl<T: Primitive> DistanceFunction<T> for SquaredEuclidean {
    #[inline(always)]
    fn distance(&self, a: &[T], b: &[T]) -> T {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter())
            .map(|(&av, &bv)| av - bv)
            .map(|d| d * d)
            .sum()
    }
}
