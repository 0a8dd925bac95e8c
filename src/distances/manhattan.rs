use crate::{DistanceFunction, Primitive};

/// Manhattan (p = 1) distance: sum of absolute coordinate differences.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manhattan;

impl<T: Primitive> DistanceFunction<T> for Manhattan {
    #[inline(always)]
    fn distance(&self, a: &[T], b: &[T]) -> T {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter())
            .map(|(&av, &bv)| (av - bv).abs())
            .sum()
    }
}
