use crate::Primitive;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Sub};

/// Sentinel for a label that has not been assigned yet.
pub const UNSET_LABEL: i64 = -1;

/// A single sample of the dataset: a fixed-dimension coordinate vector, the
/// cluster label it is currently assigned to, and an optional ground-truth
/// label (only used by the purity evaluation).
///
/// Points are value types. Componentwise arithmetic is only defined between
/// points of equal dimension; mixing dimensions is a programmer error and
/// fails the assertion instead of truncating.
#[derive(Clone, Debug, PartialEq)]
pub struct Point<T: Primitive> {
    coords: Vec<T>,
    label: i64,
    true_label: i64,
}

impl<T: Primitive> Point<T> {
    /// Create an all-zero point of the given dimension.
    pub fn zero(dim: usize) -> Self {
        Self { coords: vec![T::zero(); dim], label: UNSET_LABEL, true_label: UNSET_LABEL }
    }

    /// Create a point from its coordinates.
    pub fn new(coords: Vec<T>) -> Self {
        Self { coords, label: UNSET_LABEL, true_label: UNSET_LABEL }
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[T] {
        &self.coords
    }

    pub fn label(&self) -> i64 {
        self.label
    }

    pub fn set_label(&mut self, label: i64) {
        self.label = label;
    }

    pub fn true_label(&self) -> i64 {
        self.true_label
    }

    pub fn set_true_label(&mut self, label: i64) {
        self.true_label = label;
    }
}

/// Squared euclidean distance between two points.
///
/// This is the fixed yardstick used for centroid displacement, independently
/// of the metric configured for cluster assignment.
pub fn dist2<T: Primitive>(a: &Point<T>, b: &Point<T>) -> T {
    assert_eq!(a.dim(), b.dim(), "dist2 between points of dimension {} and {}", a.dim(), b.dim());
    a.coords.iter().zip(b.coords.iter())
        .map(|(&av, &bv)| av - bv)
        .map(|d| d * d)
        .sum()
}

impl<T: Primitive> Index<usize> for Point<T> {
    type Output = T;
    fn index(&self, idx: usize) -> &T {
        &self.coords[idx]
    }
}
impl<T: Primitive> IndexMut<usize> for Point<T> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.coords[idx]
    }
}

impl<T: Primitive> Add for &Point<T> {
    type Output = Point<T>;
    fn add(self, other: &Point<T>) -> Point<T> {
        assert_eq!(self.dim(), other.dim(), "adding points of dimension {} and {}", self.dim(), other.dim());
        Point::new(self.coords.iter().zip(other.coords.iter()).map(|(&a, &b)| a + b).collect())
    }
}

impl<T: Primitive> Sub for &Point<T> {
    type Output = Point<T>;
    fn sub(self, other: &Point<T>) -> Point<T> {
        assert_eq!(self.dim(), other.dim(), "subtracting points of dimension {} and {}", self.dim(), other.dim());
        Point::new(self.coords.iter().zip(other.coords.iter()).map(|(&a, &b)| a - b).collect())
    }
}

impl<T: Primitive> AddAssign<&Point<T>> for Point<T> {
    fn add_assign(&mut self, other: &Point<T>) {
        assert_eq!(self.dim(), other.dim(), "adding points of dimension {} and {}", self.dim(), other.dim());
        self.coords.iter_mut().zip(other.coords.iter()).for_each(|(a, &b)| *a += b);
    }
}

impl<T: Primitive> Div<T> for &Point<T> {
    type Output = Point<T>;
    fn div(self, divisor: T) -> Point<T> {
        Point::new(self.coords.iter().map(|&c| c / divisor).collect())
    }
}

/// Output format: `<label> <coord 0> <coord 1> ... <coord n-1>` on one line.
impl<T: Primitive> fmt::Display for Point<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        for c in &self.coords {
            write!(f, " {}", c)?;
        }
        Ok(())
    }
}

/// An ordered sequence of equal-dimension points, as produced by the loader.
#[derive(Clone, Debug)]
pub struct Dataset<T: Primitive> {
    pub dim: usize,
    pub points: Vec<Point<T>>,
}

impl<T: Primitive> Dataset<T> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
