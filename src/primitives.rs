use num::{Float, NumCast, Zero};
use rand::distributions::uniform::SampleUniform;
use std::{
    fmt::{Debug, Display},
    iter::Sum,
    ops::{Add, AddAssign, Div, DivAssign, Sub, SubAssign},
};

/// Trait-bound for the floating-point primitive all calculations are done with.
/// Implemented for [`f32`] and [`f64`].
pub trait Primitive:
    Add<Output = Self> + AddAssign + Sum + Sub<Output = Self> + SubAssign
    + Div<Output = Self> + DivAssign + Zero + Float + NumCast + SampleUniform
    + PartialOrd + Copy + Default + Display + Debug + Sync + Send + 'static
{
}
impl Primitive for f32 {}
impl Primitive for f64 {}
