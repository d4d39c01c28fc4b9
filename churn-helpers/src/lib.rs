use ndarray::{NdFloat, ScalarOperand};

use num_traits::{AsPrimitive, FromPrimitive, NumCast, Signed};
use rand::distr::uniform::SampleUniform;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

mod common;
mod distance;

pub use common::{group_by_label, DataPoint};
pub use distance::{Distance, L2Dist};

/// Numeric bound shared by every algorithm crate in the workspace.
pub trait Float:
    NdFloat
    + FromPrimitive
    + Default
    + Signed
    + Sum
    + AsPrimitive<usize>
    + for<'a> AddAssign<&'a Self>
    + for<'a> MulAssign<&'a Self>
    + for<'a> SubAssign<&'a Self>
    + for<'a> DivAssign<&'a Self>
    + num_traits::MulAdd<Output = Self>
    + SampleUniform
    + ScalarOperand
    + std::marker::Unpin
{
    fn cast<T: NumCast>(x: T) -> Option<Self> {
        NumCast::from(x)
    }

    /// Converts an `f64` constant (learning rates, thresholds) into `Self`.
    fn from_f64_lossy(x: f64) -> Self;

    /// Converts a count into `Self`, e.g. for averaging.
    fn from_count(n: usize) -> Self;
}

impl Float for f32 {
    fn from_f64_lossy(x: f64) -> Self {
        x as f32
    }

    fn from_count(n: usize) -> Self {
        n as f32
    }
}

impl Float for f64 {
    fn from_f64_lossy(x: f64) -> Self {
        x
    }

    fn from_count(n: usize) -> Self {
        n as f64
    }
}

/// The seeded generator every algorithm uses when it is handed a seed.
pub fn seeded_rng(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}
