//! Interval bounds built from pairs of directed operations
pub mod arithmetic;
pub mod value;

pub use value::{ErrorFlags, Interval, IntervalClass, classify};
