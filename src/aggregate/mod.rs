//! Aggregation, GROUP BY and DISTINCT.

mod accumulator;
mod distinct;
mod group;

pub use accumulator::Accumulator;
pub use distinct::Distinct;
pub use group::{GroupKey, Grouper};
