//! Outlier analysis math utilities.

pub mod math;

pub use math::chi_square::*;
pub use math::gamma::*;
pub use math::stable::*;
