//! Bounded-memory approximate summaries with mergeable state.
//!
//! Every sketch here has a fixed memory budget and a documented error bound,
//! and supports a `merge` that is safe to apply in any pairing order:
//!
//! | Sketch | Summarizes | Guarantee |
//! |---|---|---|
//! | [`RunningMoments`] | mean, variance | numerically stable, bit-identical under operand swap |
//! | [`KllSketch`] | value distribution | normalized rank error ≈ 2.446 / k^0.9433 |
//! | [`TopKSketch`] | frequent values | undercount ≤ total / (capacity + 1) |
//! | [`DistinctSketch`] | distinct count | exact below k, then ≈ 1/√(k−2) relative error |

pub mod distinct;
pub mod kll_sketch;
pub mod moments;
pub mod top_k;

pub use distinct::DistinctSketch;
pub use kll_sketch::KllSketch;
pub use moments::RunningMoments;
pub use top_k::TopKSketch;
