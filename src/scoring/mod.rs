//! Accuracy scoring.

pub mod normalize;
pub mod similarity;

pub use self::similarity::{Similarity, similarity};
