//! Numeric helpers shared by the training code

pub mod normalize;
pub mod tensor;

pub use normalize::normalize_advantages;
