//! Advantage standardization
//!
//! Advantages are shifted to zero mean and scaled by their population standard
//! deviation before they enter the surrogate objective. The epsilon keeps a
//! constant batch (zero variance) finite.

use tch::{Kind, Tensor};

/// Added to the standard deviation before dividing
pub const ADVANTAGE_EPS: f64 = 1e-6;

/// `(a - mean(a)) / (std(a) + 1e-6)`, detached from the graph
///
/// Uses the population standard deviation so a single-sample batch maps to
/// zero rather than NaN.
pub fn normalize_advantages(advantages: &Tensor) -> Tensor {
    let advantages = advantages.detach();
    let mean = advantages.mean(Kind::Float);
    let std = advantages.std(false);
    ((&advantages - mean) / (std + ADVANTAGE_EPS)).detach()
}
