//! Action distributions over batched policy outputs
//!
//! The policy network emits distribution parameters; this module turns them
//! into samples, log probabilities, entropies and KL divergences. Two
//! families are supported:
//!
//! - `Categorical`: parameters are probability rows `[B, n_actions]`
//! - `Gaussian`: parameters are means `[B, action_dim]` with one fixed
//!   standard deviation shared by every dimension
//!
//! Every per-sample quantity is returned with shape `[B]`. Gaussian terms are
//! summed over action dimensions (independent dimensions).

use tch::{Kind, Tensor};

use crate::env::{SpaceInfo, SpaceType};

/// Lower bound applied to probabilities before taking their logarithm
const PROB_EPS: f64 = 1e-8;

/// `ln(2π)`
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Distribution family, picked once from the action space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionDistribution {
    /// Discrete actions, parameters are probabilities
    Categorical,

    /// Continuous actions, parameters are means
    Gaussian {
        /// Standard deviation of every action dimension
        std: f64,
    },
}

impl ActionDistribution {
    /// Select the family matching `action_space`
    pub fn for_space(action_space: &SpaceInfo, std: f64) -> Self {
        match action_space.space_type {
            SpaceType::Discrete(_) => ActionDistribution::Categorical,
            SpaceType::Continuous => ActionDistribution::Gaussian { std },
        }
    }

    /// Draw one action per row
    ///
    /// Categorical samples are `Int64` indices `[B]`; Gaussian samples are
    /// `[B, action_dim]`.
    pub fn sample(&self, params: &Tensor) -> Tensor {
        match *self {
            ActionDistribution::Categorical => params.multinomial(1, true).squeeze_dim(-1),
            ActionDistribution::Gaussian { std } => params + params.randn_like() * std,
        }
    }

    /// Most likely action per row: arg-max index or the mean
    pub fn deterministic(&self, params: &Tensor) -> Tensor {
        match self {
            ActionDistribution::Categorical => params.argmax(-1, false),
            ActionDistribution::Gaussian { .. } => params.shallow_clone(),
        }
    }

    /// Log probability of `actions` under `params`
    ///
    /// Categorical actions may be given as indices of any numeric kind,
    /// shaped `[B]` or `[B, 1]`.
    pub fn log_prob(&self, params: &Tensor, actions: &Tensor) -> Tensor {
        match *self {
            ActionDistribution::Categorical => {
                let index = actions.reshape([-1, 1]).to_kind(Kind::Int64);
                params.clamp_min(PROB_EPS).log().gather(-1, &index, false).squeeze_dim(-1)
            }
            ActionDistribution::Gaussian { std } => {
                let per_dim = (actions - params).square() / (-2.0 * std * std) - std.ln() - 0.5 * LN_2PI;
                per_dim.sum_dim_intlist(-1, false, Kind::Float)
            }
        }
    }

    /// Entropy of each row
    pub fn entropy(&self, params: &Tensor) -> Tensor {
        match *self {
            ActionDistribution::Categorical => {
                let log_p = params.clamp_min(PROB_EPS).log();
                -(params * log_p).sum_dim_intlist(-1, false, Kind::Float)
            }
            ActionDistribution::Gaussian { std } => {
                let size = params.size();
                let action_dim = size.last().copied().unwrap_or(1) as f64;
                let per_row = action_dim * (0.5 + 0.5 * LN_2PI + std.ln());
                Tensor::full([size[0]], per_row, (Kind::Float, params.device()))
            }
        }
    }

    /// `KL(p || q)` for each row
    ///
    /// Both Gaussians share the configured standard deviation, so only the
    /// mean term survives.
    pub fn kl_divergence(&self, p: &Tensor, q: &Tensor) -> Tensor {
        match *self {
            ActionDistribution::Categorical => {
                let log_p = p.clamp_min(PROB_EPS).log();
                let log_q = q.clamp_min(PROB_EPS).log();
                (p * (log_p - log_q)).sum_dim_intlist(-1, false, Kind::Float)
            }
            ActionDistribution::Gaussian { std } => {
                ((p - q).square() / (2.0 * std * std)).sum_dim_intlist(-1, false, Kind::Float)
            }
        }
    }
}
