//! Loss functions for the policy and auxiliary phases
//!
//! - [`TrulyPpoLoss`]: the Truly-PPO objective. The ratio is never clipped;
//!   samples outside the KL trust region whose ratio moved the wrong way pay
//!   an additive KL penalty instead. Value loss is double-clipped around the
//!   old value estimate.
//! - [`JointAuxLoss`]: value distillation into the policy network's auxiliary
//!   head plus a KL anchor to the old policy.

use anyhow::Result;
use tch::{Kind, Tensor};

use super::{
    config::PPGConfig,
    returns::ReturnEstimator,
    stats::{AuxPhaseStats, PolicyPhaseStats},
};
use crate::{
    error::PPGError,
    policy::ActionDistribution,
    utils::{
        normalize_advantages,
        tensor::{scalar, to_vec_f32},
    },
};

/// Tensors for one policy-phase minibatch
///
/// Every per-sample tensor has leading dimension `B`; `rewards` and `dones`
/// (0.0 / 1.0) come straight from the buffer.
pub struct PolicyLossInputs<'a> {
    /// Current policy parameters (graph attached)
    pub action_params: &'a Tensor,

    /// Old policy parameters
    pub old_action_params: &'a Tensor,

    /// Current value estimates `[B]` (graph attached)
    pub values: &'a Tensor,

    /// Old value estimates `[B]`
    pub old_values: &'a Tensor,

    /// Current value estimates of the next states `[B]`
    pub next_values: &'a Tensor,

    /// Actions taken
    pub actions: &'a Tensor,

    pub rewards: &'a [f32],

    pub dones: &'a [f32],
}

/// Truly-PPO loss
#[derive(Debug, Clone, Copy)]
pub struct TrulyPpoLoss {
    policy_kl_range: f64,
    policy_params: f64,
    value_clip: Option<f64>,
    vf_loss_coef: f64,
    entropy_coef: f64,
    estimator: ReturnEstimator,
    distribution: ActionDistribution,
}

impl TrulyPpoLoss {
    pub fn new(config: &PPGConfig, distribution: ActionDistribution) -> Self {
        Self {
            policy_kl_range: config.policy_kl_range,
            policy_params: config.policy_params,
            value_clip: config.value_clip,
            vf_loss_coef: config.vf_loss_coef,
            entropy_coef: config.entropy_coef,
            estimator: ReturnEstimator::new(config.gamma, config.lam),
            distribution,
        }
    }

    /// Per-sample surrogate
    ///
    /// `ratio * A - policy_params * KL` where `KL >= policy_kl_range` and
    /// `ratio > 1`, `ratio * A` everywhere else.
    pub fn surrogate(&self, ratio: &Tensor, advantages: &Tensor, kl: &Tensor) -> Tensor {
        let plain = ratio * advantages;
        let rolled_back = &plain - kl * self.policy_params;
        let rollback = self.rollback_mask(ratio, kl);
        rolled_back.where_self(&rollback, &plain)
    }

    fn rollback_mask(&self, ratio: &Tensor, kl: &Tensor) -> Tensor {
        kl.ge(self.policy_kl_range).logical_and(&ratio.gt(1.0))
    }

    /// Critic loss, double-clipped around `old_values` when clipping is on
    ///
    /// ```text
    /// clipped: 0.5 * mean(max((R - v)^2, (R - (v_old + clamp(v - v_old, -c, c)))^2))
    /// plain:   0.5 * mean((R - v)^2)
    /// ```
    pub fn critic_loss(&self, values: &Tensor, old_values: &Tensor, returns: &Tensor) -> Tensor {
        let unclipped = (returns - values).square();
        match self.value_clip {
            Some(clip) => {
                let clipped_values = old_values + (values - old_values).clamp(-clip, clip);
                let clipped = (returns - clipped_values).square();
                unclipped.maximum(&clipped).mean(Kind::Float) * 0.5
            }
            None => unclipped.mean(Kind::Float) * 0.5,
        }
    }

    /// Build the scalar loss for one minibatch
    ///
    /// `total = vf_loss_coef * critic - entropy_coef * entropy - mean(surrogate)`
    ///
    /// A non-finite total is reported as [`PPGError::NumericDegeneracy`].
    pub fn compute(&self, inputs: &PolicyLossInputs<'_>) -> Result<(Tensor, PolicyPhaseStats)> {
        let dist = self.distribution;
        let device = inputs.values.device();

        let old_params = inputs.old_action_params.detach();
        let old_values = inputs.old_values.detach();
        let values_frozen = inputs.values.detach();

        let advantages = self.estimator.generalized_advantage_estimation(
            &to_vec_f32(&values_frozen)?,
            inputs.rewards,
            &to_vec_f32(inputs.next_values)?,
            inputs.dones,
        )?;
        let advantages = Tensor::from_slice(&advantages).to_device(device);
        let returns = (&advantages + &values_frozen).detach();
        let advantages = normalize_advantages(&advantages);

        let log_probs = dist.log_prob(inputs.action_params, inputs.actions);
        let old_log_probs = dist.log_prob(&old_params, inputs.actions).detach();
        let ratio = (log_probs - old_log_probs).exp();
        let kl = dist.kl_divergence(&old_params, inputs.action_params);

        let surrogate = self.surrogate(&ratio, &advantages, &kl).mean(Kind::Float);
        let entropy = dist.entropy(inputs.action_params).mean(Kind::Float);
        let critic = self.critic_loss(inputs.values, &old_values, &returns);

        let total = &critic * self.vf_loss_coef - &entropy * self.entropy_coef - &surrogate;

        let total_value = scalar(&total)?;
        if !total_value.is_finite() {
            return Err(PPGError::NumericDegeneracy(format!("policy-phase loss is {total_value}")).into());
        }

        let stats = PolicyPhaseStats {
            total_loss: total_value,
            surrogate: scalar(&surrogate)?,
            critic_loss: scalar(&critic)?,
            entropy: scalar(&entropy)?,
            kl: scalar(&kl.mean(Kind::Float))?,
            rollback_fraction: scalar(&self.rollback_mask(&ratio, &kl).to_kind(Kind::Float).mean(Kind::Float))?,
            num_updates: 1,
        };
        Ok((total, stats))
    }
}

/// Auxiliary-phase loss: `0.5 * mean((R - v_aux)^2) + mean(KL(old || current))`
#[derive(Debug, Clone, Copy)]
pub struct JointAuxLoss {
    distribution: ActionDistribution,
}

impl JointAuxLoss {
    pub fn new(distribution: ActionDistribution) -> Self {
        Self { distribution }
    }

    /// Build the scalar loss for one minibatch
    ///
    /// # Arguments
    /// * `action_params` - Current policy parameters (graph attached)
    /// * `old_action_params` - Old policy parameters
    /// * `aux_values` - Auxiliary head output `[B]` (graph attached)
    /// * `returns` - Value network targets `[B]`, treated as constants
    pub fn compute(
        &self,
        action_params: &Tensor,
        old_action_params: &Tensor,
        aux_values: &Tensor,
        returns: &Tensor,
    ) -> Result<(Tensor, AuxPhaseStats)> {
        let returns = returns.detach();
        let old_params = old_action_params.detach();

        let value_loss = (&returns - aux_values).square().mean(Kind::Float) * 0.5;
        let kl = self.distribution.kl_divergence(&old_params, action_params).mean(Kind::Float);
        let total = &value_loss + &kl;

        let total_value = scalar(&total)?;
        if !total_value.is_finite() {
            return Err(PPGError::NumericDegeneracy(format!("auxiliary-phase loss is {total_value}")).into());
        }

        let stats = AuxPhaseStats {
            joint_loss: total_value,
            value_loss: scalar(&value_loss)?,
            kl: scalar(&kl)?,
            num_updates: 1,
        };
        Ok((total, stats))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use tch::Device;

    use super::*;

    fn loss(config: PPGConfig) -> TrulyPpoLoss {
        TrulyPpoLoss::new(&config, ActionDistribution::Categorical)
    }

    fn t(values: &[f32]) -> Tensor {
        Tensor::from_slice(values)
    }

    fn first(tensor: &Tensor) -> f32 {
        to_vec_f32(tensor).unwrap()[0]
    }

    #[test]
    fn test_surrogate_inside_trust_region() {
        let l = loss(PPGConfig::new().policy_kl_range(0.03).policy_params(5.0));
        let s = l.surrogate(&t(&[1.2]), &t(&[2.0]), &t(&[0.01]));
        assert_abs_diff_eq!(first(&s), 2.4, epsilon = 1e-6);
    }

    #[test]
    fn test_surrogate_rollback_outside_trust_region() {
        let l = loss(PPGConfig::new().policy_kl_range(0.03).policy_params(5.0));
        let s = l.surrogate(&t(&[1.2]), &t(&[2.0]), &t(&[0.05]));
        assert_abs_diff_eq!(first(&s), 2.4 - 5.0 * 0.05, epsilon = 1e-6);

        // Boundary: KL exactly at the range still rolls back
        let s = l.surrogate(&t(&[1.5]), &t(&[1.0]), &t(&[0.03]));
        assert_abs_diff_eq!(first(&s), 1.5 - 5.0 * 0.03, epsilon = 1e-6);
    }

    #[test]
    fn test_surrogate_no_rollback_when_ratio_not_above_one() {
        let l = loss(PPGConfig::new().policy_kl_range(0.03).policy_params(5.0));
        let s = l.surrogate(&t(&[0.8, 1.0]), &t(&[2.0, -1.0]), &t(&[0.5, 0.5]));
        let values = to_vec_f32(&s).unwrap();
        assert_abs_diff_eq!(values[0], 1.6, epsilon = 1e-6);
        assert_abs_diff_eq!(values[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_critic_loss_double_clip() {
        let l = loss(PPGConfig::new().value_clip(Some(0.5)));
        let returns = t(&[0.0]);
        let old_values = t(&[1.0]);

        // Moved from 1.0 to 3.0: clipped 1.5 gives 2.25, unclipped 9.0 dominates
        let c = l.critic_loss(&t(&[3.0]), &old_values, &returns);
        assert_abs_diff_eq!(first(&c), 0.5 * 9.0, epsilon = 1e-6);

        // Moved from 1.0 to -1.0 past the return: clipped 0.5 gives 0.25,
        // unclipped 1.0 still dominates
        let c = l.critic_loss(&t(&[-1.0]), &old_values, &returns);
        assert_abs_diff_eq!(first(&c), 0.5 * 1.0, epsilon = 1e-6);

        // Moved from 1.0 to 0.1 towards the return: clipped 0.5 has error
        // 0.25 > 0.01, so the clipped term dominates
        let c = l.critic_loss(&t(&[0.1]), &old_values, &returns);
        assert_abs_diff_eq!(first(&c), 0.5 * 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_critic_loss_without_clip() {
        let l = loss(PPGConfig::new().value_clip(None));
        let c = l.critic_loss(&t(&[0.1, 2.0]), &t(&[1.0, 1.0]), &t(&[0.0, 0.0]));
        assert_abs_diff_eq!(first(&c), 0.5 * (0.01 + 4.0) / 2.0, epsilon = 1e-6);
    }

    fn probs(rows: &[f32]) -> Tensor {
        t(rows).reshape([-1, 2])
    }

    #[test]
    fn test_compute_constant_advantages_stay_finite() {
        let l = loss(PPGConfig::new().gamma(0.99).lam(0.95));
        let params = probs(&[0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);
        let values = t(&[0.0, 0.0, 0.0]);
        let inputs = PolicyLossInputs {
            action_params: &params,
            old_action_params: &params,
            values: &values,
            old_values: &values,
            next_values: &values,
            actions: &t(&[0.0, 1.0, 0.0]),
            rewards: &[1.0, 1.0, 1.0],
            dones: &[1.0, 1.0, 1.0],
        };

        let (total, stats) = l.compute(&inputs).unwrap();
        assert!(scalar(&total).unwrap().is_finite());
        // Identical policies: zero KL, ratio 1, normalized advantages 0
        assert_abs_diff_eq!(stats.kl, 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(stats.surrogate, 0.0, epsilon = 1e-6);
        assert_eq!(stats.rollback_fraction, 0.0);
        // Returns are all 1.0 against values of 0.0
        assert_abs_diff_eq!(stats.critic_loss, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_compute_composition() {
        let config = PPGConfig::new().vf_loss_coef(0.5).entropy_coef(0.1).value_clip(None);
        let l = loss(config);
        let params = probs(&[0.6, 0.4, 0.3, 0.7]);
        let old_params = probs(&[0.5, 0.5, 0.5, 0.5]);
        let values = t(&[0.2, -0.1]);
        let next_values = t(&[0.5, 0.0]);
        let inputs = PolicyLossInputs {
            action_params: &params,
            old_action_params: &old_params,
            values: &values,
            old_values: &values,
            next_values: &next_values,
            actions: &t(&[0.0, 1.0]),
            rewards: &[1.0, 0.0],
            dones: &[0.0, 1.0],
        };

        let (total, stats) = l.compute(&inputs).unwrap();
        let expected = 0.5 * stats.critic_loss - 0.1 * stats.entropy - stats.surrogate;
        assert_abs_diff_eq!(scalar(&total).unwrap(), expected, epsilon = 1e-5);
        assert_eq!(stats.num_updates, 1);
    }

    #[test]
    fn test_compute_propagates_gradient_to_values() {
        let l = loss(PPGConfig::new());
        let params = probs(&[0.5, 0.5, 0.5, 0.5]);
        let values = t(&[0.0, 0.0]).set_requires_grad(true);
        let inputs = PolicyLossInputs {
            action_params: &params,
            old_action_params: &params,
            values: &values,
            old_values: &values,
            next_values: &t(&[0.0, 0.0]),
            actions: &t(&[0.0, 1.0]),
            rewards: &[1.0, 2.0],
            dones: &[0.0, 0.0],
        };

        let (total, _) = l.compute(&inputs).unwrap();
        total.backward();
        let grad = to_vec_f32(&values.grad()).unwrap();
        assert!(grad.iter().all(|g| g.is_finite()));
        assert!(grad.iter().any(|g| *g != 0.0));
    }

    #[test]
    fn test_compute_reports_nan_as_numeric_degeneracy() {
        let l = loss(PPGConfig::new());
        let params = probs(&[0.5, 0.5]);
        let values = t(&[f32::NAN]);
        let inputs = PolicyLossInputs {
            action_params: &params,
            old_action_params: &params,
            values: &values,
            old_values: &values,
            next_values: &t(&[0.0]),
            actions: &t(&[0.0]),
            rewards: &[1.0],
            dones: &[0.0],
        };

        let err = l.compute(&inputs).unwrap_err();
        assert!(matches!(err.downcast_ref::<PPGError>(), Some(PPGError::NumericDegeneracy(_))));
    }

    #[test]
    fn test_compute_gaussian_rollback() {
        let config = PPGConfig::new().policy_kl_range(0.03).policy_params(5.0);
        let l = TrulyPpoLoss::new(&config, ActionDistribution::Gaussian { std: 1.0 });
        let means = t(&[0.5, 0.5, 0.5, 0.5]).reshape([2, 2]);
        let old_means = Tensor::zeros([2, 2], (Kind::Float, Device::Cpu));
        let values = t(&[0.0, 0.0]);
        // Row 0 moved towards the new mean (ratio e^0.75), row 1 away from it (ratio e^-1.25)
        let actions = t(&[1.0, 1.0, -1.0, -1.0]).reshape([2, 2]);
        let inputs = PolicyLossInputs {
            action_params: &means,
            old_action_params: &old_means,
            values: &values,
            old_values: &values,
            next_values: &values,
            actions: &actions,
            rewards: &[1.0, 0.0],
            dones: &[1.0, 1.0],
        };

        let (total, stats) = l.compute(&inputs).unwrap();

        assert!(scalar(&total).unwrap().is_finite());
        // KL summed over both dimensions: 2 * 0.5^2 / 2
        assert_abs_diff_eq!(stats.kl, 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(stats.rollback_fraction, 0.5, epsilon = 1e-9);

        // Advantages normalize to +1 / -1
        let ratio = [0.75f64.exp(), (-1.25f64).exp()];
        let surrogate = ((ratio[0] - 5.0 * 0.25) + (-ratio[1])) / 2.0;
        assert_abs_diff_eq!(stats.surrogate, surrogate, epsilon = 1e-4);
    }

    #[test]
    fn test_joint_aux_loss() {
        let aux = JointAuxLoss::new(ActionDistribution::Categorical);
        let params = probs(&[0.9, 0.1]);
        let old_params = probs(&[0.5, 0.5]);
        let aux_values = t(&[1.0]);
        let returns = t(&[3.0]);

        let (total, stats) = aux.compute(&params, &old_params, &aux_values, &returns).unwrap();

        let kl = 0.5f64 * (0.5f64 / 0.9).ln() + 0.5 * (0.5f64 / 0.1).ln();
        assert_abs_diff_eq!(stats.value_loss, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(stats.kl, kl, epsilon = 1e-5);
        assert_abs_diff_eq!(scalar(&total).unwrap(), 2.0 + kl, epsilon = 1e-5);
    }

    #[test]
    fn test_joint_aux_loss_gaussian_same_policy() {
        let aux = JointAuxLoss::new(ActionDistribution::Gaussian { std: 1.0 });
        let means = Tensor::zeros([3, 2], (Kind::Float, Device::Cpu));
        let values = t(&[1.0, 2.0, 3.0]);

        let (_, stats) = aux.compute(&means, &means, &values, &values).unwrap();
        assert_eq!(stats.kl, 0.0);
        assert_eq!(stats.value_loss, 0.0);
    }
}
