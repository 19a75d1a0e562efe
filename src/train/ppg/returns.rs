//! Discounted return and advantage estimation
//!
//! All recurrences run backward over one buffer in insertion order. A done
//! flag at step `t` cuts the bootstrap from `t + 1`, so trajectories of
//! several episodes (or several environments flushed one after another) can
//! share a buffer.

use anyhow::Result;

use crate::error::PPGError;

/// Estimator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnEstimator {
    /// Discount factor
    pub gamma: f32,

    /// GAE lambda
    pub lam: f32,
}

impl ReturnEstimator {
    pub fn new(gamma: f64, lam: f64) -> Self {
        Self { gamma: gamma as f32, lam: lam as f32 }
    }

    /// One-step target `r + (1 - done) * gamma * v(s')`
    pub fn temporal_difference(&self, reward: f32, next_value: f32, done: f32) -> f32 {
        reward + (1.0 - done) * self.gamma * next_value
    }

    /// Generalized Advantage Estimation
    ///
    /// ```text
    /// delta_t = r_t + (1 - d_t) * gamma * v'_t - v_t
    /// gae_t   = delta_t + (1 - d_t) * gamma * lam * gae_{t+1},   gae_T = 0
    /// ```
    ///
    /// `dones` holds 0.0 / 1.0 flags. All four sequences must have the same
    /// length.
    pub fn generalized_advantage_estimation(
        &self,
        values: &[f32],
        rewards: &[f32],
        next_values: &[f32],
        dones: &[f32],
    ) -> Result<Vec<f32>> {
        let len = rewards.len();
        if values.len() != len || next_values.len() != len || dones.len() != len {
            return Err(PPGError::precondition(format!(
                "GAE inputs differ in length: values {}, rewards {len}, next_values {}, dones {}",
                values.len(),
                next_values.len(),
                dones.len()
            ))
            .into());
        }

        let mut advantages = vec![0.0f32; len];
        let mut gae = 0.0f32;
        for t in (0..len).rev() {
            let not_done = 1.0 - dones[t];
            let delta = self.temporal_difference(rewards[t], next_values[t], dones[t]) - values[t];
            gae = delta + not_done * self.gamma * self.lam * gae;
            advantages[t] = gae;
        }
        Ok(advantages)
    }

    /// Monte Carlo discounted returns
    ///
    /// `ret_t = r_t + (1 - d_t) * gamma * ret_{t+1}`, with `ret_T = 0`.
    pub fn monte_carlo_discounted(&self, rewards: &[f32], dones: &[f32]) -> Result<Vec<f32>> {
        if rewards.len() != dones.len() {
            return Err(PPGError::precondition(format!(
                "{} rewards but {} done flags",
                rewards.len(),
                dones.len()
            ))
            .into());
        }

        let mut returns = vec![0.0f32; rewards.len()];
        let mut running = 0.0f32;
        for t in (0..rewards.len()).rev() {
            running = rewards[t] + (1.0 - dones[t]) * self.gamma * running;
            returns[t] = running;
        }
        Ok(returns)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_single_step_gae_is_residual() {
        let estimator = ReturnEstimator::new(0.99, 0.95);
        let adv = estimator.generalized_advantage_estimation(&[0.5], &[1.0], &[2.0], &[0.0]).unwrap();
        assert_eq!(adv, vec![1.0 + 0.99 * 2.0 - 0.5]);
    }

    #[test]
    fn test_done_cuts_the_recurrence() {
        let estimator = ReturnEstimator::new(0.9, 0.8);
        let values = [0.1, 0.2, 0.3];
        let rewards = [1.0, 2.0, 3.0];
        let next_values = [0.4, 0.5, 0.6];
        let dones = [0.0, 1.0, 0.0];

        let adv = estimator.generalized_advantage_estimation(&values, &rewards, &next_values, &dones).unwrap();

        // Step 1 ends an episode: only its own residual, no bootstrap
        assert_abs_diff_eq!(adv[1], 2.0 - 0.2, epsilon = 1e-6);

        let delta2 = 3.0 + 0.9 * 0.6 - 0.3;
        assert_abs_diff_eq!(adv[2], delta2, epsilon = 1e-6);

        let delta0 = 1.0 + 0.9 * 0.4 - 0.1;
        assert_abs_diff_eq!(adv[0], delta0 + 0.9 * 0.8 * adv[1], epsilon = 1e-6);
    }

    #[test]
    fn test_lambda_one_matches_discounted_residual_sum() {
        let estimator = ReturnEstimator::new(0.5, 1.0);
        let values = [0.0, 0.0];
        let rewards = [1.0, 1.0];
        let next_values = [0.0, 4.0];
        let dones = [0.0, 0.0];

        let adv = estimator.generalized_advantage_estimation(&values, &rewards, &next_values, &dones).unwrap();
        assert_abs_diff_eq!(adv[1], 1.0 + 0.5 * 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(adv[0], 1.0 + 0.5 * adv[1], epsilon = 1e-6);
    }

    #[test]
    fn test_monte_carlo_discounted() {
        let estimator = ReturnEstimator::new(0.5, 0.95);
        let returns = estimator.monte_carlo_discounted(&[1.0, 1.0, 1.0, 1.0], &[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(returns, vec![1.5, 1.0, 1.5, 1.0]);
    }

    #[test]
    fn test_temporal_difference() {
        let estimator = ReturnEstimator::new(0.9, 0.95);
        assert_abs_diff_eq!(estimator.temporal_difference(1.0, 10.0, 0.0), 10.0, epsilon = 1e-6);
        assert_eq!(estimator.temporal_difference(1.0, 10.0, 1.0), 1.0);
    }

    #[test]
    fn test_length_mismatch_is_precondition_violation() {
        let estimator = ReturnEstimator::new(0.99, 0.95);
        let err = estimator.generalized_advantage_estimation(&[0.0], &[1.0, 2.0], &[0.0], &[0.0]).unwrap_err();
        assert!(matches!(err.downcast_ref::<PPGError>(), Some(PPGError::PreconditionViolation(_))));

        assert!(estimator.monte_carlo_discounted(&[1.0], &[]).is_err());
    }
}
