//! Training statistics for the two phases
//!
//! Each minibatch produces one record; a phase sums them and reports the
//! average.

use std::ops::AddAssign;

/// Statistics from policy-phase minibatches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyPhaseStats {
    /// Total Truly-PPO loss
    pub total_loss: f64,

    /// Mean surrogate objective (maximized)
    pub surrogate: f64,

    /// Critic loss before its coefficient
    pub critic_loss: f64,

    /// Mean entropy of the current policy
    pub entropy: f64,

    /// Mean KL(old || current)
    pub kl: f64,

    /// Fraction of samples that took the rollback branch
    pub rollback_fraction: f64,

    /// Number of gradient updates performed
    pub num_updates: usize,
}

impl PolicyPhaseStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Add another statistics instance to this one
    pub fn add(&mut self, other: &PolicyPhaseStats) {
        self.total_loss += other.total_loss;
        self.surrogate += other.surrogate;
        self.critic_loss += other.critic_loss;
        self.entropy += other.entropy;
        self.kl += other.kl;
        self.rollback_fraction += other.rollback_fraction;
        self.num_updates += other.num_updates;
    }

    /// Compute average statistics across multiple updates
    pub fn average(&self) -> Self {
        let scale = self.num_updates as f64;
        if scale == 0.0 {
            return Self::zeros();
        }

        Self {
            total_loss: self.total_loss / scale,
            surrogate: self.surrogate / scale,
            critic_loss: self.critic_loss / scale,
            entropy: self.entropy / scale,
            kl: self.kl / scale,
            rollback_fraction: self.rollback_fraction / scale,
            num_updates: 1,
        }
    }
}

impl AddAssign<&PolicyPhaseStats> for PolicyPhaseStats {
    fn add_assign(&mut self, other: &PolicyPhaseStats) {
        self.add(other);
    }
}

/// Statistics from auxiliary-phase minibatches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxPhaseStats {
    /// Joint loss (value regression + KL)
    pub joint_loss: f64,

    /// Auxiliary value regression loss
    pub value_loss: f64,

    /// Mean KL(old || current)
    pub kl: f64,

    pub num_updates: usize,
}

impl AuxPhaseStats {
    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &AuxPhaseStats) {
        self.joint_loss += other.joint_loss;
        self.value_loss += other.value_loss;
        self.kl += other.kl;
        self.num_updates += other.num_updates;
    }

    pub fn average(&self) -> Self {
        let scale = self.num_updates as f64;
        if scale == 0.0 {
            return Self::zeros();
        }

        Self {
            joint_loss: self.joint_loss / scale,
            value_loss: self.value_loss / scale,
            kl: self.kl / scale,
            num_updates: 1,
        }
    }
}

impl AddAssign<&AuxPhaseStats> for AuxPhaseStats {
    fn add_assign(&mut self, other: &AuxPhaseStats) {
        self.add(other);
    }
}
