//! PPG configuration and hyperparameters
//!
//! This module defines the configuration parameters for phasic training
//! and provides validation, JSON loading and builder pattern methods.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tch::Device;

/// PPG configuration parameters
///
/// One immutable block handed to the agent and the runner. Defaults follow
/// the usual Truly-PPO settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPGConfig {
    /// Adam learning rate for both networks
    pub learning_rate: f64,

    /// Passes over a buffer per phase
    pub ppo_epochs: usize,

    /// Minibatch size
    pub batch_size: usize,

    /// Discount factor
    pub gamma: f64,

    /// GAE lambda
    pub lam: f64,

    /// Trust-region radius on KL(old || current)
    pub policy_kl_range: f64,

    /// Rollback penalty coefficient
    pub policy_params: f64,

    /// Value clipping radius, `None` disables clipping
    pub value_clip: Option<f64>,

    /// Critic loss coefficient
    pub vf_loss_coef: f64,

    /// Entropy bonus coefficient
    pub entropy_coef: f64,

    /// Global steps between policy phases
    pub n_update: usize,

    /// Policy phases between auxiliary phases
    pub n_aux_update: usize,

    /// Fixed standard deviation of the Gaussian policy
    pub action_std: f64,

    /// Scale applied to clipped continuous actions before they reach the
    /// environment
    pub max_action: f32,

    /// Global gradient norm bound, `None` disables clipping
    pub max_grad_norm: Option<f64>,

    /// Sample actions (true) or act greedily (false)
    pub training_mode: bool,

    /// Seed for libtorch's generator
    pub seed: Option<i64>,

    /// Place networks on CUDA when available
    pub use_cuda: bool,
}

impl Default for PPGConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            ppo_epochs: 10,
            batch_size: 32,
            gamma: 0.99,
            lam: 0.95,
            policy_kl_range: 0.03,
            policy_params: 5.0,
            value_clip: Some(5.0),
            vf_loss_coef: 1.0,
            entropy_coef: 0.0,
            n_update: 1024,
            n_aux_update: 5,
            action_std: 1.0,
            max_action: 1.0,
            max_grad_norm: None,
            training_mode: true,
            seed: None,
            use_cuda: false,
        }
    }
}

impl PPGConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file and validate it
    ///
    /// Missing fields take their default value.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Device the networks should live on
    pub fn device(&self) -> Device {
        if self.use_cuda { Device::cuda_if_available() } else { Device::Cpu }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(anyhow!("learning_rate must be positive"));
        }
        if self.ppo_epochs == 0 {
            return Err(anyhow!("ppo_epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be positive"));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(anyhow!("gamma must be in (0, 1]"));
        }
        if !(self.lam > 0.0 && self.lam <= 1.0) {
            return Err(anyhow!("lam must be in (0, 1]"));
        }
        if self.policy_kl_range < 0.0 {
            return Err(anyhow!("policy_kl_range must be non-negative"));
        }
        if self.policy_params < 0.0 {
            return Err(anyhow!("policy_params must be non-negative"));
        }
        if let Some(clip) = self.value_clip
            && clip <= 0.0
        {
            return Err(anyhow!("value_clip must be positive when set"));
        }
        if self.vf_loss_coef < 0.0 {
            return Err(anyhow!("vf_loss_coef must be non-negative"));
        }
        if self.entropy_coef < 0.0 {
            return Err(anyhow!("entropy_coef must be non-negative"));
        }
        if self.n_update == 0 {
            return Err(anyhow!("n_update must be positive"));
        }
        if self.n_aux_update == 0 {
            return Err(anyhow!("n_aux_update must be positive"));
        }
        if self.action_std <= 0.0 {
            return Err(anyhow!("action_std must be positive"));
        }
        if self.max_action <= 0.0 {
            return Err(anyhow!("max_action must be positive"));
        }
        if let Some(norm) = self.max_grad_norm
            && norm <= 0.0
        {
            return Err(anyhow!("max_grad_norm must be positive when set"));
        }
        Ok(())
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set number of passes per phase
    pub fn ppo_epochs(mut self, epochs: usize) -> Self {
        self.ppo_epochs = epochs;
        self
    }

    /// Set minibatch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn lam(mut self, lam: f64) -> Self {
        self.lam = lam;
        self
    }

    /// Set trust-region radius
    pub fn policy_kl_range(mut self, range: f64) -> Self {
        self.policy_kl_range = range;
        self
    }

    /// Set rollback penalty coefficient
    pub fn policy_params(mut self, params: f64) -> Self {
        self.policy_params = params;
        self
    }

    /// Set value clipping radius (`None` disables it)
    pub fn value_clip(mut self, clip: Option<f64>) -> Self {
        self.value_clip = clip;
        self
    }

    /// Set critic loss coefficient
    pub fn vf_loss_coef(mut self, coef: f64) -> Self {
        self.vf_loss_coef = coef;
        self
    }

    /// Set entropy bonus coefficient
    pub fn entropy_coef(mut self, coef: f64) -> Self {
        self.entropy_coef = coef;
        self
    }

    /// Set steps between policy phases
    pub fn n_update(mut self, steps: usize) -> Self {
        self.n_update = steps;
        self
    }

    /// Set policy phases between auxiliary phases
    pub fn n_aux_update(mut self, phases: usize) -> Self {
        self.n_aux_update = phases;
        self
    }

    /// Set Gaussian standard deviation
    pub fn action_std(mut self, std: f64) -> Self {
        self.action_std = std;
        self
    }

    /// Set continuous action scale
    pub fn max_action(mut self, max_action: f32) -> Self {
        self.max_action = max_action;
        self
    }

    /// Set gradient norm bound
    pub fn max_grad_norm(mut self, norm: Option<f64>) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Choose sampling (true) or greedy (false) action selection
    pub fn training_mode(mut self, training: bool) -> Self {
        self.training_mode = training;
        self
    }

    /// Set libtorch seed
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Request CUDA placement
    pub fn use_cuda(mut self, use_cuda: bool) -> Self {
        self.use_cuda = use_cuda;
        self
    }
}
