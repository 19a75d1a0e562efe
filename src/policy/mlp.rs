//! Multi-layer perceptron networks for the policy and the value function
//!
//! Phasic training keeps the actor and the critic in separate networks, each
//! with its own parameter set. The policy network also carries an auxiliary
//! critic head that the distillation phase trains against the value network.
//!
//! # Architecture
//!
//! ```text
//!          PolicyModel                    ValueModel
//!
//!       Input (observations)         Input (observations)
//!               |                            |
//!        [Dense(h)] x num_layers      [Dense(h)] x num_layers
//!           activation                   activation
//!          /          \                      |
//!     [Dense(n)]    [Dense(1)]           [Dense(1)]
//!   softmax | tanh   aux value              value
//! ```

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::{
    Device, Tensor,
    nn::{self, Init, Module},
};

use crate::env::{SpaceInfo, SpaceType};

/// Configuration for MLP architecture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Number of hidden layers in each trunk
    pub num_layers: usize,

    /// Width of every hidden layer
    pub hidden_dim: i64,

    /// Orthogonal init (gain sqrt(2) hidden, 0.01 outputs) instead of small
    /// normal weights
    pub use_orthogonal_init: bool,

    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Tanh,
}

impl Activation {
    fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self { num_layers: 2, hidden_dim: 64, use_orthogonal_init: true, activation: Activation::Tanh }
    }
}

impl MlpConfig {
    fn hidden_linear(&self) -> nn::LinearConfig {
        let mut linear_config = nn::LinearConfig::default();
        linear_config.ws_init = if self.use_orthogonal_init {
            Init::Orthogonal { gain: 2.0_f64.sqrt() }
        } else {
            Init::Randn { mean: 0.0, stdev: 0.01 }
        };
        linear_config
    }

    fn output_linear(&self) -> nn::LinearConfig {
        let mut output_config = nn::LinearConfig::default();
        output_config.ws_init = if self.use_orthogonal_init {
            Init::Orthogonal { gain: 0.01 }
        } else {
            Init::Randn { mean: 0.0, stdev: 0.01 }
        };
        output_config
    }

    /// Stack of `num_layers` dense layers, each followed by the activation
    fn trunk(&self, path: nn::Path, in_dim: i64) -> nn::Sequential {
        let linear_config = self.hidden_linear();
        let activation = self.activation;
        let mut trunk = nn::seq();
        let mut width = in_dim;
        for layer in 0..self.num_layers.max(1) {
            trunk = trunk
                .add(nn::linear(&path / format!("fc{}", layer + 1), width, self.hidden_dim, linear_config))
                .add_fn(move |x| activation.apply(x));
            width = self.hidden_dim;
        }
        trunk
    }
}

/// Actor network with an auxiliary value head
///
/// `forward` returns the distribution parameters expected by
/// [`crate::policy::ActionDistribution`]: probabilities `[B, n]` for a
/// discrete action space, tanh means `[B, action_dim]` for a continuous one.
pub struct PolicyModel {
    vs: nn::VarStore,
    trunk: nn::Sequential,
    actor: nn::Linear,
    aux_critic: nn::Linear,
    continuous: bool,
    device: Device,
}

impl PolicyModel {
    /// Build a policy network on `device`
    ///
    /// # Arguments
    ///
    /// * `obs_dim` - Observation space dimensionality
    /// * `action_space` - Discrete (softmax head) or continuous (tanh head)
    /// * `config` - Architecture configuration
    /// * `device` - Where the parameters live
    pub fn new(obs_dim: i64, action_space: &SpaceInfo, config: &MlpConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let trunk = config.trunk(&root / "trunk", obs_dim);
        let action_dim = action_space.flat_dim() as i64;
        let actor = nn::linear(&root / "actor", config.hidden_dim, action_dim, config.output_linear());
        let aux_critic = nn::linear(&root / "aux_critic", config.hidden_dim, 1, config.output_linear());
        let continuous = matches!(action_space.space_type, SpaceType::Continuous);

        Self { vs, trunk, actor, aux_critic, continuous, device }
    }

    /// Forward pass: distribution parameters and auxiliary values `[B]`
    pub fn forward(&self, obs: &Tensor) -> (Tensor, Tensor) {
        let features = self.trunk.forward(obs);
        let head = self.actor.forward(&features);
        let params = if self.continuous { head.tanh() } else { head.softmax(-1, tch::Kind::Float) };
        let aux_values = self.aux_critic.forward(&features).squeeze_dim(-1);
        (params, aux_values)
    }

    /// Get the device this network is on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Get reference to variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Get mutable reference to variable store
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    /// Save model parameters to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Load model parameters from a file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }

    /// Stop tracking gradients for every parameter
    pub fn freeze(&mut self) {
        self.vs.freeze();
    }
}

/// State-value network
pub struct ValueModel {
    vs: nn::VarStore,
    trunk: nn::Sequential,
    head: nn::Linear,
    device: Device,
}

impl ValueModel {
    /// Build a value network on `device`
    pub fn new(obs_dim: i64, config: &MlpConfig, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let trunk = config.trunk(&root / "trunk", obs_dim);
        let head = nn::linear(&root / "value", config.hidden_dim, 1, config.output_linear());

        Self { vs, trunk, head, device }
    }

    /// Forward pass: values `[B]`
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        self.head.forward(&self.trunk.forward(obs)).squeeze_dim(-1)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.vs.freeze();
    }
}

#[cfg(test)]
mod tests {
    use tch::Kind;

    use super::*;

    fn discrete(n: usize) -> SpaceInfo {
        SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(n) }
    }

    #[test]
    fn test_discrete_policy_outputs_probabilities() {
        let policy = PolicyModel::new(4, &discrete(3), &MlpConfig::default(), Device::Cpu);
        let obs = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));

        let (probs, aux_values) = policy.forward(&obs);

        assert_eq!(probs.size(), vec![8, 3]);
        assert_eq!(aux_values.size(), vec![8]);
        let row_sums: Vec<f32> = Vec::try_from(probs.sum_dim_intlist(-1, false, Kind::Float)).unwrap();
        for sum in row_sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_continuous_policy_means_are_bounded() {
        let space = SpaceInfo { shape: vec![2], space_type: SpaceType::Continuous };
        let config = MlpConfig { num_layers: 3, activation: Activation::ReLU, ..Default::default() };
        let policy = PolicyModel::new(3, &space, &config, Device::Cpu);
        let obs = Tensor::randn([5, 3], (Kind::Float, Device::Cpu)) * 100.0;

        let (means, _) = policy.forward(&obs);

        assert_eq!(means.size(), vec![5, 2]);
        let max_abs: f64 = means.abs().max().try_into().unwrap();
        assert!(max_abs <= 1.0);
    }

    #[test]
    fn test_value_forward_shape() {
        let value = ValueModel::new(4, &MlpConfig::default(), Device::Cpu);
        let obs = Tensor::randn([6, 4], (Kind::Float, Device::Cpu));
        assert_eq!(value.forward(&obs).size(), vec![6]);
    }

    #[test]
    fn test_separate_parameter_sets() {
        let policy = PolicyModel::new(4, &discrete(2), &MlpConfig::default(), Device::Cpu);
        let value = ValueModel::new(4, &MlpConfig::default(), Device::Cpu);

        let policy_names = policy.var_store().variables();
        let value_names = value.var_store().variables();
        assert!(policy_names.contains_key("actor.weight"));
        assert!(policy_names.contains_key("aux_critic.weight"));
        assert!(!value_names.contains_key("actor.weight"));
        assert!(value_names.contains_key("value.weight"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.safetensors");

        let policy = PolicyModel::new(4, &discrete(2), &MlpConfig::default(), Device::Cpu);
        let obs = Tensor::randn([8, 4], (Kind::Float, Device::Cpu));
        let (probs_before, _) = policy.forward(&obs);
        policy.save(&path).unwrap();

        let mut restored = PolicyModel::new(4, &discrete(2), &MlpConfig::default(), Device::Cpu);
        restored.load(&path).unwrap();
        let (probs_after, _) = restored.forward(&obs);

        let diff: f64 = (&probs_before - &probs_after).abs().max().try_into().unwrap();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_batch_consistency() {
        let value = ValueModel::new(4, &MlpConfig::default(), Device::Cpu);

        let obs_single = Tensor::randn([1, 4], (Kind::Float, Device::Cpu));
        let single: f64 = value.forward(&obs_single).squeeze().try_into().unwrap();

        let batch: Vec<f32> = Vec::try_from(value.forward(&obs_single.repeat([8, 1]))).unwrap();
        for v in batch {
            assert!((v as f64 - single).abs() < 1e-5);
        }
    }
}
