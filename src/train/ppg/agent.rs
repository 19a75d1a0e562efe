//! PPG agent
//!
//! Owns the live and frozen policy/value networks, their optimizers, both
//! experience buffers and both losses.

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tch::{
    Device, Tensor,
    nn::{self, OptimizerConfig},
};

use super::{
    config::PPGConfig,
    loss::{JointAuxLoss, PolicyLossInputs, TrulyPpoLoss},
    stats::{AuxPhaseStats, PolicyPhaseStats},
};
use crate::{
    buffer::{AuxMemory, PolicyMemory, SequentialSampler, Transition},
    env::{Action, SpaceInfo, SpaceType},
    error::PPGError,
    policy::{ActionDistribution, MlpConfig, PolicyModel, Snapshot, ValueModel},
    utils::tensor::{stack_rows, to_vec_f32},
};

/// File name of the policy network checkpoint
pub const POLICY_WEIGHTS: &str = "policy.safetensors";

/// File name of the value network checkpoint
pub const VALUE_WEIGHTS: &str = "value.safetensors";

/// Phasic Policy Gradient agent
///
/// `policy_old` and `value_old` are frozen var stores. They are written only
/// at the end of [`PPGAgent::run_policy_phase`] (both) and
/// [`PPGAgent::run_aux_phase`] (policy only), and when weights are loaded.
pub struct PPGAgent {
    config: PPGConfig,
    device: Device,
    obs_dim: usize,
    action_space: SpaceInfo,
    distribution: ActionDistribution,

    policy: PolicyModel,
    policy_old: PolicyModel,
    value: ValueModel,
    value_old: ValueModel,
    policy_optimizer: nn::Optimizer,
    value_optimizer: nn::Optimizer,

    policy_loss: TrulyPpoLoss,
    aux_loss: JointAuxLoss,
    policy_memory: PolicyMemory,
    aux_memory: AuxMemory,
    training: bool,
}

impl PPGAgent {
    /// Create an agent with the default network architecture
    pub fn new(config: PPGConfig, observation_space: &SpaceInfo, action_space: &SpaceInfo) -> Result<Self> {
        Self::with_network(config, MlpConfig::default(), observation_space, action_space)
    }

    /// Create an agent with a custom network architecture
    pub fn with_network(
        config: PPGConfig,
        network: MlpConfig,
        observation_space: &SpaceInfo,
        action_space: &SpaceInfo,
    ) -> Result<Self> {
        config.validate()?;
        if let SpaceType::Discrete(0) = action_space.space_type {
            return Err(PPGError::precondition("discrete action space has no actions").into());
        }

        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
        }

        let device = config.device();
        let obs_dim = observation_space.shape.iter().product::<usize>().max(1);
        let distribution = ActionDistribution::for_space(action_space, config.action_std);

        let policy = PolicyModel::new(obs_dim as i64, action_space, &network, device);
        let value = ValueModel::new(obs_dim as i64, &network, device);

        let mut policy_old = PolicyModel::new(obs_dim as i64, action_space, &network, device);
        policy_old.freeze();
        Snapshot::capture(policy.var_store()).restore(policy_old.var_store_mut())?;

        let mut value_old = ValueModel::new(obs_dim as i64, &network, device);
        value_old.freeze();
        Snapshot::capture(value.var_store()).restore(value_old.var_store_mut())?;

        let policy_optimizer = nn::Adam::default().build(policy.var_store(), config.learning_rate)?;
        let value_optimizer = nn::Adam::default().build(value.var_store(), config.learning_rate)?;

        tracing::info!(
            ?device,
            obs_dim,
            ?distribution,
            hidden_dim = network.hidden_dim,
            "PPGAgent created"
        );

        Ok(Self {
            policy_loss: TrulyPpoLoss::new(&config, distribution),
            aux_loss: JointAuxLoss::new(distribution),
            training: config.training_mode,
            config,
            device,
            obs_dim,
            action_space: action_space.clone(),
            distribution,
            policy,
            policy_old,
            value,
            value_old,
            policy_optimizer,
            value_optimizer,
            policy_memory: PolicyMemory::new(),
            aux_memory: AuxMemory::new(),
        })
    }

    /// Choose one action per state with the live policy
    ///
    /// Samples in training mode; takes the arg-max (discrete) or the mean
    /// (continuous) in evaluation mode. Nothing is recorded.
    pub fn act(&self, states: &[Vec<f32>]) -> Result<Vec<Action>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let obs = self.observations(states)?;

        let chosen = tch::no_grad(|| {
            let (params, _) = self.policy.forward(&obs);
            if self.training { self.distribution.sample(&params) } else { self.distribution.deterministic(&params) }
        });

        match self.action_space.space_type {
            SpaceType::Discrete(_) => {
                let indices: Vec<i64> = Vec::try_from(chosen.to_device(Device::Cpu).view([-1]))?;
                Ok(indices.into_iter().map(Action::Discrete).collect())
            }
            SpaceType::Continuous => {
                let width = self.action_space.flat_dim().max(1);
                let flat = to_vec_f32(&chosen)?;
                Ok(flat.chunks(width).map(|chunk| Action::Continuous(chunk.to_vec())).collect())
            }
        }
    }

    /// Switch to sampling actions
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Switch to deterministic actions
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Whether actions are sampled
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Record one transition in the policy buffer
    pub fn save_eps(&mut self, transition: Transition) {
        self.policy_memory.save_eps(transition);
    }

    /// Move every transition of `memory` into the policy buffer
    pub fn save_all(&mut self, memory: &mut PolicyMemory) {
        self.policy_memory.save_all(memory);
    }

    /// One gradient step of the policy phase on `range` of the policy buffer
    ///
    /// Steps the policy and value optimizers together. Snapshots are left
    /// untouched.
    pub fn train_policy_batch(&mut self, range: Range<usize>) -> Result<PolicyPhaseStats> {
        let batch = self.policy_memory.batch(range);
        let states = self.observations(batch.states)?;
        let next_states = self.observations(batch.next_states)?;
        let actions = stack_rows(batch.actions, self.device)?;
        let rewards = batch.rewards.to_vec();
        let dones: Vec<f32> = batch.dones.iter().map(|&done| if done { 1.0 } else { 0.0 }).collect();

        let (action_params, _) = self.policy.forward(&states);
        let values = self.value.forward(&states);
        let (old_action_params, old_values, next_values) = tch::no_grad(|| {
            let (old_params, _) = self.policy_old.forward(&states);
            (old_params, self.value_old.forward(&states), self.value.forward(&next_states))
        });

        let (loss, stats) = self.policy_loss.compute(&PolicyLossInputs {
            action_params: &action_params,
            old_action_params: &old_action_params,
            values: &values,
            old_values: &old_values,
            next_values: &next_values,
            actions: &actions,
            rewards: &rewards,
            dones: &dones,
        })?;

        self.policy_optimizer.zero_grad();
        self.value_optimizer.zero_grad();
        loss.backward();
        if let Some(max_norm) = self.config.max_grad_norm {
            self.policy_optimizer.clip_grad_norm(max_norm);
            self.value_optimizer.clip_grad_norm(max_norm);
        }
        self.policy_optimizer.step();
        self.value_optimizer.step();

        Ok(stats)
    }

    /// One gradient step of the auxiliary phase on `range` of the aux buffer
    ///
    /// Targets come from the live value network and carry no gradient. Only
    /// the policy optimizer steps.
    pub fn train_aux_batch(&mut self, range: Range<usize>) -> Result<AuxPhaseStats> {
        let states = self.observations(self.aux_memory.batch(range))?;

        let (returns, old_action_params) = tch::no_grad(|| {
            let (old_params, _) = self.policy_old.forward(&states);
            (self.value.forward(&states), old_params)
        });
        let (action_params, aux_values) = self.policy.forward(&states);

        let (loss, stats) = self.aux_loss.compute(&action_params, &old_action_params, &aux_values, &returns)?;

        self.policy_optimizer.zero_grad();
        loss.backward();
        if let Some(max_norm) = self.config.max_grad_norm {
            self.policy_optimizer.clip_grad_norm(max_norm);
        }
        self.policy_optimizer.step();

        Ok(stats)
    }

    /// Run the policy phase over the whole policy buffer
    ///
    /// `ppo_epochs` passes of in-order minibatches. Afterwards the buffered
    /// states move to the aux buffer, the policy buffer is cleared, and both
    /// old networks are synchronized with the live ones. On error the buffers
    /// are left as they were.
    pub fn run_policy_phase(&mut self) -> Result<PolicyPhaseStats> {
        if self.policy_memory.is_empty() {
            return Err(PPGError::precondition("policy buffer is empty at the start of the policy phase").into());
        }

        let transitions = self.policy_memory.len();
        let sampler = SequentialSampler::new(transitions, self.config.batch_size);
        let mut total = PolicyPhaseStats::zeros();

        for epoch in 0..self.config.ppo_epochs {
            for range in sampler {
                let stats = self.train_policy_batch(range.clone())?;
                tracing::debug!(
                    epoch,
                    start = range.start,
                    end = range.end,
                    loss = stats.total_loss,
                    kl = stats.kl,
                    "policy minibatch"
                );
                total += &stats;
            }
        }

        self.aux_memory.save_all(self.policy_memory.states());
        self.policy_memory.clear();
        self.sync_policy_old()?;
        self.sync_value_old()?;

        let stats = total.average();
        tracing::info!(
            transitions,
            updates = total.num_updates,
            loss = stats.total_loss,
            surrogate = stats.surrogate,
            critic = stats.critic_loss,
            entropy = stats.entropy,
            kl = stats.kl,
            rollback = stats.rollback_fraction,
            "policy phase complete"
        );
        Ok(stats)
    }

    /// Run the auxiliary phase over the whole aux buffer
    ///
    /// `ppo_epochs` passes of in-order minibatches, then the aux buffer is
    /// cleared and only the old policy is synchronized.
    pub fn run_aux_phase(&mut self) -> Result<AuxPhaseStats> {
        if self.aux_memory.is_empty() {
            return Err(PPGError::precondition("aux buffer is empty at the start of the auxiliary phase").into());
        }

        let states = self.aux_memory.len();
        let sampler = SequentialSampler::new(states, self.config.batch_size);
        let mut total = AuxPhaseStats::zeros();

        for epoch in 0..self.config.ppo_epochs {
            for range in sampler {
                let stats = self.train_aux_batch(range.clone())?;
                tracing::debug!(epoch, start = range.start, end = range.end, loss = stats.joint_loss, "aux minibatch");
                total += &stats;
            }
        }

        self.aux_memory.clear();
        self.sync_policy_old()?;

        let stats = total.average();
        tracing::info!(
            states,
            updates = total.num_updates,
            loss = stats.joint_loss,
            value_loss = stats.value_loss,
            kl = stats.kl,
            "auxiliary phase complete"
        );
        Ok(stats)
    }

    fn sync_policy_old(&mut self) -> Result<()> {
        Snapshot::capture(self.policy.var_store()).restore(self.policy_old.var_store_mut())
    }

    fn sync_value_old(&mut self) -> Result<()> {
        Snapshot::capture(self.value.var_store()).restore(self.value_old.var_store_mut())
    }

    fn observations(&self, states: &[Vec<f32>]) -> Result<Tensor> {
        let obs = stack_rows(states, self.device)?;
        let width = obs.size()[1] as usize;
        if !states.is_empty() && width != self.obs_dim {
            return Err(PPGError::precondition(format!(
                "observations have {width} features, agent expects {}",
                self.obs_dim
            ))
            .into());
        }
        Ok(obs)
    }

    /// Write `policy.safetensors` and `value.safetensors` into `dir`
    pub fn save_weights<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        self.policy.save(dir.join(POLICY_WEIGHTS))?;
        self.value.save(dir.join(VALUE_WEIGHTS))?;
        tracing::info!(dir = %dir.display(), "weights saved");
        Ok(())
    }

    /// Load both networks from `dir`; the old networks follow
    pub fn load_weights<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        self.load_policy(dir.join(POLICY_WEIGHTS))?;
        self.load_value(dir.join(VALUE_WEIGHTS))?;
        tracing::info!(dir = %dir.display(), "weights loaded");
        Ok(())
    }

    /// Load the policy network alone and refresh the old policy
    pub fn load_policy<P: Into<PathBuf>>(&mut self, path: P) -> Result<()> {
        let path = path.into();
        self.policy.load(&path).with_context(|| format!("failed to load {}", path.display()))?;
        self.sync_policy_old()
    }

    /// Load the value network alone and refresh the old value network
    pub fn load_value<P: Into<PathBuf>>(&mut self, path: P) -> Result<()> {
        let path = path.into();
        self.value.load(&path).with_context(|| format!("failed to load {}", path.display()))?;
        self.sync_value_old()
    }

    /// Value estimates of the live value network (no gradient)
    pub fn values(&self, states: &[Vec<f32>]) -> Result<Vec<f32>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let obs = self.observations(states)?;
        to_vec_f32(&tch::no_grad(|| self.value.forward(&obs)))
    }

    /// Log probabilities of `actions` under the live policy (no gradient)
    pub fn log_probs(&self, states: &[Vec<f32>], actions: &[Vec<f32>]) -> Result<Vec<f32>> {
        if states.len() != actions.len() {
            return Err(PPGError::precondition(format!(
                "{} states but {} actions",
                states.len(),
                actions.len()
            ))
            .into());
        }
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let obs = self.observations(states)?;
        let actions = stack_rows(actions, self.device)?;
        let log_probs = tch::no_grad(|| {
            let (params, _) = self.policy.forward(&obs);
            self.distribution.log_prob(&params, &actions)
        });
        to_vec_f32(&log_probs)
    }

    pub fn policy_snapshot(&self) -> Snapshot {
        Snapshot::capture(self.policy.var_store())
    }

    pub fn policy_old_snapshot(&self) -> Snapshot {
        Snapshot::capture(self.policy_old.var_store())
    }

    pub fn value_snapshot(&self) -> Snapshot {
        Snapshot::capture(self.value.var_store())
    }

    pub fn value_old_snapshot(&self) -> Snapshot {
        Snapshot::capture(self.value_old.var_store())
    }

    /// Overwrite the live networks (and their old twins) from snapshots
    pub fn restore(&mut self, policy: &Snapshot, value: &Snapshot) -> Result<()> {
        policy.restore(self.policy.var_store_mut())?;
        value.restore(self.value.var_store_mut())?;
        self.sync_policy_old()?;
        self.sync_value_old()
    }

    pub fn policy_memory(&self) -> &PolicyMemory {
        &self.policy_memory
    }

    pub fn aux_memory(&self) -> &AuxMemory {
        &self.aux_memory
    }

    /// Drop every transition of the policy buffer, returning how many there were
    pub fn clear_policy_memory(&mut self) -> usize {
        let dropped = self.policy_memory.len();
        self.policy_memory.clear();
        dropped
    }

    /// Drop every state of the aux buffer, returning how many there were
    pub fn clear_aux_memory(&mut self) -> usize {
        let dropped = self.aux_memory.len();
        self.aux_memory.clear();
        dropped
    }

    pub fn config(&self) -> &PPGConfig {
        &self.config
    }

    pub fn distribution(&self) -> ActionDistribution {
        self.distribution
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Action space the policy was built for
    pub fn action_space(&self) -> &SpaceInfo {
        &self.action_space
    }

    /// Flat observation width the networks take
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }
}
