//! Vectorized rollout and phase scheduling
//!
//! The runner steps every environment of a pool once per global step,
//! records one transition per environment in that environment's own buffer,
//! and triggers the two training phases:
//!
//! ```text
//! every step:            t_updates += 1
//! t_updates == n_update: flush per-env buffers (env order) -> policy phase
//!                        t_updates = 0, t_aux_updates += 1
//! t_aux_updates == n_aux_update: auxiliary phase, t_aux_updates = 0
//! ```
//!
//! Recording and phase triggers only happen while the agent is in training
//! mode.
//!
//! Counters are reset before a phase runs. A phase that fails discards the
//! buffer it was consuming, so the schedule picks up again with fresh data.

use anyhow::Result;

use super::{
    agent::PPGAgent,
    stats::{AuxPhaseStats, PolicyPhaseStats},
};
use crate::{
    buffer::{PolicyMemory, Transition},
    env::{Action, Environment, pool::EnvPool},
    error::PPGError,
};

/// Outcome of one global step
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Mean reward across environments at this step
    pub mean_reward: f32,

    /// Transitions moved into the agent before a policy phase (0 otherwise)
    pub transitions_flushed: usize,

    /// Number of environments that finished an episode and were reset
    pub episodes_finished: usize,

    /// Averaged stats when a policy phase ran on this step
    pub policy_phase: Option<PolicyPhaseStats>,

    /// Averaged stats when an auxiliary phase ran on this step
    pub aux_phase: Option<AuxPhaseStats>,
}

/// Outcome of [`Runner::run_episode`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeReport {
    /// Sum over steps of the mean reward across environments
    pub total_reward: f32,

    /// Number of global steps taken
    pub eps_time: usize,

    /// Policy phases triggered during the episode
    pub policy_phases: usize,

    /// Auxiliary phases triggered during the episode
    pub aux_phases: usize,
}

/// Drives a pool of environments and the agent's training schedule
pub struct Runner<E: Environment> {
    pool: EnvPool<E>,
    agent: PPGAgent,
    memories: Vec<PolicyMemory>,
    states: Vec<Vec<f32>>,

    n_update: usize,
    n_aux_update: usize,
    max_action: f32,
    render: bool,

    t_updates: usize,
    t_aux_updates: usize,
    policy_phases: usize,
    aux_phases: usize,
}

impl<E: Environment + Send> Runner<E> {
    /// Create a runner; the schedule comes from the agent's config
    ///
    /// The pool's spaces must match the ones the agent was built for.
    pub fn new(pool: EnvPool<E>, agent: PPGAgent) -> Result<Self> {
        let obs_dim = pool.observation_space().shape.iter().product::<usize>().max(1);
        if obs_dim != agent.obs_dim() {
            return Err(PPGError::precondition(format!(
                "environments produce {obs_dim} features, agent expects {}",
                agent.obs_dim()
            ))
            .into());
        }
        let action_space = pool.action_space();
        if &action_space != agent.action_space() {
            return Err(PPGError::precondition(format!(
                "environments take {action_space:?}, agent acts in {:?}",
                agent.action_space()
            ))
            .into());
        }

        let config = agent.config();
        let (n_update, n_aux_update, max_action) = (config.n_update, config.n_aux_update, config.max_action);
        let memories = (0..pool.num_envs()).map(|_| PolicyMemory::new()).collect();

        tracing::info!(num_envs = pool.num_envs(), n_update, n_aux_update, "Runner created");

        Ok(Self {
            pool,
            agent,
            memories,
            states: Vec::new(),
            n_update,
            n_aux_update,
            max_action,
            render: false,
            t_updates: 0,
            t_aux_updates: 0,
            policy_phases: 0,
            aux_phases: 0,
        })
    }

    /// Render every environment after each step
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Reset every environment and start from fresh observations
    ///
    /// Per-environment buffers and counters are kept, so a reset between
    /// episodes does not lose transitions waiting for the next policy phase.
    pub fn reset(&mut self) -> Result<()> {
        self.states = self.pool.reset()?;
        Ok(())
    }

    /// Advance every environment by one step
    ///
    /// Resets the pool first if it has not been reset yet.
    pub fn step(&mut self) -> Result<StepReport> {
        if self.states.is_empty() {
            self.reset()?;
        }

        let actions = self.agent.act(&self.states)?;
        let env_actions: Vec<Action> = actions.iter().map(|action| action.scaled(self.max_action)).collect();
        let results = self.pool.step(&env_actions)?;

        if self.render {
            self.pool.render();
        }

        let training = self.agent.is_training();
        let mut report = StepReport {
            mean_reward: results.iter().map(|r| r.reward).sum::<f32>() / results.len() as f32,
            episodes_finished: results.iter().filter(|r| r.done()).count(),
            ..Default::default()
        };

        let previous = std::mem::take(&mut self.states);
        for (((memory, state), action), result) in
            self.memories.iter_mut().zip(previous).zip(&actions).zip(results)
        {
            if training {
                memory.save_eps(Transition {
                    state,
                    action: action.to_vec(),
                    reward: result.reward,
                    done: result.done(),
                    next_state: result.observation.clone(),
                });
            }
            self.states.push(result.observation);
        }

        if !training {
            return Ok(report);
        }

        self.t_updates += 1;
        if self.t_updates == self.n_update {
            for memory in &mut self.memories {
                report.transitions_flushed += memory.len();
                self.agent.save_all(memory);
            }
            tracing::debug!(transitions = report.transitions_flushed, "flushed environment buffers");

            self.t_updates = 0;
            match self.agent.run_policy_phase() {
                Ok(stats) => report.policy_phase = Some(stats),
                Err(err) => {
                    let dropped = self.agent.clear_policy_memory();
                    tracing::warn!(dropped, "policy phase failed, flushed transitions discarded: {err:#}");
                    return Err(err);
                }
            }
            self.policy_phases += 1;
            self.t_aux_updates += 1;

            if self.t_aux_updates == self.n_aux_update {
                self.t_aux_updates = 0;
                match self.agent.run_aux_phase() {
                    Ok(stats) => report.aux_phase = Some(stats),
                    Err(err) => {
                        let dropped = self.agent.clear_aux_memory();
                        tracing::warn!(dropped, "auxiliary phase failed, buffered states discarded: {err:#}");
                        return Err(err);
                    }
                }
                self.aux_phases += 1;
            }
        }

        Ok(report)
    }

    /// Reset the pool and run `n_update * n_aux_update` global steps
    pub fn run_episode(&mut self) -> Result<EpisodeReport> {
        self.reset()?;

        let mut report = EpisodeReport::default();
        for _ in 0..self.n_update * self.n_aux_update {
            let step = self.step()?;
            report.total_reward += step.mean_reward;
            report.eps_time += 1;
            report.policy_phases += usize::from(step.policy_phase.is_some());
            report.aux_phases += usize::from(step.aux_phase.is_some());
        }

        tracing::info!(
            total_reward = report.total_reward,
            eps_time = report.eps_time,
            policy_phases = report.policy_phases,
            aux_phases = report.aux_phases,
            "episode complete"
        );
        Ok(report)
    }

    /// Close every environment
    pub fn close(&mut self) {
        self.pool.close();
    }

    /// Steps since the last policy phase
    pub fn t_updates(&self) -> usize {
        self.t_updates
    }

    /// Policy phases since the last auxiliary phase
    pub fn t_aux_updates(&self) -> usize {
        self.t_aux_updates
    }

    /// Policy phases run so far
    pub fn policy_phases(&self) -> usize {
        self.policy_phases
    }

    /// Auxiliary phases run so far
    pub fn aux_phases(&self) -> usize {
        self.aux_phases
    }

    /// Transitions recorded in per-environment buffers, not yet flushed
    pub fn pending_transitions(&self) -> usize {
        self.memories.iter().map(PolicyMemory::len).sum()
    }

    /// Per-environment buffer of `env_id`
    pub fn memory(&self, env_id: usize) -> Option<&PolicyMemory> {
        self.memories.get(env_id)
    }

    /// Current observation of every environment
    pub fn states(&self) -> &[Vec<f32>] {
        &self.states
    }

    pub fn agent(&self) -> &PPGAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut PPGAgent {
        &mut self.agent
    }

    pub fn pool(&self) -> &EnvPool<E> {
        &self.pool
    }

    /// Tear the runner down, returning the trained agent
    pub fn into_agent(self) -> PPGAgent {
        self.agent
    }
}
