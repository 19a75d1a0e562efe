//! Vectorized environment pool for lockstep execution
//!
//! This module steps N independent environment instances with one action
//! each, using Rayon to run the `step` calls in parallel. Environments that
//! finish an episode are reset on the spot and their reset observation is
//! returned in place of the terminal one, so no environment is ever idle.
//!
//! # Example
//!
//! ```rust
//! use phasic_rl::env::{Action, pool::EnvPool, simple_bandit::SimpleBandit};
//!
//! // Create pool with 4 environments, each seeded with its index
//! let mut pool = EnvPool::new(|i| SimpleBandit::with_seed(i as u64), 4).unwrap();
//!
//! let observations = pool.reset().unwrap();
//! assert_eq!(observations.len(), 4);
//!
//! let actions = vec![Action::Discrete(0); 4];
//! let results = pool.step(&actions).unwrap();
//! assert_eq!(results.len(), 4);
//! ```

use anyhow::Result;
use rayon::prelude::*;

use crate::{
    env::{Action, Environment, SpaceInfo, StepResult},
    error::PPGError,
};

/// A pool of environments stepped in lockstep
///
/// The pool only guarantees that results come back in environment order;
/// the order in which the individual `step` calls execute is unspecified.
pub struct EnvPool<E: Environment> {
    /// Vector of environment instances
    envs: Vec<E>,
}

impl<E: Environment + Send> EnvPool<E> {
    /// Create a new environment pool
    ///
    /// `env_fn` receives the environment index, which makes it easy to give
    /// every instance its own seed.
    ///
    /// # Errors
    ///
    /// Returns [`PPGError::PreconditionViolation`] when `num_envs` is zero.
    pub fn new<F>(env_fn: F, num_envs: usize) -> Result<Self>
    where
        F: FnMut(usize) -> E,
    {
        if num_envs == 0 {
            return Err(PPGError::precondition("environment pool needs at least one environment").into());
        }
        let envs = (0..num_envs).map(env_fn).collect();
        Ok(Self { envs })
    }

    /// Reset all environments in parallel
    ///
    /// Returns a vector of initial observations, one per environment.
    pub fn reset(&mut self) -> Result<Vec<Vec<f32>>> {
        self.envs
            .par_iter_mut()
            .enumerate()
            .map(|(env_id, env)| env.reset().map_err(|e| fault(env_id, e)))
            .collect()
    }

    /// Step all environments in parallel with given actions
    ///
    /// Any environment whose episode ends is reset immediately; its result
    /// carries the reset observation and `info.auto_reset` is set.
    ///
    /// # Errors
    ///
    /// [`PPGError::PreconditionViolation`] if the number of actions doesn't
    /// match the number of environments, [`PPGError::EnvironmentFault`] if
    /// any environment fails to step or reset.
    pub fn step(&mut self, actions: &[Action]) -> Result<Vec<StepResult>> {
        if actions.len() != self.envs.len() {
            return Err(PPGError::precondition(format!(
                "got {} actions for {} environments",
                actions.len(),
                self.envs.len()
            ))
            .into());
        }

        self.envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .enumerate()
            .map(|(env_id, (env, action))| {
                let mut result = env.step(action).map_err(|e| fault(env_id, e))?;
                if result.done() {
                    result.observation = env.reset().map_err(|e| fault(env_id, e))?;
                    result.info.auto_reset = true;
                }
                Ok(result)
            })
            .collect()
    }

    /// Get the number of environments in the pool
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    /// Get observation space information from first environment
    pub fn observation_space(&self) -> SpaceInfo {
        self.envs[0].observation_space()
    }

    /// Get action space information from first environment
    pub fn action_space(&self) -> SpaceInfo {
        self.envs[0].action_space()
    }

    /// Render every environment in order
    pub fn render(&self) {
        for env in &self.envs {
            env.render();
        }
    }

    /// Close every environment
    pub fn close(&mut self) {
        for env in &mut self.envs {
            env.close();
        }
    }
}

fn fault(env_id: usize, err: anyhow::Error) -> anyhow::Error {
    PPGError::EnvironmentFault { env_id, message: format!("{err:#}") }.into()
}
