//! Simple Contextual Bandit Environment
//!
//! A trivial environment for checking that the trainer learns at all:
//! - State: Single binary value (0 or 1)
//! - Actions: Two choices (0 or 1)
//! - Optimal policy: Always choose action = state
//! - Reward: +1.0 if action == state, 0.0 otherwise
//! - Episodes: Fixed length (100 steps by default)

use anyhow::{Result, bail};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult};

/// Simple contextual bandit for testing training correctness
#[derive(Debug)]
pub struct SimpleBandit {
    state: f32,
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl SimpleBandit {
    /// Create a new bandit seeded from entropy
    pub fn new() -> Self {
        Self { state: 0.0, steps: 0, max_steps: 100, rng: StdRng::from_entropy() }
    }

    /// Create a bandit with a reproducible state sequence
    pub fn with_seed(seed: u64) -> Self {
        Self { state: 0.0, steps: 0, max_steps: 100, rng: StdRng::seed_from_u64(seed) }
    }

    /// Set the episode length
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

impl Default for SimpleBandit {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimpleBandit {
    fn reset(&mut self) -> Result<Vec<f32>> {
        self.state = self.rng.gen_range(0..2) as f32;
        self.steps = 0;
        Ok(vec![self.state])
    }

    fn step(&mut self, action: &Action) -> Result<StepResult> {
        let Action::Discrete(choice) = action else {
            bail!("SimpleBandit takes discrete actions, got {action:?}");
        };

        let reward = if *choice == self.state as i64 { 1.0 } else { 0.0 };

        self.steps += 1;
        let terminated = self.steps >= self.max_steps;
        self.state = self.rng.gen_range(0..2) as f32;

        Ok(StepResult {
            observation: vec![self.state],
            reward,
            terminated,
            truncated: false,
            info: StepInfo::default(),
        })
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![1], space_type: SpaceType::Continuous }
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(2) }
    }
}
