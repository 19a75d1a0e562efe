//! Environment traits and implementations
//!
//! This module defines the step/reset oracle the runner drives, the action
//! and space descriptions shared with the agent, and a vectorized pool.

use anyhow::Result;

/// Core trait for RL environments
///
/// Observations are flat `f32` vectors. Implementations report episode ends
/// through [`StepResult::terminated`] / [`StepResult::truncated`]; the pool
/// takes care of resetting them.
pub trait Environment {
    /// Reset the environment and return the initial observation
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Step the environment with an action
    fn step(&mut self, action: &Action) -> Result<StepResult>;

    /// Get the observation space dimensions
    fn observation_space(&self) -> SpaceInfo;

    /// Get the action space dimensions
    fn action_space(&self) -> SpaceInfo;

    /// Draw the current state
    fn render(&self) {}

    /// Release any resources held by the environment
    fn close(&mut self) {}
}

/// Action sent to an environment
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Index into a discrete action set
    Discrete(i64),

    /// Real-valued action vector
    Continuous(Vec<f32>),
}

impl Action {
    /// Flatten the action into the representation stored in buffers
    ///
    /// A discrete index becomes a one-element vector.
    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Action::Discrete(index) => vec![*index as f32],
            Action::Continuous(values) => values.clone(),
        }
    }

    /// Clip every component to `[-1, 1]` and scale it by `max_action`
    ///
    /// Discrete actions are returned unchanged.
    pub fn scaled(&self, max_action: f32) -> Action {
        match self {
            Action::Discrete(index) => Action::Discrete(*index),
            Action::Continuous(values) => Action::Continuous(
                values.iter().map(|v| v.clamp(-1.0, 1.0) * max_action).collect(),
            ),
        }
    }
}

/// Result of an environment step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Next observation
    pub observation: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode terminated
    pub terminated: bool,

    /// Whether the episode was truncated
    pub truncated: bool,

    /// Additional info
    pub info: StepInfo,
}

impl StepResult {
    /// Whether the episode ended for any reason
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub space_type: SpaceType,
}

impl SpaceInfo {
    /// Flat size of one element of the space
    ///
    /// For a discrete space this is the number of choices, otherwise the
    /// product of the shape.
    pub fn flat_dim(&self) -> usize {
        match self.space_type {
            SpaceType::Discrete(n) => n,
            SpaceType::Continuous => self.shape.iter().product(),
        }
    }
}

/// Space data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// True when the observation in the step result came from an automatic
    /// reset rather than from the transition itself
    pub auto_reset: bool,
}

pub mod pool;
pub mod simple_bandit;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_to_vec() {
        assert_eq!(Action::Discrete(2).to_vec(), vec![2.0]);
        assert_eq!(Action::Continuous(vec![0.5, -0.25]).to_vec(), vec![0.5, -0.25]);
    }

    #[test]
    fn test_action_scaled_clips_then_scales() {
        let action = Action::Continuous(vec![1.7, -0.5, -3.0]);
        assert_eq!(action.scaled(2.0), Action::Continuous(vec![2.0, -1.0, -2.0]));
        assert_eq!(Action::Discrete(1).scaled(2.0), Action::Discrete(1));
    }

    #[test]
    fn test_flat_dim() {
        let discrete = SpaceInfo { shape: vec![], space_type: SpaceType::Discrete(3) };
        let boxed = SpaceInfo { shape: vec![2, 3], space_type: SpaceType::Continuous };
        assert_eq!(discrete.flat_dim(), 3);
        assert_eq!(boxed.flat_dim(), 6);
    }
}
