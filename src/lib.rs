//! # phasic-rl
//!
//! Phasic Policy Gradient reinforcement learning in Rust
//!
//! phasic-rl trains a policy network and a separate value network on a
//! vectorized set of environments, alternating a Truly-PPO policy phase with
//! an auxiliary value-distillation phase. Networks run on libtorch via
//! tch-rs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phasic_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let pool = EnvPool::new(|i| SimpleBandit::with_seed(i as u64), 4)?;
//! let config = PPGConfig::new().n_update(128).n_aux_update(2);
//! let agent = PPGAgent::new(config, &pool.observation_space(), &pool.action_space())?;
//!
//! let mut runner = Runner::new(pool, agent)?;
//! let report = runner.run_episode()?;
//! println!("total reward {}", report.total_reward);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

/// Environment traits and implementations
pub mod env;

/// Policy and value networks, action distributions, snapshots
pub mod policy;

/// Experience buffers and minibatch generation
pub mod buffer;

/// Training algorithms (PPG)
pub mod train;

/// Utility functions and helpers
pub mod utils;

/// Error taxonomy
pub mod error;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::{AuxMemory, PolicyMemory, SequentialSampler, Transition},
        env::{
            Action, Environment, SpaceInfo, SpaceType, StepInfo, StepResult, pool::EnvPool,
            simple_bandit::SimpleBandit,
        },
        error::PPGError,
        policy::{ActionDistribution, MlpConfig, Snapshot},
        train::{EpisodeReport, PPGAgent, PPGConfig, Runner, StepReport},
    };
}

/// Current version of phasic-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
