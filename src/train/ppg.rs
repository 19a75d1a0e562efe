//! Phasic Policy Gradient (PPG) with the Truly-PPO objective
//!
//! PPG alternates two phases over experience collected from a vectorized
//! set of environments:
//!
//! # Algorithm Overview
//!
//! ```text
//! Repeat:
//!   1. Step N environments n_update times, one buffer per environment
//!   2. Policy phase (ppo_epochs passes, in-order minibatches):
//!        Truly-PPO surrogate + double-clipped critic loss,
//!        update policy and value networks together
//!      copy states to the aux buffer, sync old policy and old value
//!   3. Every n_aux_update policy phases, auxiliary phase:
//!        distill value targets into the policy's aux head with a KL anchor,
//!        update the policy network only
//!      sync old policy
//! ```
//!
//! # References
//!
//! - [Phasic Policy Gradient](https://arxiv.org/abs/2009.04416)
//! - [Truly Proximal Policy Optimization](https://arxiv.org/abs/1903.07940)

pub mod agent;
pub mod config;
pub mod loss;
pub mod returns;
pub mod runner;
pub mod stats;

pub use agent::{PPGAgent, POLICY_WEIGHTS, VALUE_WEIGHTS};
pub use config::PPGConfig;
pub use loss::{JointAuxLoss, PolicyLossInputs, TrulyPpoLoss};
pub use returns::ReturnEstimator;
pub use runner::{EpisodeReport, Runner, StepReport};
pub use stats::{AuxPhaseStats, PolicyPhaseStats};
