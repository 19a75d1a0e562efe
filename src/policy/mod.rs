//! Policy and value networks
//!
//! This module provides the tch-rs networks trained by the agent, the action
//! distribution built on their outputs, and frozen parameter snapshots.

pub mod distribution;
pub mod mlp;
pub mod snapshot;

pub use distribution::ActionDistribution;
pub use mlp::{Activation, MlpConfig, PolicyModel, ValueModel};
pub use snapshot::Snapshot;
