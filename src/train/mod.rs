//! Training algorithms
//!
//! This module implements Phasic Policy Gradient training.

pub mod ppg;

pub use ppg::{
    AuxPhaseStats, EpisodeReport, JointAuxLoss, PPGAgent, PPGConfig, PolicyPhaseStats, ReturnEstimator, Runner,
    StepReport, TrulyPpoLoss,
};
