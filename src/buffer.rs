//! Experience buffers for the two training phases
//!
//! - [`memory::PolicyMemory`] holds full transitions for the policy phase
//! - [`memory::AuxMemory`] holds the states revisited by the auxiliary phase
//! - [`sampling::SequentialSampler`] slices either buffer into minibatches
//!   in insertion order

pub mod memory;
pub mod sampling;

pub use memory::{AuxMemory, PolicyBatch, PolicyMemory, Transition};
pub use sampling::SequentialSampler;
