//! Frozen parameter copies
//!
//! The "old" policy and value networks are only ever written at phase
//! boundaries. A [`Snapshot`] is the value that moves between a live
//! network and its frozen twin at those points.

use std::collections::BTreeMap;

use anyhow::Result;
use tch::{Tensor, nn};

use crate::error::PPGError;

/// Detached deep copy of every named variable of a var store
#[derive(Debug)]
pub struct Snapshot {
    tensors: BTreeMap<String, Tensor>,
}

impl Snapshot {
    /// Copy the current parameters of `vs`
    pub fn capture(vs: &nn::VarStore) -> Self {
        let _guard = tch::no_grad_guard();
        let tensors = vs
            .variables()
            .into_iter()
            .map(|(name, tensor)| (name, tensor.detach().copy()))
            .collect();
        Self { tensors }
    }

    /// Write the captured parameters back into `vs`
    ///
    /// The variable names and shapes of `vs` must match the snapshot exactly.
    pub fn restore(&self, vs: &mut nn::VarStore) -> Result<()> {
        let mut variables = vs.variables();
        if variables.len() != self.tensors.len() {
            return Err(PPGError::precondition(format!(
                "snapshot has {} variables, var store has {}",
                self.tensors.len(),
                variables.len()
            ))
            .into());
        }

        let _guard = tch::no_grad_guard();
        for (name, variable) in variables.iter_mut() {
            let source = self
                .tensors
                .get(name)
                .ok_or_else(|| PPGError::precondition(format!("snapshot is missing variable {name}")))?;
            if source.size() != variable.size() {
                return Err(PPGError::precondition(format!(
                    "shape mismatch for {name}: snapshot {:?}, var store {:?}",
                    source.size(),
                    variable.size()
                ))
                .into());
            }
            variable.copy_(source);
        }
        Ok(())
    }

    /// Number of captured variables
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Captured tensor for `name`
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Largest element-wise absolute difference to `other`
    ///
    /// `None` when the two snapshots do not hold the same variables.
    pub fn max_abs_diff(&self, other: &Snapshot) -> Option<f64> {
        if self.tensors.len() != other.tensors.len() {
            return None;
        }
        let mut worst = 0.0f64;
        for (name, tensor) in &self.tensors {
            let theirs = other.tensors.get(name)?;
            if tensor.size() != theirs.size() {
                return None;
            }
            if tensor.numel() == 0 {
                continue;
            }
            let diff = f64::try_from((tensor - theirs).abs().max()).ok()?;
            worst = worst.max(diff);
        }
        Some(worst)
    }

    /// Whether both snapshots hold the same variables, equal within `tolerance`
    pub fn matches(&self, other: &Snapshot, tolerance: f64) -> bool {
        self.max_abs_diff(other).is_some_and(|diff| diff <= tolerance)
    }
}
